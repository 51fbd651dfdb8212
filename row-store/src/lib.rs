//! Row access for the embedding backfill over a PostgREST (Supabase) API.
//!
//! - [`RestRowStore::select_unembedded`] reads rows whose embedding is null
//! - [`RestRowStore::upsert_embeddings`] writes vectors back, keyed by id
//! - [`TargetAllowList`] / [`TableTarget`] restrict which table and columns
//!   may appear in a request URL

pub mod client;
pub mod config;
pub mod errors;
pub mod target;

pub use client::{EmbeddingUpdate, RestRowStore, Row};
pub use config::StoreConfig;
pub use errors::StoreError;
pub use target::{TableTarget, TargetAllowList};
