pub mod app_state;
pub mod backfill;
pub mod http;
