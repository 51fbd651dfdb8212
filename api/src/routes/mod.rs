pub mod embed_backfill;
