pub mod embed_backfill_request;
pub mod embed_backfill_response;
pub mod embed_backfill_route;
