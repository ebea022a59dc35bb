pub mod common;
pub mod ingest;
pub mod prices;
pub mod transactions;
