// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod metric_store;
pub mod snapshot_store;
