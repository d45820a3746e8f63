// Application layer - State, caching, animation and per-widget coordination
pub mod animation;
pub mod cache;
pub mod context;
pub mod error_sink;
pub mod metric_source;
pub mod snapshot_repository;
pub mod snapshot_writer;
pub mod state_store;
pub mod widget_board;
pub mod widget_coordinator;
