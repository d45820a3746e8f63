// Domain layer - Pure types and calculations
pub mod calculations;
pub mod error;
pub mod metric;
pub mod snapshot;
pub mod widget;
