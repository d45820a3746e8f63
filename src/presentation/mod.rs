// Presentation layer - HTTP surface for user actions and frame pulls
pub mod app_state;
pub mod handlers;
pub mod router;
