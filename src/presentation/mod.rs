// Presentation layer - HTTP query surface
pub mod app_state;
pub mod handlers;
