// Presentation layer - HTTP surface for the charts and controls
pub mod app_state;
pub mod handlers;
