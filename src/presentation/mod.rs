// Presentation layer - HTTP host for the dashboard
pub mod api_error;
pub mod app_state;
pub mod handlers;
pub mod router;
