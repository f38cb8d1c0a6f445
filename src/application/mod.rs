// Application layer - Use cases over the domain model
pub mod dashboard_service;
pub mod derived_metrics;
pub mod pipeline;
pub mod presentation_adapter;
pub mod series_cleaner;
pub mod telemetry_source;
