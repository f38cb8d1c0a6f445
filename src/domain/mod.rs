// Domain layer - Pure data types, no I/O
pub mod alert;
pub mod channel;
pub mod error;
pub mod table;
pub mod telemetry;
pub mod window;
