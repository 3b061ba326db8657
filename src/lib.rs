pub mod api;
pub mod capacity;
pub mod telemetry;
