pub mod config;
pub mod error;
pub mod publishing;
pub mod telemetry;
