pub mod config;
pub mod deliveries;
pub mod directory;
pub mod error;
pub mod seed;
pub mod telemetry;
