/// Configuration management for the kernel.
pub mod config;
/// Telemetry setup for logging.
pub mod telemetry;
