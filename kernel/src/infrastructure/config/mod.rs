//! Configuration management for the diff kernel.
//!
//! Defaults are overridden by `VDIFF__*` environment variables, e.g.
//! `VDIFF__DIFF__INSTANT=true` or `VDIFF__TELEMETRY__LOG_LEVEL=debug`.
//!
//! # Example
//!
//! ```
//! use vdiff_kernel::infrastructure::config::Settings;
//!
//! let settings = Settings::new().expect("Failed to load configuration");
//! assert!(settings.diff.event_capacity > 0);
//! ```

pub mod diff;
pub mod telemetry;

pub use diff::DiffSettings;
pub use telemetry::TelemetrySettings;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

const ENV_PREFIX: &str = "VDIFF";

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Diff engine settings.
    #[serde(default)]
    pub diff: DiffSettings,
    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Loads settings from defaults and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX).separator("__"))
    }

    /// Loads settings from defaults and the given environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn from_env(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("diff.instant", false)?
            .set_default("diff.min_op_delay_ms", 0)?
            .set_default("diff.reject_on_cancel", false)?
            .set_default("diff.event_capacity", diff::default_event_capacity() as u64)?
            .set_default("telemetry.log_level", telemetry::default_log_level())?
            .set_default("telemetry.json", false)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
