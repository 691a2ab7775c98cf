use anyhow::{Context, Result};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::config::TelemetrySettings;

/// Builder for the process-wide `tracing` subscriber.
pub struct TelemetryBuilder {
    service_name: String,
    log_level: String,
    json: bool,
    span_events: bool,
}

impl TelemetryBuilder {
    /// Creates a builder with `info` level and plain output.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: "info".to_string(),
            json: false,
            span_events: false,
        }
    }

    /// Creates a builder from loaded settings.
    #[must_use]
    pub fn from_settings(service_name: impl Into<String>, settings: &TelemetrySettings) -> Self {
        Self::new(service_name)
            .with_log_level(settings.log_level.clone())
            .with_json(settings.json)
    }

    /// Default filter used when `RUST_LOG` is unset.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Switches between JSON lines and human-readable output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Logs span close events with their timings.
    #[must_use]
    pub fn with_span_events(mut self) -> Self {
        self.span_events = true;
        self
    }

    /// Installs the subscriber. Logs go to stderr so stdout stays free for
    /// command output.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn init(self) -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        let span_events = if self.span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let fmt_layer = if self.json {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .boxed()
        };

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .with_context(|| format!("Failed to init subscriber for {}", self.service_name))?;

        Ok(())
    }
}
