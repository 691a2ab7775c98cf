//! Diff engine configuration.
//!
//! Controls streaming cadence and what happens when a run is cancelled.

use serde::Deserialize;
use std::time::Duration;

/// Settings for diff sessions.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DiffSettings {
    /// Drain the whole stream before applying it (default: false)
    #[serde(default)]
    pub instant: bool,

    /// Minimum pause between applied ops in milliseconds; 0 disables it (default: 0)
    #[serde(default)]
    pub min_op_delay_ms: u64,

    /// Reject everything applied so far when a run is cancelled (default: false)
    #[serde(default)]
    pub reject_on_cancel: bool,

    /// Per-subscriber buffer of the event channel (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DiffSettings {
    fn default() -> Self {
        Self {
            instant: false,
            min_op_delay_ms: 0,
            reject_on_cancel: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl DiffSettings {
    /// Sets instant mode.
    #[must_use]
    pub const fn with_instant(mut self, instant: bool) -> Self {
        self.instant = instant;
        self
    }

    /// Sets the minimum pause between ops.
    #[must_use]
    pub const fn with_min_op_delay_ms(mut self, delay_ms: u64) -> Self {
        self.min_op_delay_ms = delay_ms;
        self
    }

    /// Sets whether cancellation rejects the applied prefix.
    #[must_use]
    pub const fn with_reject_on_cancel(mut self, reject: bool) -> Self {
        self.reject_on_cancel = reject;
        self
    }

    /// Pause between ops, if any.
    #[must_use]
    pub const fn op_delay(&self) -> Option<Duration> {
        if self.min_op_delay_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.min_op_delay_ms))
        }
    }
}

pub(super) fn default_event_capacity() -> usize {
    256
}
