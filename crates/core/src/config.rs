//! Tunables for practice sessions.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shortest span a segment may be edited down to, in seconds.
pub const DEFAULT_MIN_DURATION: f64 = 2.0;

/// Number of segments shown in the waveform window.
pub const DEFAULT_WINDOW_SEGMENTS: usize = 5;

/// How close to the end of a segment a paused player must be for play to
/// restart the segment instead of resuming.
pub const DEFAULT_REPLAY_THRESHOLD: f64 = 0.1;

/// Settings consumed by the store, navigator, boundary editor and waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    pub min_duration: f64,
    pub window_segments: usize,
    pub replay_threshold: f64,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            min_duration: DEFAULT_MIN_DURATION,
            window_segments: DEFAULT_WINDOW_SEGMENTS,
            replay_threshold: DEFAULT_REPLAY_THRESHOLD,
        }
    }
}

impl PracticeConfig {
    /// Parse a JSON object, filling missing keys with defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the editing and windowing rules.
    pub fn validate(&self) -> Result<()> {
        if !self.min_duration.is_finite() || self.min_duration <= 0.0 {
            return Err(Error::Config(format!(
                "min_duration must be positive, got {}",
                self.min_duration
            )));
        }
        if self.window_segments == 0 {
            return Err(Error::Config("window_segments must be at least 1".into()));
        }
        if !self.replay_threshold.is_finite() || self.replay_threshold < 0.0 {
            return Err(Error::Config(format!(
                "replay_threshold must not be negative, got {}",
                self.replay_threshold
            )));
        }
        Ok(())
    }
}
