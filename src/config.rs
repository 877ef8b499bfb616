//! Synchronization tunables
//!
//! Every timing constant the players rely on lives here. The defaults are the
//! empirically chosen values the course view has always used; none of them are
//! load-bearing contracts, so deployments may override them from YAML.
//!
//! ```yaml
//! drift_threshold: 0.5
//! node_retry_delay_ms: 100
//! node_retry_attempts: 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::types::Resolution;
use crate::{PlaybackError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum tolerated secondary drift in seconds before a correction
    pub drift_threshold: f64,
    /// Delay between checks for a not-yet-attached element slot
    pub node_retry_delay_ms: u64,
    /// Checks before a pending secondary mount gives up
    pub node_retry_attempts: u32,
    /// Delay before the single retry when the primary engine is not mounted yet
    pub primary_retry_delay_ms: u64,
    /// Delay of the second control bar layout pass after a source swap
    pub restyle_delay_ms: u64,
    /// Longest wait for a swapped source to become ready
    pub ready_timeout_ms: u64,
    /// Hover distance in seconds that selects a marker tooltip
    pub marker_hover_tolerance: f64,
    /// Capacity of the overlay and preference broadcast channels
    pub event_capacity: usize,
    /// Resolution used when the learner never picked one
    pub default_resolution: u32,
    /// Playback rates offered by the presenter control bar
    pub playback_rates: Vec<f64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.5,
            node_retry_delay_ms: 100,
            node_retry_attempts: 50,
            primary_retry_delay_ms: 200,
            restyle_delay_ms: 100,
            ready_timeout_ms: 10_000,
            marker_hover_tolerance: 1.0,
            event_capacity: 64,
            default_resolution: Resolution::DEFAULT.0,
            playback_rates: vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0],
        }
    }
}

impl SyncConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: SyncConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| PlaybackError::storage_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "Loading sync configuration");
        Self::from_yaml_str(&yaml)
    }

    /// Reject values that would make the sync loop misbehave.
    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| Err(PlaybackError::parse("sync configuration", details));

        if !self.drift_threshold.is_finite() || self.drift_threshold < 0.0 {
            return invalid(format!("drift_threshold must be a non-negative number, got {}", self.drift_threshold));
        }
        if !self.marker_hover_tolerance.is_finite() || self.marker_hover_tolerance < 0.0 {
            return invalid(format!(
                "marker_hover_tolerance must be a non-negative number, got {}",
                self.marker_hover_tolerance
            ));
        }
        if self.event_capacity == 0 {
            return invalid("event_capacity must be at least 1".to_string());
        }
        if self.ready_timeout_ms == 0 {
            return invalid("ready_timeout_ms must be at least 1".to_string());
        }
        if self.node_retry_attempts == 0 {
            return invalid("node_retry_attempts must be at least 1".to_string());
        }
        if self.default_resolution == 0 {
            return invalid("default_resolution must be positive".to_string());
        }
        if let Some(rate) = self.playback_rates.iter().find(|r| !r.is_finite() || **r <= 0.0) {
            return invalid(format!("playback rate {rate} must be positive"));
        }
        Ok(())
    }

    pub fn node_retry_delay(&self) -> Duration {
        Duration::from_millis(self.node_retry_delay_ms)
    }

    pub fn primary_retry_delay(&self) -> Duration {
        Duration::from_millis(self.primary_retry_delay_ms)
    }

    pub fn restyle_delay(&self) -> Duration {
        Duration::from_millis(self.restyle_delay_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn default_resolution(&self) -> Resolution {
        Resolution(self.default_resolution)
    }
}
