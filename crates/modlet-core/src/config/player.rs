//! Player configuration
//!
//! Every field has a default, so a partial (or empty) YAML file is valid.
//!
//! ```yaml
//! sample_rate: 44100
//! report_interval_ms: 16.0
//! start_looping: true
//! initial_volume: 0.8
//! event_capacity: 32
//! audio:
//!   buffer_size: LowLatency
//! ```

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::engine::{clamp_volume, DEFAULT_EVENT_CAPACITY, DEFAULT_REPORT_INTERVAL_SECS};

/// Settings applied when a playback session is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Rate used when the host reports 0 (None = 48kHz)
    pub sample_rate: Option<u32>,

    /// Minimum time between position snapshots while the row is unchanged
    pub report_interval_ms: f64,

    /// Whether modules repeat forever after loading
    pub start_looping: bool,

    /// Output gain for a new session, clamped to 0..=1
    pub initial_volume: f32,

    /// Capacity of the render → control event queue
    pub event_capacity: usize,

    /// Host output stream settings
    pub audio: AudioConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_SECS * 1000.0,
            start_looping: true,
            initial_volume: 1.0,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            audio: AudioConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Throttle interval in seconds; negative or non-finite values disable it
    pub fn report_interval_secs(&self) -> f64 {
        if self.report_interval_ms.is_finite() && self.report_interval_ms > 0.0 {
            self.report_interval_ms / 1000.0
        } else {
            0.0
        }
    }

    /// Initial volume after clamping (NaN falls back to unity)
    pub fn effective_volume(&self) -> f32 {
        clamp_volume(self.initial_volume).unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferSize;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.report_interval_ms, 16.0);
        assert!((config.report_interval_secs() - 0.016).abs() < 1e-12);
        assert!(config.start_looping);
        assert_eq!(config.effective_volume(), 1.0);
        assert_eq!(config.event_capacity, 32);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "initial_volume: 1.7\naudio:\n  buffer_size: LowLatency\n";
        let config: PlayerConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.effective_volume(), 1.0);
        assert_eq!(config.audio.buffer_size, BufferSize::LowLatency);
        assert!(config.start_looping);
        assert_eq!(config.sample_rate, None);
    }

    #[test]
    fn test_interval_guards() {
        let config = PlayerConfig {
            report_interval_ms: -5.0,
            ..Default::default()
        };
        assert_eq!(config.report_interval_secs(), 0.0);

        let config = PlayerConfig {
            initial_volume: f32::NAN,
            ..Default::default()
        };
        assert_eq!(config.effective_volume(), 1.0);
    }
}
