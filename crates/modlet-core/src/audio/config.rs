//! Audio backend configuration
//!
//! Device selection and buffer settings for the host output stream. The
//! render pipeline always works in 128-frame quanta; the buffer size here
//! only affects how many quanta the host asks for per callback.

use serde::{Deserialize, Serialize};

use crate::types::QUANTUM_FRAMES;

/// Largest buffer size accepted for a fixed request (frames)
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Smallest buffer size accepted for a fixed request (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Default buffer size when no preference is specified (frames)
/// 512 frames is a safe default that works on most systems
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Buffer size used for [`BufferSize::LowLatency`]: two render quanta
pub const LOW_LATENCY_BUFFER_SIZE: u32 = (QUANTUM_FRAMES * 2) as u32;

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the backend pick its default (assumed 512 frames for latency estimates)
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to a sane range)
    Fixed(u32),
    /// Smallest size that is still a whole number of quanta
    LowLatency,
}

impl BufferSize {
    /// Fixed size to request from the device, or None to leave it to the backend
    pub fn requested_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            _ => Some(self.as_frames()),
        }
    }

    /// Buffer size in frames, using [`DEFAULT_BUFFER_SIZE`] as the estimate for `Default`
    pub fn as_frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE),
            BufferSize::LowLatency => LOW_LATENCY_BUFFER_SIZE,
        }
    }

    /// Calculate latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.as_frames() as f32 / sample_rate.max(1) as f32) * 1000.0
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, CoreAudio, ...)
/// so a device can be picked from a non-default host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier; None uses the default host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the host output stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    /// Preferred buffer size
    pub buffer_size: BufferSize,

    /// Preferred sample rate (None = 48kHz if the device supports it)
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            buffer_size: BufferSize::LowLatency,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_buffer_size(mut self, size: BufferSize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }
}
