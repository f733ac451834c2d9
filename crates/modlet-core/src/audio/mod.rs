//! Host audio integration for Modlet
//!
//! The engine renders fixed 128-frame planar quanta; real devices want
//! interleaved buffers of whatever size they negotiated. This module bridges
//! the two:
//!
//! - [`QuantumAdapter`]: re-blocks renderer output to any host buffer size
//! - `start_audio_system` (feature `cpal-backend`): opens a CPAL output
//!   stream and moves the session's renderer into its callback
//!
//! # Example Usage
//!
//! ```ignore
//! use modlet_core::audio::{start_audio_system, AudioConfig};
//! use modlet_core::engine::new_session;
//!
//! let (mut controller, renderer) = new_session(synth, &player_config);
//! let _handle = start_audio_system(&AudioConfig::default(), renderer)?;
//!
//! controller.load(&module_bytes);
//!
//! // On every UI tick
//! if let Some(snapshot) = controller.poll() {
//!     draw_position(snapshot);
//! }
//! ```

mod adapter;
mod config;
mod error;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;

pub use adapter::QuantumAdapter;
pub use config::{
    AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, LOW_LATENCY_BUFFER_SIZE,
    MAX_BUFFER_SIZE, MIN_BUFFER_SIZE,
};
pub use error::{AudioError, AudioResult};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{output_devices, start_audio_system, AudioHandle};
