//! Error types for the playback engine
//!
//! Nothing here ever crosses the thread boundary: submit-time errors are
//! returned to the control thread, synth errors are logged on the render
//! thread and surfaced as a [`PlayerEvent`](super::PlayerEvent).

use std::collections::TryReserveError;
use thiserror::Error;

/// Errors rejecting a load request before it reaches the render thread
#[derive(Debug, Error)]
pub enum LoadError {
    /// Empty module buffer
    #[error("Module data is empty")]
    EmptyInput,

    /// Could not allocate the transfer buffer
    #[error("Failed to allocate {len} bytes for module transfer: {source}")]
    Allocation {
        len: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Errors reported by a [`ModuleSynth`](super::ModuleSynth) implementation
#[derive(Debug, Error)]
pub enum SynthError {
    /// The data isn't a module the synth can decode
    #[error("Invalid module data: {0}")]
    InvalidModule(String),

    /// Recognised format, but a feature the synth doesn't handle
    #[error("Unsupported module: {0}")]
    Unsupported(String),
}

/// Result type for load submission
pub type LoadResult<T> = Result<T, LoadError>;
