//! Modlet Core - real-time tracker module playback
//!
//! Bridges a non-real-time control thread and a hard-real-time render
//! thread around an external module synth. See [`engine`] for the session
//! model and [`audio`] for driving it from a device.

pub mod audio;
pub mod config;
pub mod engine;
pub mod types;

pub use types::*;
