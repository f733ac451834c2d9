//! Playback engine - command channel, render pipeline, position reporting
//!
//! This module bridges a non-real-time control thread and the real-time
//! render thread:
//! - Command mailboxes: coalescing, lock-free control → render requests
//! - Renderer: fixed 128-frame quanta driven by a [`ModuleSynth`]
//! - Position reporter: throttled, triple-buffered render → control telemetry
//! - Session: [`new_session`] splits one playback context into [`Controller`] and [`Renderer`]

mod command;
mod error;
mod events;
mod gc;
mod position;
mod render;
mod session;
mod synth;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{clamp_volume, CommandMailboxes, ModuleData};
pub use error::*;
pub use events::{event_channel, PlayerEvent, DEFAULT_EVENT_CAPACITY};
pub use gc::BufferCollector;
pub use position::{PositionReporter, ReportOutcome, SnapshotSlot, DEFAULT_REPORT_INTERVAL_SECS};
pub use render::{apply_gain, deinterleave, PlaybackAtomics, PlaybackState, Renderer, UNITY_GAIN_THRESHOLD};
pub use session::{new_session, Controller};
pub use synth::{ModuleSynth, REPEAT_FOREVER, REPEAT_ONCE};
