//! Render → control lifecycle notifications
//!
//! Position telemetry goes through the snapshot slot because only the newest
//! value matters. Lifecycle events are different: every one of them should
//! reach the control thread, so they travel over a bounded `rtrb` ring in
//! the opposite direction to the command mailboxes.

use crate::types::ModuleMetadata;

/// Default ring capacity for lifecycle events
///
/// Events are rare (one per load/unload/end), 32 is plenty of headroom for
/// a control thread that polls once per UI frame.
pub const DEFAULT_EVENT_CAPACITY: usize = 32;

/// Lifecycle events published by the render thread
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A module was decoded and is now playing
    ///
    /// Boxed to keep the enum small in the ring.
    Loaded(Box<ModuleMetadata>),
    /// The synth rejected the module; the session is now empty
    LoadFailed,
    /// The current module was torn down on request
    Unloaded,
    /// Playback reached the end of the module
    Ended,
}

/// Create an event channel (producer for the render thread, consumer for control)
pub fn event_channel(capacity: usize) -> (rtrb::Producer<PlayerEvent>, rtrb::Consumer<PlayerEvent>) {
    rtrb::RingBuffer::new(capacity.max(1))
}

/// Push an event, dropping it if the control thread has fallen behind
///
/// Never blocks and never logs. Returns whether the event was queued.
pub(crate) fn publish_event(tx: &mut rtrb::Producer<PlayerEvent>, event: PlayerEvent) -> bool {
    tx.push(event).is_ok()
}
