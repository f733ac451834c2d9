//! Position telemetry from the render thread to the control thread
//!
//! Two pieces:
//!
//! - [`SnapshotSlot`]: a single-producer single-consumer triple buffer.
//!   The render thread fills its private slot and publishes by swapping it
//!   with the shared middle slot; the control thread polls by swapping the
//!   middle slot with its own. Both swaps are one CAS on a state byte, so
//!   neither side ever waits and the consumer can never observe a record
//!   that is still being written.
//! - [`PositionReporter`]: the render-side throttle deciding *when* to
//!   publish. Publishes on every row change, otherwise at most once per
//!   report interval (16ms by default, one UI frame).
//!
//! ```text
//!  render thread            state byte             control thread
//!  ┌────────────┐   publish  ┌────────┐   poll    ┌────────────┐
//!  │ back slot  │ ─────────► │ middle │ ────────► │ front slot │
//!  └────────────┘  set fresh └────────┘ clr fresh └────────────┘
//! ```

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::{PositionSnapshot, QUANTUM_FRAMES};

use super::synth::ModuleSynth;

/// Default minimum interval between throttled snapshots
pub const DEFAULT_REPORT_INTERVAL_SECS: f64 = 0.016;

// State byte layout: [fresh:1][unused:1][back:2][middle:2][front:2]
const FRONT_SHIFT: u8 = 0;
const MIDDLE_SHIFT: u8 = 2;
const BACK_SHIFT: u8 = 4;
const SLOT_MASK: u8 = 0b11;
const FRESH_BIT: u8 = 0x80;

const INITIAL_STATE: u8 = (2 << BACK_SHIFT) | (1 << MIDDLE_SHIFT) | (0 << FRONT_SHIFT);

#[inline]
fn decode(state: u8, shift: u8) -> u8 {
    (state >> shift) & SLOT_MASK
}

#[inline]
fn encode(back: u8, middle: u8, front: u8) -> u8 {
    (back << BACK_SHIFT) | (middle << MIDDLE_SHIFT) | (front << FRONT_SHIFT)
}

/// Triple-buffered single-slot mailbox for [`PositionSnapshot`]
///
/// Exactly one writer (render thread) and one reader (control thread).
/// The session enforces this by handing `&mut` access to each half only.
pub struct SnapshotSlot {
    slots: [UnsafeCell<PositionSnapshot>; 3],
    state: AtomicU8,
}

// Safety: the state byte hands each slot to exactly one side at a time;
// the writer only touches the back slot and the reader only the front slot.
unsafe impl Send for SnapshotSlot {}
unsafe impl Sync for SnapshotSlot {}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new(PositionSnapshot::default()),
                UnsafeCell::new(PositionSnapshot::default()),
                UnsafeCell::new(PositionSnapshot::default()),
            ],
            state: AtomicU8::new(INITIAL_STATE),
        }
    }

    /// Writer: copy a snapshot into the back slot and publish it
    ///
    /// # Safety
    /// Must only be called from the single writer.
    pub(crate) unsafe fn publish(&self, snapshot: &PositionSnapshot) {
        // The reader never moves the back index, so it is stable here
        let back = decode(self.state.load(Ordering::Acquire), BACK_SHIFT);
        *self.slots[back as usize].get() = *snapshot;

        let mut state = self.state.load(Ordering::Acquire);
        loop {
            let back = decode(state, BACK_SHIFT);
            let middle = decode(state, MIDDLE_SHIFT);
            let front = decode(state, FRONT_SHIFT);
            // Old middle becomes the new back slot, the written slot becomes middle
            let new_state = encode(middle, back, front) | FRESH_BIT;
            match self.state.compare_exchange_weak(
                state,
                new_state,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => state = actual,
            }
        }
    }

    /// Reader: take the newest snapshot if one was published since the last poll
    ///
    /// # Safety
    /// Must only be called from the single reader, and the returned
    /// reference must not outlive the next call.
    pub(crate) unsafe fn poll(&self) -> Option<&PositionSnapshot> {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & FRESH_BIT == 0 {
                return None;
            }
            let back = decode(state, BACK_SHIFT);
            let middle = decode(state, MIDDLE_SHIFT);
            let front = decode(state, FRONT_SHIFT);
            // Swap middle and front, clearing the fresh bit
            let new_state = encode(back, front, middle);
            match self.state.compare_exchange_weak(
                state,
                new_state,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(&*self.slots[middle as usize].get()),
                Err(actual) => state = actual,
            }
        }
    }

    /// Whether a published snapshot is waiting to be polled
    pub fn has_fresh(&self) -> bool {
        self.state.load(Ordering::Acquire) & FRESH_BIT != 0
    }

    /// Reader: drop any unread snapshot without looking at it
    ///
    /// # Safety
    /// Same contract as [`poll`](Self::poll).
    pub(crate) unsafe fn discard(&self) {
        let _ = self.poll();
    }
}

impl Default for SnapshotSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// What the reporter did after a quantum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Nothing published this quantum
    Skipped,
    /// A position snapshot was published
    Published,
    /// The end-of-stream snapshot was published
    Ended,
}

/// Render-side throttle for position snapshots
///
/// All state is per session; nothing is kept in statics.
pub struct PositionReporter {
    /// Seconds of rendered time since the last publish
    since_publish: f64,
    /// Row carried by the last published snapshot
    last_row: i32,
    /// Set once the ended snapshot went out, cleared when frames flow again
    ended: bool,
    /// Minimum seconds between publishes while the row is unchanged
    interval: f64,
    /// Scratch record, filled in place to avoid copying a fresh one per quantum
    scratch: PositionSnapshot,
}

impl PositionReporter {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            since_publish: 0.0,
            // Sentinel so the first rendered quantum always publishes
            last_row: i32::MIN,
            ended: false,
            interval: interval_secs.max(0.0),
            scratch: PositionSnapshot::default(),
        }
    }

    /// Forget throttle history (after load, seek or unload)
    pub fn reset(&mut self) {
        self.since_publish = 0.0;
        self.last_row = i32::MIN;
        self.ended = false;
    }

    /// Whether the ended snapshot has been published for the current run
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Account for one rendered quantum and publish if due
    pub(crate) fn after_render<S: ModuleSynth + ?Sized>(
        &mut self,
        synth: &S,
        sample_rate: u32,
        slot: &SnapshotSlot,
    ) -> ReportOutcome {
        self.ended = false;
        self.since_publish += QUANTUM_FRAMES as f64 / sample_rate.max(1) as f64;

        let row = synth.current_row();
        let row_changed = row != self.last_row;
        if !row_changed && self.since_publish < self.interval {
            return ReportOutcome::Skipped;
        }

        self.last_row = row;
        self.since_publish = 0.0;
        fill_snapshot(&mut self.scratch, synth);
        // Safety: the renderer owning this reporter is the slot's only writer
        unsafe { slot.publish(&self.scratch) };
        ReportOutcome::Published
    }

    /// Publish the ended snapshot on the transition into end-of-stream
    ///
    /// Bypasses the throttle. Repeated zero-frame quanta after the first one
    /// publish nothing.
    pub(crate) fn end_of_stream(&mut self, slot: &SnapshotSlot) -> ReportOutcome {
        if self.ended {
            return ReportOutcome::Skipped;
        }
        self.ended = true;
        self.since_publish = 0.0;
        self.last_row = crate::types::ENDED_ROW;
        self.scratch = PositionSnapshot::ended();
        // Safety: the renderer owning this reporter is the slot's only writer
        unsafe { slot.publish(&self.scratch) };
        ReportOutcome::Ended
    }
}

/// Copy the synth's transport state into a snapshot
fn fill_snapshot<S: ModuleSynth + ?Sized>(out: &mut PositionSnapshot, synth: &S) {
    out.position_ms = synth.position_seconds() * 1000.0;
    out.row = synth.current_row();
    out.order = synth.current_order();
    out.pattern = if out.order >= 0 { synth.current_pattern() } else { 0 };
    out.bpm = synth.estimated_bpm();

    let channels = synth.num_channels();
    out.num_channels = channels.min(i32::MAX as usize) as i32;
    out.levels.fill_with(channels, |ch| synth.channel_level(ch));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedSynth;
    use crate::types::ENDED_ROW;

    fn snapshot_with_row(row: i32) -> PositionSnapshot {
        PositionSnapshot {
            row,
            ..Default::default()
        }
    }

    #[test]
    fn test_slot_at_most_once() {
        let slot = SnapshotSlot::new();
        unsafe {
            assert!(slot.poll().is_none());
            slot.publish(&snapshot_with_row(5));
            assert_eq!(slot.poll().map(|s| s.row), Some(5));
            assert!(slot.poll().is_none());
        }
    }

    #[test]
    fn test_slot_latest_wins() {
        let slot = SnapshotSlot::new();
        unsafe {
            slot.publish(&snapshot_with_row(1));
            slot.publish(&snapshot_with_row(2));
            slot.publish(&snapshot_with_row(3));
            assert_eq!(slot.poll().map(|s| s.row), Some(3));
            assert!(slot.poll().is_none());
        }
    }

    #[test]
    fn test_slot_concurrent_records_never_torn() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let slot = Arc::new(SnapshotSlot::new());
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let slot = Arc::clone(&slot);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for i in 0..20_000 {
                    let snap = PositionSnapshot {
                        row: i,
                        order: i,
                        pattern: i,
                        num_channels: i,
                        ..Default::default()
                    };
                    unsafe { slot.publish(&snap) };
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut last = -1;
        while !done.load(Ordering::Acquire) || slot.has_fresh() {
            if let Some(snap) = unsafe { slot.poll() } {
                assert_eq!(snap.row, snap.order);
                assert_eq!(snap.row, snap.pattern);
                assert_eq!(snap.row, snap.num_channels);
                assert!(snap.row > last, "snapshots went backwards");
                last = snap.row;
            }
        }
        writer.join().unwrap();
        assert_eq!(last, 19_999);
    }

    #[test]
    fn test_throttle_holds_constant_row() {
        let slot = SnapshotSlot::new();
        let mut reporter = PositionReporter::new(0.010);
        let synth = ScriptedSynth::loaded().with_row(4);

        // First quantum always publishes
        assert_eq!(reporter.after_render(&synth, 48000, &slot), ReportOutcome::Published);

        // 128 frames @ 48kHz = 2.67ms; 10ms needs 4 quanta
        let mut outcomes = Vec::new();
        for _ in 0..12 {
            outcomes.push(reporter.after_render(&synth, 48000, &slot));
        }
        let published: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| **o == ReportOutcome::Published)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(published, vec![3, 7, 11]);
    }

    #[test]
    fn test_row_change_publishes_immediately() {
        let slot = SnapshotSlot::new();
        let mut reporter = PositionReporter::new(DEFAULT_REPORT_INTERVAL_SECS);
        let mut synth = ScriptedSynth::loaded().with_row(0);

        reporter.after_render(&synth, 48000, &slot);
        assert_eq!(reporter.after_render(&synth, 48000, &slot), ReportOutcome::Skipped);

        synth.set_row(1);
        assert_eq!(reporter.after_render(&synth, 48000, &slot), ReportOutcome::Published);
        assert_eq!(unsafe { slot.poll() }.map(|s| s.row), Some(1));
    }

    #[test]
    fn test_end_of_stream_once() {
        let slot = SnapshotSlot::new();
        let mut reporter = PositionReporter::new(DEFAULT_REPORT_INTERVAL_SECS);

        assert_eq!(reporter.end_of_stream(&slot), ReportOutcome::Ended);
        assert_eq!(reporter.end_of_stream(&slot), ReportOutcome::Skipped);

        let snap = unsafe { slot.poll() }.copied().unwrap();
        assert_eq!(snap.row, ENDED_ROW);
        assert!(unsafe { slot.poll() }.is_none());
    }

    #[test]
    fn test_fill_snapshot_from_synth() {
        let synth = ScriptedSynth::loaded()
            .with_row(7)
            .with_order(2)
            .with_channels(&[0.1, 0.9, 0.4]);
        let mut snap = PositionSnapshot::default();
        fill_snapshot(&mut snap, &synth);

        assert_eq!(snap.row, 7);
        assert_eq!(snap.order, 2);
        assert_eq!(snap.pattern, synth.current_pattern());
        assert_eq!(snap.num_channels, 3);
        assert_eq!(snap.levels.as_slice(), &[0.1, 0.9, 0.4]);
    }
}
