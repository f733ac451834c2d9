//! Render pipeline, run once per quantum on the real-time thread
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌──────┐   ┌──────────────┐   ┌──────────┐
//! │ drain        │──►│ synth     │──►│ gain │──►│ de-interleave│──►│ report   │
//! │ mailboxes    │   │ 128 frames│   │      │   │ + zero-fill  │   │ position │
//! └──────────────┘   └───────────┘   └──────┘   └──────────────┘   └──────────┘
//! ```
//!
//! The steady-state path does no allocation, takes no locks and never logs.
//! Module buffers consumed here are dropped into the session's collector and
//! freed later on the control thread.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use basedrop::Owned;

use crate::types::{DEFAULT_SAMPLE_RATE, PLANAR_LEN, QUANTUM_FRAMES};

use super::command::{clamp_volume, ModuleData};
use super::events::{publish_event, PlayerEvent};
use super::position::{PositionReporter, ReportOutcome};
use super::session::SessionShared;
use super::synth::{ModuleSynth, REPEAT_FOREVER, REPEAT_ONCE};

/// Gains at or above this are treated as unity and skip the multiply
pub const UNITY_GAIN_THRESHOLD: f32 = 0.999;

// ─────────────────────────────────────────────────────────────────────────────
// Lock-free state mirror for the control thread
// ─────────────────────────────────────────────────────────────────────────────

/// Render state readable from the control thread without locking
///
/// Written by the render thread after it applies commands; `paused` is the
/// one flag the control thread writes directly. Relaxed ordering: these are
/// informational and may lag a quantum behind.
pub struct PlaybackAtomics {
    loaded: AtomicBool,
    ended: AtomicBool,
    paused: AtomicBool,
    looping: AtomicBool,
    /// Effective volume as `f32` bits
    volume: AtomicU32,
}

impl PlaybackAtomics {
    pub fn new(volume: f32, looping: bool) -> Self {
        Self {
            loaded: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            looping: AtomicBool::new(looping),
            volume: AtomicU32::new(volume.to_bits()),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Back to the state of a fresh session, keeping volume and loop setting
    pub(crate) fn reset(&self) {
        self.loaded.store(false, Ordering::Relaxed);
        self.ended.store(false, Ordering::Relaxed);
        self.paused.store(false, Ordering::Relaxed);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Playback state (render thread only)
// ─────────────────────────────────────────────────────────────────────────────

/// The synth plus the settings applied on top of it
pub struct PlaybackState<S> {
    synth: S,
    /// Output gain, always within 0..=1
    volume: f32,
    /// Repeat count handed to the synth after every load
    repeat: i32,
}

impl<S: ModuleSynth> PlaybackState<S> {
    pub fn new(synth: S, volume: f32, looping: bool) -> Self {
        Self {
            synth,
            volume: clamp_volume(volume).unwrap_or(1.0),
            repeat: if looping { REPEAT_FOREVER } else { REPEAT_ONCE },
        }
    }

    #[inline]
    pub fn synth(&self) -> &S {
        &self.synth
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    #[inline]
    pub fn repeat_count(&self) -> i32 {
        self.repeat
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.synth.is_loaded()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Renderer
// ─────────────────────────────────────────────────────────────────────────────

/// Render-thread half of a session
///
/// Move this into the audio callback. It exclusively owns the synth and is
/// the only writer of the position snapshot and the event queue.
pub struct Renderer<S: ModuleSynth> {
    shared: Arc<SessionShared>,
    state: PlaybackState<S>,
    reporter: PositionReporter,
    events: rtrb::Producer<PlayerEvent>,
    /// Used when the host reports a sample rate of zero
    fallback_rate: u32,
}

impl<S: ModuleSynth> Renderer<S> {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        state: PlaybackState<S>,
        reporter: PositionReporter,
        events: rtrb::Producer<PlayerEvent>,
        fallback_rate: Option<u32>,
    ) -> Self {
        Self {
            shared,
            state,
            reporter,
            events,
            fallback_rate: fallback_rate.filter(|&r| r > 0).unwrap_or(DEFAULT_SAMPLE_RATE),
        }
    }

    /// Render one quantum into `out` (planar: 128 left samples, then 128 right)
    ///
    /// Returns the number of frames the synth produced. Anything short of a
    /// full quantum is zero-filled, so `out` is always completely written.
    pub fn process(&mut self, sample_rate: u32, out: &mut [f32; PLANAR_LEN]) -> usize {
        let sample_rate = if sample_rate == 0 {
            self.fallback_rate
        } else {
            sample_rate
        };

        self.drain_commands();

        if self.shared.atomics.is_paused() || !self.state.is_loaded() {
            out.fill(0.0);
            return 0;
        }

        let mut interleaved = [0.0f32; PLANAR_LEN];
        let frames = self
            .state
            .synth
            .read_interleaved_stereo(sample_rate, QUANTUM_FRAMES, &mut interleaved)
            .min(QUANTUM_FRAMES);

        if frames == 0 {
            out.fill(0.0);
            self.handle_end_of_stream();
            return 0;
        }

        apply_gain(&mut interleaved[..frames * 2], self.state.volume);
        deinterleave(&interleaved, frames, out);

        self.shared.atomics.ended.store(false, Ordering::Relaxed);
        self.reporter
            .after_render(&self.state.synth, sample_rate, &self.shared.snapshot);
        frames
    }

    /// Playback state as seen by the render thread
    pub fn state(&self) -> &PlaybackState<S> {
        &self.state
    }

    /// Sample rate substituted for a host rate of zero
    pub fn fallback_rate(&self) -> u32 {
        self.fallback_rate
    }

    /// Apply every pending command in a fixed order
    fn drain_commands(&mut self) {
        if self.shared.mailboxes.take_unload() {
            self.unload_module();
        }

        if let Some(data) = self.shared.mailboxes.take_load() {
            self.load_module(data);
        }

        if let Some((order, row)) = self.shared.mailboxes.take_seek() {
            if self.state.is_loaded() {
                self.state.synth.seek_order_row(order, row);
                self.after_seek();
            }
        }

        if let Some(seconds) = self.shared.mailboxes.take_seek_seconds() {
            if self.state.is_loaded() {
                self.state.synth.seek_seconds(seconds);
                self.after_seek();
            }
        }

        if let Some(looping) = self.shared.mailboxes.take_loop() {
            self.state.repeat = if looping { REPEAT_FOREVER } else { REPEAT_ONCE };
            if self.state.is_loaded() {
                self.state.synth.set_repeat_count(self.state.repeat);
            }
            self.shared.atomics.looping.store(looping, Ordering::Relaxed);
        }

        if let Some(volume) = self.shared.mailboxes.take_volume() {
            self.state.volume = volume;
            self.shared
                .atomics
                .volume
                .store(volume.to_bits(), Ordering::Relaxed);
        }
    }

    /// (Re)initialize the synth from a transferred buffer
    ///
    /// The buffer is released when this returns, whether or not the synth
    /// accepted it.
    fn load_module(&mut self, data: Owned<ModuleData>) {
        let len = data.len();
        let result = self.state.synth.load(data.bytes());
        // Deferred: freed by the control thread's next collect, not here.
        // Loading is not the steady-state path; the synth decode allocates.
        drop(data);

        self.reporter.reset();
        self.shared.atomics.ended.store(false, Ordering::Relaxed);

        match result {
            Ok(()) => {
                self.state.synth.set_repeat_count(self.state.repeat);
                self.shared.atomics.loaded.store(true, Ordering::Relaxed);
                let metadata = self.state.synth.metadata();
                log::info!(
                    "Loaded module '{}' ({} bytes, {} channels, {:.1}s)",
                    metadata.title,
                    len,
                    metadata.num_channels,
                    metadata.duration_seconds
                );
                // Skip boxing when the control thread isn't draining events
                if self.events.slots() > 0 {
                    publish_event(&mut self.events, PlayerEvent::Loaded(Box::new(metadata)));
                }
            }
            Err(e) => {
                log::error!("Failed to load module ({} bytes): {}", len, e);
                self.state.synth.unload();
                self.shared.atomics.loaded.store(false, Ordering::Relaxed);
                publish_event(&mut self.events, PlayerEvent::LoadFailed);
            }
        }
    }

    fn unload_module(&mut self) {
        if self.state.is_loaded() {
            self.state.synth.unload();
            log::info!("Module unloaded");
            publish_event(&mut self.events, PlayerEvent::Unloaded);
        }
        self.reporter.reset();
        self.shared.atomics.loaded.store(false, Ordering::Relaxed);
        self.shared.atomics.ended.store(false, Ordering::Relaxed);
    }

    fn after_seek(&mut self) {
        self.reporter.reset();
        self.shared.atomics.ended.store(false, Ordering::Relaxed);
    }

    fn handle_end_of_stream(&mut self) {
        if self.reporter.end_of_stream(&self.shared.snapshot) == ReportOutcome::Ended {
            log::info!("Playback reached end of module");
            self.shared.atomics.ended.store(true, Ordering::Relaxed);
            publish_event(&mut self.events, PlayerEvent::Ended);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sample helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Scale samples in place, skipping the pass at (near) unity gain
#[inline]
pub fn apply_gain(samples: &mut [f32], volume: f32) {
    if volume >= UNITY_GAIN_THRESHOLD {
        return;
    }
    for sample in samples.iter_mut() {
        *sample *= volume;
    }
}

/// Split interleaved stereo into planar `[L0..L127, R0..R127]`
///
/// Frames past `frames` are zeroed in both channels.
#[inline]
pub fn deinterleave(interleaved: &[f32], frames: usize, out: &mut [f32; PLANAR_LEN]) {
    let frames = frames.min(QUANTUM_FRAMES).min(interleaved.len() / 2);
    let (left, right) = out.split_at_mut(QUANTUM_FRAMES);

    for (i, frame) in interleaved[..frames * 2].chunks_exact(2).enumerate() {
        left[i] = frame[0];
        right[i] = frame[1];
    }
    left[frames..].fill(0.0);
    right[frames..].fill(0.0);
}
