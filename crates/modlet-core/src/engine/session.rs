//! Playback session: the context object shared by both threads
//!
//! A session is created once per audio stream and immediately split into two
//! halves:
//!
//! - [`Controller`] stays on the control thread. It submits commands, polls
//!   telemetry and events, and owns the collector that frees module buffers.
//! - [`Renderer`] moves into the real-time callback and owns the synth.
//!
//! Both halves hold the same [`SessionShared`], which contains only lock-free
//! state. Nothing is global, so any number of sessions can run side by side.

use std::sync::Arc;

use crate::config::PlayerConfig;
use crate::types::PositionSnapshot;

use super::command::{CommandMailboxes, ModuleData};
use super::error::LoadResult;
use super::events::{event_channel, PlayerEvent};
use super::gc::BufferCollector;
use super::position::{PositionReporter, SnapshotSlot};
use super::render::{PlaybackAtomics, PlaybackState, Renderer};
use super::synth::ModuleSynth;

/// State reachable from both halves of a session
pub(crate) struct SessionShared {
    pub(crate) mailboxes: CommandMailboxes,
    pub(crate) snapshot: SnapshotSlot,
    pub(crate) atomics: PlaybackAtomics,
}

/// Create a session around `synth` and split it into its two halves
///
/// The [`Controller`] stays on the calling thread; move the [`Renderer`]
/// into the audio callback.
pub fn new_session<S: ModuleSynth>(synth: S, config: &PlayerConfig) -> (Controller, Renderer<S>) {
    let volume = config.effective_volume();
    let shared = Arc::new(SessionShared {
        mailboxes: CommandMailboxes::new(),
        snapshot: SnapshotSlot::new(),
        atomics: PlaybackAtomics::new(volume, config.start_looping),
    });
    let (event_tx, event_rx) = event_channel(config.event_capacity);

    let renderer = Renderer::new(
        Arc::clone(&shared),
        PlaybackState::new(synth, volume, config.start_looping),
        PositionReporter::new(config.report_interval_secs()),
        event_tx,
        config.sample_rate,
    );
    let controller = Controller {
        shared,
        collector: BufferCollector::new(),
        events: event_rx,
    };

    log::debug!(
        "Session created (volume {:.2}, looping {}, report interval {:.1}ms)",
        volume,
        config.start_looping,
        config.report_interval_ms
    );
    (controller, renderer)
}

/// Control-thread half of a session
///
/// Every method returns immediately. Commands are coalesced: a second
/// request of the same kind before the render thread runs replaces the first.
pub struct Controller {
    shared: Arc<SessionShared>,
    collector: BufferCollector,
    events: rtrb::Consumer<PlayerEvent>,
}

impl Controller {
    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    /// Copy `data` and hand it to the render thread
    ///
    /// Returns false on empty input or allocation failure, leaving all state
    /// untouched. Acceptance only means the request was queued; whether the
    /// synth could decode it shows up as a [`PlayerEvent`].
    pub fn load(&mut self, data: &[u8]) -> bool {
        match self.try_load(data) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Rejected module load: {}", e);
                false
            }
        }
    }

    /// Like [`load`](Self::load), but takes ownership instead of copying
    pub fn load_owned(&mut self, data: Vec<u8>) -> bool {
        match ModuleData::from_vec(data) {
            Ok(data) => {
                self.submit(data);
                true
            }
            Err(e) => {
                log::warn!("Rejected module load: {}", e);
                false
            }
        }
    }

    /// Copy `data` and hand it to the render thread, reporting why it failed
    pub fn try_load(&mut self, data: &[u8]) -> LoadResult<()> {
        let data = ModuleData::copy_from(data)?;
        self.submit(data);
        Ok(())
    }

    fn submit(&mut self, data: ModuleData) {
        let len = data.len();
        let owned = self.collector.adopt(data);
        if let Some(superseded) = self.shared.mailboxes.submit_load(owned) {
            log::debug!(
                "Load of {} bytes supersedes unread request of {} bytes",
                len,
                superseded.len()
            );
        }
        self.collector.collect();
    }

    /// Tear down the current module (idempotent)
    ///
    /// A load that the render thread hasn't picked up yet is discarded too.
    pub fn unload(&mut self) {
        if let Some(pending) = self.shared.mailboxes.cancel_load() {
            log::debug!("Discarding pending load of {} bytes", pending.len());
        }
        self.shared.mailboxes.submit_unload();
        self.collector.collect();
    }

    /// Unload and return every channel to its initial state (idempotent)
    pub fn cleanup(&mut self) {
        drop(self.shared.mailboxes.reset());
        self.shared.mailboxes.submit_unload();
        self.shared.atomics.reset();

        // Safety: the controller is the snapshot slot's only reader
        unsafe { self.shared.snapshot.discard() };
        while self.events.pop().is_ok() {}

        self.collector.collect();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    /// Jump to `row` of `order`; negative values are ignored
    pub fn seek(&mut self, order: i32, row: i32) {
        if !self.shared.mailboxes.submit_seek(order, row) {
            log::warn!("Ignoring seek to order {} row {}", order, row);
        }
    }

    /// Jump to a time position; negative or non-finite values are ignored
    pub fn seek_seconds(&mut self, seconds: f64) {
        if !self.shared.mailboxes.submit_seek_seconds(seconds) {
            log::warn!("Ignoring seek to {}s", seconds);
        }
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.shared.mailboxes.submit_loop(enabled);
    }

    /// Set output gain, clamped to 0..=1 (NaN is ignored)
    pub fn set_volume(&mut self, volume: f32) {
        if self.shared.mailboxes.submit_volume(volume).is_none() {
            log::warn!("Ignoring non-numeric volume");
        }
    }

    /// Hold output at silence without advancing the module
    pub fn pause(&mut self) {
        self.shared.atomics.set_paused(true);
    }

    pub fn resume(&mut self) {
        self.shared.atomics.set_paused(false);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Telemetry
    // ─────────────────────────────────────────────────────────────────────────

    /// Newest position snapshot, if one was published since the last poll
    ///
    /// Also frees module buffers the render thread has finished with.
    pub fn poll(&mut self) -> Option<&PositionSnapshot> {
        self.collector.collect();
        // Safety: the controller is the snapshot slot's only reader, and the
        // returned borrow ends before the next poll
        unsafe { self.shared.snapshot.poll() }
    }

    /// Next lifecycle event from the render thread
    pub fn poll_event(&mut self) -> Option<PlayerEvent> {
        self.events.pop().ok()
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.shared.atomics.is_loaded()
    }

    #[inline]
    pub fn is_ended(&self) -> bool {
        self.shared.atomics.is_ended()
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.shared.atomics.is_paused()
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.shared.atomics.is_looping()
    }

    /// Volume currently applied by the render thread
    #[inline]
    pub fn volume(&self) -> f32 {
        self.shared.atomics.volume()
    }

    /// Module buffers not yet freed
    pub fn live_buffers(&self) -> usize {
        self.collector.live_buffers()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedSynth;
    use crate::engine::LoadError;
    use crate::types::PLANAR_LEN;

    fn session() -> (Controller, Renderer<ScriptedSynth>) {
        new_session(ScriptedSynth::new(), &PlayerConfig::default())
    }

    fn render(renderer: &mut Renderer<ScriptedSynth>) -> usize {
        let mut out = [0.0; PLANAR_LEN];
        renderer.process(48000, &mut out)
    }

    #[test]
    fn test_empty_load_rejected() {
        let (mut ctl, mut renderer) = session();
        assert!(!ctl.load(&[]));
        assert!(!ctl.load_owned(Vec::new()));
        assert!(matches!(ctl.try_load(&[]), Err(LoadError::EmptyInput)));
        assert_eq!(ctl.live_buffers(), 0);

        render(&mut renderer);
        assert!(!ctl.is_loaded());
        assert!(ctl.poll_event().is_none());
    }

    #[test]
    fn test_load_event_carries_metadata() {
        let (mut ctl, mut renderer) = session();
        assert!(ctl.load_owned(vec![3; 500]));
        render(&mut renderer);

        match ctl.poll_event() {
            Some(PlayerEvent::Loaded(meta)) => assert_eq!(meta.title, "scripted 500 bytes"),
            other => panic!("expected Loaded, got {:?}", other),
        }
    }

    #[test]
    fn test_unload_and_cleanup_idempotent() {
        let (mut ctl, mut renderer) = session();
        ctl.unload();
        ctl.unload();
        ctl.cleanup();
        ctl.cleanup();
        render(&mut renderer);
        assert!(ctl.poll_event().is_none());

        ctl.load(&[1; 10]);
        render(&mut renderer);
        assert!(ctl.is_loaded());
        assert!(matches!(ctl.poll_event(), Some(PlayerEvent::Loaded(_))));

        ctl.unload();
        render(&mut renderer);
        assert!(!ctl.is_loaded());
        assert_eq!(ctl.poll_event(), Some(PlayerEvent::Unloaded));

        // Second unload has nothing to tear down
        ctl.unload();
        render(&mut renderer);
        assert!(ctl.poll_event().is_none());
        assert_eq!(render(&mut renderer), 0);
    }

    #[test]
    fn test_unload_discards_pending_load() {
        let (mut ctl, mut renderer) = session();
        ctl.load(&[1; 10]);
        ctl.unload();
        assert_eq!(ctl.live_buffers(), 0);

        render(&mut renderer);
        assert!(!ctl.is_loaded());
        assert_eq!(renderer.state().synth().loads, 0);
    }

    #[test]
    fn test_cleanup_resets_channels() {
        let (mut ctl, mut renderer) = session();
        ctl.load(&[1; 10]);
        render(&mut renderer);

        ctl.load(&[2; 10]);
        ctl.seek(1, 2);
        ctl.pause();
        ctl.cleanup();

        assert!(ctl.poll().is_none());
        assert!(ctl.poll_event().is_none());
        assert!(!ctl.is_paused());
        assert_eq!(ctl.live_buffers(), 0);

        render(&mut renderer);
        let synth = renderer.state().synth();
        assert_eq!(synth.loads, 1);
        assert!(synth.seeks.is_empty());
        assert!(!synth.is_loaded());
    }

    #[test]
    fn test_superseded_load_freed_immediately() {
        let (mut ctl, mut renderer) = session();
        ctl.load(&[1; 100]);
        ctl.load(&[2; 200]);
        assert_eq!(ctl.live_buffers(), 1);

        render(&mut renderer);
        assert_eq!(renderer.state().synth().loads, 1);
        assert_eq!(renderer.state().synth().last_load_len, 200);
    }

    #[test]
    fn test_consumed_buffer_released() {
        let (mut ctl, mut renderer) = session();
        ctl.load(&[1; 100]);
        render(&mut renderer);
        // Render thread dropped it; poll collects
        ctl.poll();
        assert_eq!(ctl.live_buffers(), 0);
    }

    #[test]
    fn test_poll_at_most_once() {
        let (mut ctl, mut renderer) = session();
        ctl.load(&[1; 10]);
        render(&mut renderer);
        assert!(ctl.poll().is_some());
        assert!(ctl.poll().is_none());
    }

    #[test]
    fn test_render_on_worker_thread() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let (mut ctl, mut renderer) = new_session(
            ScriptedSynth::new().with_length(128 * 50),
            &PlayerConfig {
                start_looping: false,
                ..PlayerConfig::default()
            },
        );
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut out = [0.0; PLANAR_LEN];
                while !stop.load(Ordering::Relaxed) {
                    renderer.process(48000, &mut out);
                    std::thread::yield_now();
                }
                renderer
            })
        };

        assert!(ctl.load(&[5; 1000]));
        ctl.set_volume(0.5);

        let mut events = Vec::new();
        let mut saw_ended_snapshot = false;
        for _ in 0..100_000 {
            if let Some(snap) = ctl.poll() {
                if snap.is_ended() {
                    saw_ended_snapshot = true;
                }
            }
            while let Some(event) = ctl.poll_event() {
                events.push(event);
            }
            if saw_ended_snapshot && events.contains(&PlayerEvent::Ended) {
                break;
            }
            std::thread::yield_now();
        }

        stop.store(true, Ordering::Relaxed);
        let renderer = worker.join().unwrap();

        assert!(saw_ended_snapshot);
        assert!(matches!(events.first(), Some(PlayerEvent::Loaded(_))));
        assert!(events.contains(&PlayerEvent::Ended));
        assert_eq!(renderer.state().volume(), 0.5);

        ctl.poll();
        assert_eq!(ctl.live_buffers(), 0);
    }
}
