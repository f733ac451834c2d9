//! Lock-free command mailboxes for real-time playback control
//!
//! The control thread writes requests, the render thread drains them at the
//! start of every quantum. Unlike a queue, each command kind is a single-slot
//! mailbox: a new write replaces an unread one (last-write-wins), and the
//! render thread reads with exchange-and-reset so every request is applied
//! at most once.
//!
//! | Mailbox       | Storage                               | Empty sentinel |
//! |---------------|---------------------------------------|----------------|
//! | load          | `AtomicCell<Option<Owned<ModuleData>>>` | `None`       |
//! | seek          | `AtomicU64` = `order << 32 \| row`     | `u64::MAX`     |
//! | seek seconds  | `AtomicU64` = `f64` bits               | `u64::MAX`     |
//! | loop          | `AtomicU8`                             | `0`            |
//! | volume        | `AtomicU32` = clamped `f32` bits       | `u32::MAX`     |
//! | unload        | `AtomicBool`                           | `false`        |
//!
//! The seek target travels as one word so the render thread can never see
//! a new order paired with a stale row.
//!
//! There is no ordering between different mailboxes; the render thread
//! drains them in a fixed order (see [`Renderer`](super::Renderer)).

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use basedrop::Owned;
use crossbeam::atomic::AtomicCell;

use super::error::{LoadError, LoadResult};

const SEEK_NONE: u64 = u64::MAX;
const SECONDS_NONE: u64 = u64::MAX;
const VOLUME_NONE: u32 = u32::MAX;

const LOOP_NONE: u8 = 0;
const LOOP_DISABLED: u8 = 1;
const LOOP_ENABLED: u8 = 2;

/// Module file bytes handed from the control thread to the render thread
pub struct ModuleData {
    bytes: Box<[u8]>,
}

impl ModuleData {
    /// Copy caller bytes into a fresh allocation
    ///
    /// Fails on empty input or when the allocation can't be satisfied.
    pub fn copy_from(data: &[u8]) -> LoadResult<Self> {
        if data.is_empty() {
            return Err(LoadError::EmptyInput);
        }
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(data.len())
            .map_err(|source| LoadError::Allocation {
                len: data.len(),
                source,
            })?;
        bytes.extend_from_slice(data);
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Take ownership of an existing buffer without copying
    pub fn from_vec(data: Vec<u8>) -> LoadResult<Self> {
        if data.is_empty() {
            return Err(LoadError::EmptyInput);
        }
        Ok(Self {
            bytes: data.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Pack a seek target into one word
///
/// Returns `None` when either component is negative; such requests are
/// never stored.
#[inline]
fn pack_seek(order: i32, row: i32) -> Option<u64> {
    if order < 0 || row < 0 {
        return None;
    }
    Some(((order as u64) << 32) | row as u64)
}

#[inline]
fn unpack_seek(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// Clamp a requested volume to 0..=1, rejecting NaN
#[inline]
pub fn clamp_volume(volume: f32) -> Option<f32> {
    if volume.is_nan() {
        None
    } else {
        Some(volume.clamp(0.0, 1.0))
    }
}

/// The set of single-slot mailboxes shared by both halves of a session
///
/// `submit_*` methods belong to the control thread, `take_*` methods to the
/// render thread. All of them are wait-free.
pub struct CommandMailboxes {
    load: AtomicCell<Option<Owned<ModuleData>>>,
    seek: AtomicU64,
    seek_seconds: AtomicU64,
    looping: AtomicU8,
    volume: AtomicU32,
    unload: AtomicBool,
}

impl CommandMailboxes {
    /// Create mailboxes with every slot empty
    pub fn new() -> Self {
        Self {
            load: AtomicCell::new(None),
            seek: AtomicU64::new(SEEK_NONE),
            seek_seconds: AtomicU64::new(SECONDS_NONE),
            looping: AtomicU8::new(LOOP_NONE),
            volume: AtomicU32::new(VOLUME_NONE),
            unload: AtomicBool::new(false),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Control thread
    // ─────────────────────────────────────────────────────────────

    /// Post a module buffer for the render thread
    ///
    /// Returns the still-unread previous buffer, if any. The caller releases
    /// it; it is never applied.
    pub fn submit_load(&self, data: Owned<ModuleData>) -> Option<Owned<ModuleData>> {
        self.load.swap(Some(data))
    }

    /// Withdraw a pending load that the render thread hasn't picked up yet
    pub fn cancel_load(&self) -> Option<Owned<ModuleData>> {
        self.load.take()
    }

    /// Request a jump to `(order, row)`
    ///
    /// Returns false (and stores nothing) when either component is negative.
    pub fn submit_seek(&self, order: i32, row: i32) -> bool {
        match pack_seek(order, row) {
            Some(word) => {
                self.seek.store(word, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Request a jump to a time position
    ///
    /// Negative or non-finite positions are ignored.
    pub fn submit_seek_seconds(&self, seconds: f64) -> bool {
        if !seconds.is_finite() || seconds < 0.0 {
            return false;
        }
        self.seek_seconds.store(seconds.to_bits(), Ordering::Release);
        true
    }

    /// Request looping on or off
    pub fn submit_loop(&self, enabled: bool) {
        let value = if enabled { LOOP_ENABLED } else { LOOP_DISABLED };
        self.looping.store(value, Ordering::Release);
    }

    /// Request a new volume, clamped to 0..=1
    ///
    /// Returns the stored value, or `None` for NaN (ignored).
    pub fn submit_volume(&self, volume: f32) -> Option<f32> {
        let clamped = clamp_volume(volume)?;
        self.volume.store(clamped.to_bits(), Ordering::Release);
        Some(clamped)
    }

    /// Request teardown of the loaded module
    pub fn submit_unload(&self) {
        self.unload.store(true, Ordering::Release);
    }

    /// Restore every mailbox to its empty state
    ///
    /// Returns the pending load buffer (if any) for the caller to release.
    pub fn reset(&self) -> Option<Owned<ModuleData>> {
        self.seek.store(SEEK_NONE, Ordering::Release);
        self.seek_seconds.store(SECONDS_NONE, Ordering::Release);
        self.looping.store(LOOP_NONE, Ordering::Release);
        self.volume.store(VOLUME_NONE, Ordering::Release);
        self.unload.store(false, Ordering::Release);
        self.load.take()
    }

    // ─────────────────────────────────────────────────────────────
    // Render thread
    // ─────────────────────────────────────────────────────────────

    /// Take ownership of the pending module buffer
    #[inline]
    pub fn take_load(&self) -> Option<Owned<ModuleData>> {
        self.load.take()
    }

    /// Take the pending seek target as `(order, row)`
    #[inline]
    pub fn take_seek(&self) -> Option<(u32, u32)> {
        match self.seek.swap(SEEK_NONE, Ordering::AcqRel) {
            SEEK_NONE => None,
            word => Some(unpack_seek(word)),
        }
    }

    /// Take the pending time seek in seconds
    #[inline]
    pub fn take_seek_seconds(&self) -> Option<f64> {
        match self.seek_seconds.swap(SECONDS_NONE, Ordering::AcqRel) {
            SECONDS_NONE => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    /// Take the pending loop request
    #[inline]
    pub fn take_loop(&self) -> Option<bool> {
        match self.looping.swap(LOOP_NONE, Ordering::AcqRel) {
            LOOP_ENABLED => Some(true),
            LOOP_DISABLED => Some(false),
            _ => None,
        }
    }

    /// Take the pending volume (already clamped)
    #[inline]
    pub fn take_volume(&self) -> Option<f32> {
        match self.volume.swap(VOLUME_NONE, Ordering::AcqRel) {
            VOLUME_NONE => None,
            bits => Some(f32::from_bits(bits)),
        }
    }

    /// Take the pending unload request
    #[inline]
    pub fn take_unload(&self) -> bool {
        self.unload.swap(false, Ordering::AcqRel)
    }
}

impl Default for CommandMailboxes {
    fn default() -> Self {
        Self::new()
    }
}
