//! Common types for Modlet
//!
//! Fixed-size records shared between the render thread and the control
//! thread: the render quantum geometry, the position snapshot published after
//! each render and the one-shot module metadata.

/// Default sample rate used when the host doesn't report one (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Number of stereo frames rendered per quantum
///
/// Matches the Web Audio render quantum. At 48kHz one quantum is ~2.7ms.
pub const QUANTUM_FRAMES: usize = 128;

/// Length of one planar output quantum: all left samples, then all right samples
pub const PLANAR_LEN: usize = QUANTUM_FRAMES * 2;

/// Maximum number of channels reported in a snapshot
pub const MAX_CHANNELS: usize = 32;

/// Row value marking a snapshot as "playback ended"
pub const ENDED_ROW: i32 = -1;

/// Audio sample type
pub type Sample = f32;

/// Per-channel levels with a fixed capacity of [`MAX_CHANNELS`]
///
/// Carries an explicit logical length; entries past it are always zero so the
/// whole array can be handed to a meter without checking `len` first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelLevels {
    values: [f32; MAX_CHANNELS],
    len: usize,
}

impl ChannelLevels {
    /// Create an empty set of levels
    pub const fn new() -> Self {
        Self {
            values: [0.0; MAX_CHANNELS],
            len: 0,
        }
    }

    /// Number of channels with a meaningful level
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Levels for the logical channels only
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.values[..self.len]
    }

    /// The full fixed-capacity array, zero past `len()`
    #[inline]
    pub fn as_array(&self) -> &[f32; MAX_CHANNELS] {
        &self.values
    }

    /// Level for one channel (0.0 beyond the logical length)
    #[inline]
    pub fn get(&self, channel: usize) -> f32 {
        if channel < self.len {
            self.values[channel]
        } else {
            0.0
        }
    }

    /// Refill from a per-channel source
    ///
    /// `count` is truncated to [`MAX_CHANNELS`]; levels are clamped to 0..=1
    /// and every slot past the new length is zeroed.
    pub fn fill_with(&mut self, count: usize, mut level: impl FnMut(usize) -> f32) {
        self.len = count.min(MAX_CHANNELS);
        for (ch, slot) in self.values.iter_mut().enumerate() {
            *slot = if ch < self.len {
                let v = level(ch);
                if v.is_nan() {
                    0.0
                } else {
                    v.clamp(0.0, 1.0)
                }
            } else {
                0.0
            };
        }
    }

    /// Reset to empty, zeroing all slots
    pub fn clear(&mut self) {
        self.values = [0.0; MAX_CHANNELS];
        self.len = 0;
    }
}

impl Default for ChannelLevels {
    fn default() -> Self {
        Self::new()
    }
}

/// Telemetry record published by the render thread
///
/// Fixed size with no heap data, so publishing is a plain copy into a
/// pre-allocated slot. A row of [`ENDED_ROW`] means playback reached the end
/// of the module and the other fields carry no meaning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSnapshot {
    /// Elapsed song position in milliseconds
    pub position_ms: f64,
    /// Current row, or [`ENDED_ROW`]
    pub row: i32,
    /// Pattern index playing at the current order
    pub pattern: i32,
    /// Current order (position in the order list)
    pub order: i32,
    /// Estimated tempo in BPM
    pub bpm: f64,
    /// Channel count of the module (may exceed the levels capacity)
    pub num_channels: i32,
    /// Per-channel mono levels (0..=1)
    pub levels: ChannelLevels,
}

impl PositionSnapshot {
    /// Snapshot signalling end of playback
    pub const fn ended() -> Self {
        Self {
            position_ms: 0.0,
            row: ENDED_ROW,
            pattern: 0,
            order: 0,
            bpm: 0.0,
            num_channels: 0,
            levels: ChannelLevels::new(),
        }
    }

    /// Whether this snapshot marks end of playback
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.row == ENDED_ROW
    }
}

impl Default for PositionSnapshot {
    fn default() -> Self {
        Self {
            position_ms: 0.0,
            row: 0,
            pattern: 0,
            order: 0,
            bpm: 0.0,
            num_channels: 0,
            levels: ChannelLevels::new(),
        }
    }
}

/// Module metadata, read once after a successful load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleMetadata {
    pub title: String,
    pub num_orders: i32,
    pub num_patterns: i32,
    pub num_channels: i32,
    pub duration_seconds: f64,
    pub initial_bpm: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_truncate_to_capacity() {
        let mut levels = ChannelLevels::new();
        levels.fill_with(40, |_| 0.5);

        assert_eq!(levels.len(), MAX_CHANNELS);
        assert!(levels.as_slice().iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_levels_zero_past_len() {
        let mut levels = ChannelLevels::new();
        levels.fill_with(8, |_| 1.0);
        levels.fill_with(3, |ch| ch as f32 * 0.25);

        assert_eq!(levels.as_slice(), &[0.0, 0.25, 0.5]);
        assert!(levels.as_array()[3..].iter().all(|&v| v == 0.0));
        assert_eq!(levels.get(5), 0.0);
    }

    #[test]
    fn test_levels_clamped() {
        let mut levels = ChannelLevels::new();
        levels.fill_with(3, |ch| [-0.5, 2.0, f32::NAN][ch]);
        assert_eq!(levels.as_slice(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_ended_snapshot() {
        assert!(PositionSnapshot::ended().is_ended());
        assert!(!PositionSnapshot::default().is_ended());
    }
}
