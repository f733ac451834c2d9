//! Module synthesis collaborator
//!
//! The render pipeline doesn't decode tracker modules itself. It drives an
//! implementation of [`ModuleSynth`] (typically a libopenmpt binding) that
//! lives on the render thread for the whole session.

use crate::types::ModuleMetadata;

use super::error::SynthError;

/// Repeat count for endless playback
pub const REPEAT_FOREVER: i32 = -1;

/// Repeat count for playing the module once
pub const REPEAT_ONCE: i32 = 0;

/// A stateful tracker module player
///
/// Owned exclusively by the render thread. Only `load` and `unload` may
/// allocate or free; everything else is called once per quantum and must be
/// real-time safe.
pub trait ModuleSynth: Send {
    /// Replace the current module with one decoded from `data`
    ///
    /// Any previous module is torn down first, so a failed load leaves the
    /// synth empty. `data` is only borrowed for the duration of the call.
    fn load(&mut self, data: &[u8]) -> Result<(), SynthError>;

    /// Tear down the current module (no-op when empty)
    fn unload(&mut self);

    /// True after a successful `load` until `unload`
    fn is_loaded(&self) -> bool;

    /// Render interleaved stereo frames into `out` (`frames * 2` samples)
    ///
    /// Returns the number of frames rendered. Zero means the module reached
    /// its end, honoring the configured repeat count.
    fn read_interleaved_stereo(&mut self, sample_rate: u32, frames: usize, out: &mut [f32]) -> usize;

    /// Jump to a row within an order
    fn seek_order_row(&mut self, order: u32, row: u32);

    /// Jump to a time position in seconds
    fn seek_seconds(&mut self, seconds: f64);

    /// Set how often the module repeats ([`REPEAT_FOREVER`], [`REPEAT_ONCE`], or n)
    fn set_repeat_count(&mut self, count: i32);

    fn current_order(&self) -> i32;
    fn current_row(&self) -> i32;
    /// Pattern playing at the current order
    fn current_pattern(&self) -> i32;
    fn position_seconds(&self) -> f64;
    fn estimated_bpm(&self) -> f64;
    fn num_channels(&self) -> usize;

    /// Mono level of one channel, 0..=1
    fn channel_level(&self, channel: usize) -> f32;

    /// One-shot metadata for the loaded module
    fn metadata(&self) -> ModuleMetadata;
}

impl<S: ModuleSynth + ?Sized> ModuleSynth for Box<S> {
    fn load(&mut self, data: &[u8]) -> Result<(), SynthError> {
        (**self).load(data)
    }

    fn unload(&mut self) {
        (**self).unload()
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }

    fn read_interleaved_stereo(&mut self, sample_rate: u32, frames: usize, out: &mut [f32]) -> usize {
        (**self).read_interleaved_stereo(sample_rate, frames, out)
    }

    fn seek_order_row(&mut self, order: u32, row: u32) {
        (**self).seek_order_row(order, row)
    }

    fn seek_seconds(&mut self, seconds: f64) {
        (**self).seek_seconds(seconds)
    }

    fn set_repeat_count(&mut self, count: i32) {
        (**self).set_repeat_count(count)
    }

    fn current_order(&self) -> i32 {
        (**self).current_order()
    }

    fn current_row(&self) -> i32 {
        (**self).current_row()
    }

    fn current_pattern(&self) -> i32 {
        (**self).current_pattern()
    }

    fn position_seconds(&self) -> f64 {
        (**self).position_seconds()
    }

    fn estimated_bpm(&self) -> f64 {
        (**self).estimated_bpm()
    }

    fn num_channels(&self) -> usize {
        (**self).num_channels()
    }

    fn channel_level(&self, channel: usize) -> f32 {
        (**self).channel_level(channel)
    }

    fn metadata(&self) -> ModuleMetadata {
        (**self).metadata()
    }
}
