//! Host buffer adapter
//!
//! Devices ask for whatever buffer length they negotiated (256, 441, 512...),
//! interleaved across however many channels they have. The renderer only
//! produces planar 128-frame stereo quanta. [`QuantumAdapter`] sits between
//! the two: it keeps the current quantum and a read cursor, renders the next
//! quantum whenever the cursor runs off the end, and copies frames out.
//!
//! No allocation, so it runs inside the device callback.

use crate::engine::{ModuleSynth, Renderer};
use crate::types::{PLANAR_LEN, QUANTUM_FRAMES};

/// Drives a [`Renderer`] from host callbacks of any size
pub struct QuantumAdapter<S: ModuleSynth> {
    renderer: Renderer<S>,
    /// Current planar quantum
    quantum: [f32; PLANAR_LEN],
    /// Next frame of `quantum` to hand out
    cursor: usize,
    sample_rate: u32,
}

impl<S: ModuleSynth> QuantumAdapter<S> {
    pub fn new(renderer: Renderer<S>, sample_rate: u32) -> Self {
        Self {
            renderer,
            quantum: [0.0; PLANAR_LEN],
            // Exhausted, so the first fill renders
            cursor: QUANTUM_FRAMES,
            sample_rate,
        }
    }

    /// Fill an interleaved device buffer with `channels` channels per frame
    ///
    /// Mono devices get the average of left and right; channels beyond the
    /// first two are silent. A trailing partial frame is zeroed.
    pub fn fill(&mut self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        let mut frames = out.chunks_exact_mut(channels);
        for frame in &mut frames {
            if self.cursor >= QUANTUM_FRAMES {
                self.renderer.process(self.sample_rate, &mut self.quantum);
                self.cursor = 0;
            }

            let left = self.quantum[self.cursor];
            let right = self.quantum[QUANTUM_FRAMES + self.cursor];
            self.cursor += 1;

            if channels == 1 {
                frame[0] = (left + right) * 0.5;
                continue;
            }
            frame[0] = left;
            frame[1] = right;
            for ch in frame.iter_mut().skip(2) {
                *ch = 0.0;
            }
        }
        frames.into_remainder().fill(0.0);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn renderer(&self) -> &Renderer<S> {
        &self.renderer
    }

    /// Give the renderer back, discarding any frames not yet handed out
    pub fn into_renderer(self) -> Renderer<S> {
        self.renderer
    }
}
