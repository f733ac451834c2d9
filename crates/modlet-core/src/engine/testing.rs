//! Scripted [`ModuleSynth`] for engine tests

use crate::types::ModuleMetadata;

use super::error::SynthError;
use super::synth::ModuleSynth;

/// Module bytes starting with this prefix fail to load
pub(crate) const INVALID_PREFIX: &[u8] = b"bad!";

/// Deterministic synth: constant sample value, fixed transport, optional length
pub(crate) struct ScriptedSynth {
    loaded: bool,
    sample: f32,
    row: i32,
    order: i32,
    levels: Vec<f32>,
    /// Frames a freshly loaded module plays before ending (None = endless)
    length: Option<usize>,
    remaining: Option<usize>,
    position: f64,
    pub repeat: i32,
    pub loads: usize,
    pub last_load_len: usize,
    pub seeks: Vec<(u32, u32)>,
    pub time_seeks: Vec<f64>,
}

impl ScriptedSynth {
    pub fn new() -> Self {
        Self {
            loaded: false,
            sample: 1.0,
            row: 0,
            order: 0,
            levels: vec![0.5; 4],
            length: None,
            remaining: None,
            position: 0.0,
            repeat: 0,
            loads: 0,
            last_load_len: 0,
            seeks: Vec::new(),
            time_seeks: Vec::new(),
        }
    }

    /// A synth that already has a module loaded
    pub fn loaded() -> Self {
        Self {
            loaded: true,
            ..Self::new()
        }
    }

    pub fn with_row(mut self, row: i32) -> Self {
        self.row = row;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_channels(mut self, levels: &[f32]) -> Self {
        self.levels = levels.to_vec();
        self
    }

    pub fn with_sample(mut self, sample: f32) -> Self {
        self.sample = sample;
        self
    }

    /// Loaded modules end after `frames` frames
    pub fn with_length(mut self, frames: usize) -> Self {
        self.length = Some(frames);
        self.remaining = Some(frames);
        self
    }

    pub fn set_row(&mut self, row: i32) {
        self.row = row;
    }
}

impl ModuleSynth for ScriptedSynth {
    fn load(&mut self, data: &[u8]) -> Result<(), SynthError> {
        self.unload();
        self.loads += 1;
        self.last_load_len = data.len();
        if data.starts_with(INVALID_PREFIX) {
            return Err(SynthError::InvalidModule("scripted failure".into()));
        }
        self.loaded = true;
        self.remaining = self.length;
        self.position = 0.0;
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = false;
        self.position = 0.0;
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn read_interleaved_stereo(&mut self, sample_rate: u32, frames: usize, out: &mut [f32]) -> usize {
        if !self.loaded {
            return 0;
        }
        // Endless repeat wraps to the start once the module has run out
        if self.remaining == Some(0) && self.repeat < 0 {
            self.remaining = self.length;
            self.row = 0;
        }
        let frames = match self.remaining {
            Some(left) => {
                let n = frames.min(left);
                self.remaining = Some(left - n);
                n
            }
            None => frames,
        };
        out[..frames * 2].fill(self.sample);
        self.position += frames as f64 / sample_rate as f64;
        frames
    }

    fn seek_order_row(&mut self, order: u32, row: u32) {
        self.seeks.push((order, row));
        self.order = order as i32;
        self.row = row as i32;
    }

    fn seek_seconds(&mut self, seconds: f64) {
        self.time_seeks.push(seconds);
        self.position = seconds;
    }

    fn set_repeat_count(&mut self, count: i32) {
        self.repeat = count;
    }

    fn current_order(&self) -> i32 {
        self.order
    }

    fn current_row(&self) -> i32 {
        self.row
    }

    fn current_pattern(&self) -> i32 {
        self.order * 2 + 1
    }

    fn position_seconds(&self) -> f64 {
        self.position
    }

    fn estimated_bpm(&self) -> f64 {
        125.0
    }

    fn num_channels(&self) -> usize {
        self.levels.len()
    }

    fn channel_level(&self, channel: usize) -> f32 {
        self.levels.get(channel).copied().unwrap_or(0.0)
    }

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            title: format!("scripted {} bytes", self.last_load_len),
            num_orders: 4,
            num_patterns: 8,
            num_channels: self.levels.len() as i32,
            duration_seconds: self.length.map_or(0.0, |f| f as f64 / 48000.0),
            initial_bpm: 125.0,
        }
    }
}
