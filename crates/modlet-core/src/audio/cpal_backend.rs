//! CPAL output backend
//!
//! Opens one output stream and moves the session's [`Renderer`] into its
//! callback, wrapped in a [`QuantumAdapter`].
//!
//! ```text
//! ┌──────────────────┐   mailboxes    ┌─────────────────────┐
//! │ Control thread   │───────────────►│  CPAL audio thread  │
//! │ (Controller)     │                │  (owns Renderer)    │
//! └──────────────────┘                └──────────┬──────────┘
//!         ▲                                      │
//!         │ poll() snapshot / events             │
//!         └──────────────────────────────────────┘
//! ```
//!
//! The callback owns the adapter outright, so there is no lock between the
//! device thread and anything else.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::adapter::QuantumAdapter;
use super::config::{AudioConfig, DeviceId};
use super::error::{AudioError, AudioResult};
use crate::engine::{ModuleSynth, Renderer};
use crate::types::DEFAULT_SAMPLE_RATE;

/// Running output stream
///
/// Keeps the stream alive. Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
    channels: u16,
}

impl AudioHandle {
    /// Sample rate negotiated with the device
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer size in frames requested from the device (an estimate when
    /// the backend picked its default)
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Device channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Output latency in milliseconds (one buffer)
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the configured device and start rendering into it
pub fn start_audio_system<S>(config: &AudioConfig, renderer: Renderer<S>) -> AudioResult<AudioHandle>
where
    S: ModuleSynth + 'static,
{
    let device = match &config.device {
        Some(id) => find_device(id)?,
        None => default_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = output_config(&device, config)?;
    let sample_rate = supported.sample_rate().0;
    // Nominal size for reporting; `Default` leaves the real size to the backend
    let buffer_size = config.buffer_size.as_frames();

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: match config.buffer_size.requested_frames() {
            Some(frames) => CpalBufferSize::Fixed(frames),
            None => CpalBufferSize::Default,
        },
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        config.buffer_size.latency_ms(sample_rate)
    );

    let channels = stream_config.channels as usize;
    let mut adapter = QuantumAdapter::new(renderer, sample_rate);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                adapter.fill(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioHandle {
        _stream: stream,
        sample_rate,
        buffer_size,
        channels: stream_config.channels,
    })
}

/// Names of every output device on every available host
pub fn output_devices() -> Vec<DeviceId> {
    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_label = host_name(host_id);
        let iter = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
                continue;
            }
        };
        for device in iter {
            if let Ok(name) = device.name() {
                devices.push(DeviceId::with_host(&name, &host_label));
            }
        }
    }
    devices
}

fn host_name(host_id: cpal::HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

fn default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("no default output device".to_string()))
}

fn find_device(id: &DeviceId) -> AudioResult<cpal::Device> {
    let host = match &id.host {
        Some(wanted) => cpal::available_hosts()
            .into_iter()
            .find(|h| &host_name(*h) == wanted)
            .and_then(|h| cpal::host_from_id(h).ok())
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()))?,
        None => cpal::default_host(),
    };

    let mut devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceNotFound(format!("{}: {}", id.display_label(), e)))?
        .peekable();
    if devices.peek().is_none() {
        return Err(AudioError::NoDevices);
    }

    devices
        .find(|d| d.name().map(|n| n == id.name).unwrap_or(false))
        .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()))
}

/// Pick an f32 output configuration, preferring stereo at the requested rate
fn output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    if supported.is_empty() {
        return Err(AudioError::UnsupportedFormat(
            "device has no f32 output configuration".to_string(),
        ));
    }

    let target = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        target >= c.min_sample_rate().0 && target <= c.max_sample_rate().0
    };

    let best = supported
        .iter()
        .filter(|c| c.channels() >= 2)
        .find(in_range)
        .or_else(|| supported.iter().find(in_range))
        .or_else(|| supported.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported.first())
        .ok_or_else(|| AudioError::ConfigError("No suitable output configuration".to_string()))?;

    let rate = if in_range(&best) {
        cpal::SampleRate(target)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(rate))
}
