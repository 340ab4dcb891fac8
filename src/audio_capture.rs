//! Microphone capture and loudness measurement.
//!
//! Owns the cpal input stream and publishes one normalized RMS reading per
//! delivered buffer into a shared atomic slot. The capture callback is the
//! only writer; the scoring tick is the only reader. No history is kept.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use log::{debug, error, warn};
use thiserror::Error;

use crate::config::InputConfig;

/// Errors surfaced when microphone capture cannot start.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No usable audio input device, the device is claimed elsewhere, or the
    /// device rejected the requested stream.
    #[error("audio input unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Shared "most recent loudness" slot.
///
/// A single f32 stored as its bit pattern in an `AtomicU32`, so the reader
/// always observes a fully written value. Last write wins.
#[derive(Debug, Default)]
pub struct LoudnessLevel(AtomicU32);

impl LoudnessLevel {
    pub fn new() -> Self {
        Self(AtomicU32::new(0.0f32.to_bits()))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// RMS of one buffer of signed 16-bit samples, normalized against full
/// scale. Returns `None` for an empty buffer so the published reading is
/// left unchanged.
pub fn rms_level_i16(samples: &[i16]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }
    let mut sum = 0.0f64;
    for &sample in samples {
        let value = f64::from(sample) / 32768.0;
        sum += value * value;
    }
    Some((sum / samples.len() as f64).sqrt() as f32)
}

/// RMS of one buffer of float samples already normalized to [-1.0, 1.0].
pub fn rms_level_f32(samples: &[f32]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }
    let mut sum = 0.0f64;
    for &sample in samples {
        let value = f64::from(sample);
        sum += value * value;
    }
    Some((sum / samples.len() as f64).sqrt() as f32)
}

/// RMS of one buffer of offset-binary unsigned 16-bit samples.
pub fn rms_level_u16(samples: &[u16]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }
    let mut sum = 0.0f64;
    for &sample in samples {
        let value = (f64::from(sample) - 32768.0) / 32768.0;
        sum += value * value;
    }
    Some((sum / samples.len() as f64).sqrt() as f32)
}

/// Capture backend seam used by the scoring manager. The production
/// implementation drives a cpal input stream; tests substitute a fake.
pub trait LevelCapture {
    fn start(&mut self) -> Result<(), CaptureError>;
    fn stop(&mut self);
    /// Snapshot of the most recent loudness reading.
    fn level(&self) -> f32;
}

/// Microphone level sampler over the default (or configured) input device.
///
/// Holds the live `cpal::Stream`, so it must stay on the thread that
/// started it; the scoring manager constructs it inside its own thread.
pub struct AudioLevelSampler {
    level: Arc<LoudnessLevel>,
    device_name: String,
    device_auto: bool,
    sample_rate: u32,
    channels: u16,
    stream: Option<cpal::Stream>,
}

fn log_stream_error(err: cpal::StreamError) {
    error!("Capture stream error: {}", err);
}

fn format_preference(format: SampleFormat) -> u8 {
    match format {
        // Prefer native i16, the format the loudness scale is defined
        // against.
        SampleFormat::I16 => 0,
        SampleFormat::F32 => 1,
        SampleFormat::U16 => 2,
        _ => 3,
    }
}

impl AudioLevelSampler {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            level: Arc::new(LoudnessLevel::new()),
            device_name: config.device_name.clone(),
            device_auto: config.device_auto,
            sample_rate: config.sample_rate,
            channels: config.channels,
            stream: None,
        }
    }

    fn select_device(&self, host: &cpal::Host) -> Result<cpal::Device, CaptureError> {
        if !self.device_auto && !self.device_name.is_empty() {
            match host.input_devices() {
                Ok(mut devices) => {
                    if let Some(device) = devices.find(|device| {
                        device
                            .name()
                            .map(|name| name == self.device_name)
                            .unwrap_or(false)
                    }) {
                        return Ok(device);
                    }
                    warn!(
                        "Capture: input device '{}' not found, falling back to default",
                        self.device_name
                    );
                }
                Err(err) => warn!("Capture: failed to enumerate input devices: {}", err),
            }
        }
        host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable("no input device available".to_string())
        })
    }

    fn select_stream_config(
        &self,
        device: &cpal::Device,
    ) -> Result<(cpal::StreamConfig, SampleFormat), CaptureError> {
        let requested_rate = cpal::SampleRate(self.sample_rate);
        if let Ok(ranges) = device.supported_input_configs() {
            let mut candidates: Vec<_> = ranges
                .filter(|range| {
                    range.channels() == self.channels
                        && range.min_sample_rate() <= requested_rate
                        && range.max_sample_rate() >= requested_rate
                })
                .collect();
            candidates.sort_by_key(|range| format_preference(range.sample_format()));
            if let Some(range) = candidates.into_iter().next() {
                let supported = range.with_sample_rate(requested_rate);
                let sample_format = supported.sample_format();
                return Ok((supported.config(), sample_format));
            }
        }

        // The requested shape is not offered; capture whatever the device
        // does by default. Loudness stays normalized per sample format, so
        // the reading is comparable either way.
        let supported = device
            .default_input_config()
            .map_err(|err| CaptureError::DeviceUnavailable(err.to_string()))?;
        warn!(
            "Capture: {} Hz / {} channel(s) unsupported, using device default {} Hz / {} channel(s)",
            self.sample_rate,
            self.channels,
            supported.sample_rate().0,
            supported.channels()
        );
        let sample_format = supported.sample_format();
        Ok((supported.config(), sample_format))
    }
}

impl LevelCapture for AudioLevelSampler {
    /// Acquires the input device and starts publishing loudness readings.
    /// Idempotent: an already running capture is torn down first.
    fn start(&mut self) -> Result<(), CaptureError> {
        self.stop();

        let host = cpal::default_host();
        let device = self.select_device(&host)?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let (stream_config, sample_format) = self.select_stream_config(&device)?;
        debug!(
            "Capture: opening '{}' at {} Hz, {} channel(s), {:?}",
            device_name, stream_config.sample_rate.0, stream_config.channels, sample_format
        );

        let stream = match sample_format {
            SampleFormat::I16 => {
                let level = self.level.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if let Some(rms) = rms_level_i16(data) {
                            level.store(rms);
                        }
                    },
                    log_stream_error,
                    None,
                )
            }
            SampleFormat::F32 => {
                let level = self.level.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if let Some(rms) = rms_level_f32(data) {
                            level.store(rms);
                        }
                    },
                    log_stream_error,
                    None,
                )
            }
            SampleFormat::U16 => {
                let level = self.level.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        if let Some(rms) = rms_level_u16(data) {
                            level.store(rms);
                        }
                    },
                    log_stream_error,
                    None,
                )
            }
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|err| CaptureError::DeviceUnavailable(err.to_string()))?;

        stream
            .play()
            .map_err(|err| CaptureError::DeviceUnavailable(err.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Releases the input device. Safe to call when not started; never
    /// fails, even on device errors.
    fn stop(&mut self) {
        if self.stream.take().is_some() {
            debug!("Capture: input stream released");
        }
        self.level.store(0.0);
    }

    fn level(&self) -> f32 {
        self.level.load()
    }
}

#[cfg(test)]
mod tests {
    use super::{rms_level_f32, rms_level_i16, rms_level_u16, LoudnessLevel};

    #[test]
    fn test_full_scale_square_wave_normalizes_to_one() {
        let buffer: Vec<i16> = (0..1024)
            .map(|i| if i % 2 == 0 { 32767 } else { -32768 })
            .collect();
        let rms = rms_level_i16(&buffer).expect("non-empty buffer");

        assert!((rms - 1.0).abs() < 1e-4, "rms was {}", rms);
    }

    #[test]
    fn test_silent_buffer_normalizes_to_zero() {
        let buffer = vec![0i16; 512];
        assert_eq!(rms_level_i16(&buffer), Some(0.0));
    }

    #[test]
    fn test_empty_buffer_leaves_the_published_reading_unchanged() {
        assert_eq!(rms_level_i16(&[]), None);
        assert_eq!(rms_level_f32(&[]), None);
        assert_eq!(rms_level_u16(&[]), None);

        let level = LoudnessLevel::new();
        level.store(0.42);
        if let Some(rms) = rms_level_i16(&[]) {
            level.store(rms);
        }
        assert_eq!(level.load(), 0.42);
    }

    #[test]
    fn test_half_scale_sine_like_constant_buffer_rms() {
        // A constant half-scale buffer has an RMS of exactly 0.5.
        let buffer = vec![16384i16; 256];
        let rms = rms_level_i16(&buffer).expect("non-empty buffer");
        assert!((rms - 0.5).abs() < 1e-4, "rms was {}", rms);
    }

    #[test]
    fn test_float_and_offset_binary_buffers_match_the_i16_scale() {
        let float_buffer = vec![0.5f32; 128];
        let rms = rms_level_f32(&float_buffer).expect("non-empty buffer");
        assert!((rms - 0.5).abs() < 1e-6);

        // Offset-binary midpoint is silence.
        let u16_silence = vec![32768u16; 128];
        let rms = rms_level_u16(&u16_silence).expect("non-empty buffer");
        assert_eq!(rms, 0.0);

        let u16_full = vec![0u16; 128];
        let rms = rms_level_u16(&u16_full).expect("non-empty buffer");
        assert!((rms - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_loudness_slot_is_last_write_wins() {
        let level = LoudnessLevel::new();
        assert_eq!(level.load(), 0.0);
        level.store(0.25);
        level.store(0.75);
        assert_eq!(level.load(), 0.75);
    }
}
