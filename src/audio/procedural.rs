use std::f64::consts::PI;
use std::time::Duration;

use crate::error::AudioError;
use crate::models::{AudioData, AudioFormat};

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_SAMPLE_SIZE: u16 = 16;

/// Producer of PCM data pulled by a player
pub trait AudioSource: Send {
    fn audio_format(&self) -> AudioFormat;

    /// Next chunk of at most `num_bytes`, or `None` at end of stream
    fn get_audio_data(&mut self, num_bytes: usize) -> Option<AudioData>;

    /// Total length, if known
    fn duration(&self) -> Option<Duration> {
        None
    }
}

/// Signal produced by a [`ProceduralSource`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Silence,
    Sine { frequency: f64 },
}

/// Mono generator with a fixed duration
#[derive(Debug, Clone)]
pub struct ProceduralSource {
    waveform: Waveform,
    format: AudioFormat,
    duration: Duration,
    offset: usize,
    max_offset: usize,
}

impl ProceduralSource {
    pub fn new(
        waveform: Waveform,
        duration: Duration,
        sample_rate: u32,
        sample_size: u16,
    ) -> Result<Self, AudioError> {
        if sample_size != 8 && sample_size != 16 {
            return Err(AudioError::UnsupportedFormat {
                channels: 1,
                sample_size,
            });
        }
        Ok(Self::build(waveform, duration, AudioFormat::new(1, sample_size, sample_rate)))
    }

    pub fn silence(duration: Duration) -> Self {
        Self::with_defaults(Waveform::Silence, duration)
    }

    pub fn sine(duration: Duration, frequency: f64) -> Self {
        Self::with_defaults(Waveform::Sine { frequency }, duration)
    }

    fn with_defaults(waveform: Waveform, duration: Duration) -> Self {
        let format = AudioFormat::new(1, DEFAULT_SAMPLE_SIZE, DEFAULT_SAMPLE_RATE);
        Self::build(waveform, duration, format)
    }

    fn build(waveform: Waveform, duration: Duration, format: AudioFormat) -> Self {
        let max_offset =
            format.align((format.bytes_per_second() as f64 * duration.as_secs_f64()) as usize);
        Self {
            waveform,
            format,
            duration,
            offset: 0,
            max_offset,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Bytes left before end of stream
    pub fn remaining(&self) -> usize {
        self.max_offset - self.offset
    }

    /// Move the read position, clamped to the stream and aligned to a sample
    pub fn seek(&mut self, timestamp: Duration) {
        let offset = (timestamp.as_secs_f64() * self.format.bytes_per_second() as f64) as usize;
        self.offset = self.format.align(offset.min(self.max_offset));
    }

    fn generate(&self, num_bytes: usize, offset: usize) -> Vec<u8> {
        let bytes_per_sample = self.format.bytes_per_sample();
        match self.waveform {
            Waveform::Silence if bytes_per_sample == 1 => vec![0x80; num_bytes],
            Waveform::Silence => vec![0; num_bytes],
            Waveform::Sine { frequency } => {
                let step = frequency * 2.0 * PI / self.format.sample_rate as f64;
                let start = offset / bytes_per_sample;
                let samples = num_bytes / bytes_per_sample;
                let mut data = Vec::with_capacity(num_bytes);
                for i in 0..samples {
                    let value = (step * (start + i) as f64).sin();
                    if bytes_per_sample == 1 {
                        data.push((value * 127.0 + 128.0).round() as u8);
                    } else {
                        let sample = (value * 32767.0).round() as i16;
                        data.extend_from_slice(&sample.to_le_bytes());
                    }
                }
                data
            }
        }
    }
}

impl AudioSource for ProceduralSource {
    fn audio_format(&self) -> AudioFormat {
        self.format
    }

    fn get_audio_data(&mut self, num_bytes: usize) -> Option<AudioData> {
        let num_bytes = self.format.align(num_bytes.min(self.remaining()));
        if num_bytes == 0 {
            return None;
        }

        let timestamp = self.format.duration_of(self.offset);
        let duration = self.format.duration_of(num_bytes);
        let data = self.generate(num_bytes, self.offset);
        self.offset += num_bytes;

        Some(AudioData::new(data, timestamp, duration))
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.duration)
    }
}
