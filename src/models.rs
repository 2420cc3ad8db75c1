use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PCM layout of the data a source produces and a buffer holds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_size: u16,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub fn new(channels: u16, sample_size: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_size,
            sample_rate,
        }
    }

    /// Bytes in a single sample of one channel
    pub fn bytes_per_sample(&self) -> usize {
        (self.sample_size as usize) >> 3
    }

    /// Bytes in one frame (one sample for every channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }

    /// Round a byte count down to a whole number of frames
    pub fn align(&self, num_bytes: usize) -> usize {
        let frame = self.bytes_per_frame();
        if frame == 0 {
            return 0;
        }
        num_bytes - num_bytes % frame
    }

    /// Playback time represented by `num_bytes` of data in this format
    pub fn duration_of(&self, num_bytes: usize) -> Duration {
        let bps = self.bytes_per_second();
        if bps == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(num_bytes as f64 / bps as f64)
    }

    /// e.g. "16-bit/44100 Hz - 2 channels"
    pub fn format_description(&self) -> String {
        format!(
            "{}-bit/{} Hz - {} channel{}",
            self.sample_size,
            self.sample_rate,
            self.channels,
            if self.channels == 1 { "" } else { "s" }
        )
    }
}

/// A chunk of PCM produced by an audio source
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub data: Vec<u8>,
    pub timestamp: Duration,
    pub duration: Duration,
}

impl AudioData {
    pub fn new(data: Vec<u8>, timestamp: Duration, duration: Duration) -> Self {
        Self {
            data,
            timestamp,
            duration,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Observable playback state of a native source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

impl SourceState {
        pub fn as_str(&self) -> &'static str {
        match self {
            SourceState::Initial => "Initial",
            SourceState::Playing => "Playing",
            SourceState::Paused => "Paused",
            SourceState::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for SourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
