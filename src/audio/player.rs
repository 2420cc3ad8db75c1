use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use super::backend::format_for;
use super::buffer::BufferPool;
use super::context::Context;
use super::procedural::AudioSource;
use super::source::Source;
use crate::config::PlayerConfig;
use crate::error::AudioError;
use crate::models::{AudioFormat, SourceState};

/// Something the [`Worker`](super::worker::Worker) keeps fed
pub trait Player: Send + Sync {
    /// Bytes the player can take right now
    fn get_write_size(&self) -> Result<usize, AudioError>;

    /// Push `num_bytes` of new audio into the playback pipeline
    fn refill(&self, num_bytes: usize) -> Result<(), AudioError>;
}

struct PlayerState {
    source: Source,
    audio_source: Box<dyn AudioSource>,
    format: AudioFormat,
    pool: Arc<Mutex<BufferPool>>,
    buffer_size: usize,
    capacity: usize,
    playing: bool,
    end_of_stream: bool,
}

impl PlayerState {
    /// Bytes queued but not yet played
    fn buffered(&mut self) -> Result<usize, AudioError> {
        self.source.unqueue_buffers()?;
        let offset = self.source.byte_offset()?;
        Ok(self.source.queued_bytes().saturating_sub(offset))
    }
}

/// Streams one [`AudioSource`] through one native source
pub struct StreamingPlayer {
    state: Mutex<PlayerState>,
}

impl StreamingPlayer {
    pub fn new(
        context: &Context,
        audio_source: Box<dyn AudioSource>,
        config: &PlayerConfig,
    ) -> Result<Self, AudioError> {
        let format = audio_source.audio_format();
        format_for(&format)?;

        let frame = format.bytes_per_frame();
        let buffer_size = format.align(config.buffer_size).max(frame);
        let capacity = format
            .align((format.bytes_per_second() as f64 * config.buffered_seconds) as usize)
            .max(buffer_size);
        let source = context.create_source()?;

        debug!(
            "New player: {}, {} byte buffers, {} bytes ahead",
            format.format_description(),
            buffer_size,
            capacity
        );

        Ok(Self {
            state: Mutex::new(PlayerState {
                source,
                audio_source,
                format,
                pool: context.buffer_pool(),
                buffer_size,
                capacity,
                playing: false,
                end_of_stream: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn audio_format(&self) -> AudioFormat {
        self.lock().format
    }

    /// Start playback, or resume after a pause
    pub fn play(&self) -> Result<(), AudioError> {
        let mut state = self.lock();
        state.playing = true;
        if state.buffered()? > 0 {
            state.source.play()?;
        }
        Ok(())
    }

    pub fn pause(&self) -> Result<(), AudioError> {
        let mut state = self.lock();
        state.playing = false;
        state.source.pause()
    }

    /// Halt playback and drop whatever is still queued
    pub fn stop(&self) -> Result<(), AudioError> {
        let mut state = self.lock();
        state.playing = false;
        state.source.stop()?;
        state.source.unqueue_buffers()?;
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// End of stream reached and everything queued has been played
    pub fn is_finished(&self) -> Result<bool, AudioError> {
        let mut state = self.lock();
        if !state.end_of_stream {
            return Ok(false);
        }
        state.source.unqueue_buffers()?;
        Ok(state.source.queued_bytes() == 0)
    }

    pub fn source_state(&self) -> Result<SourceState, AudioError> {
        self.lock().source.state()
    }

    pub fn delete(&self) -> Result<(), AudioError> {
        let mut state = self.lock();
        state.playing = false;
        state.source.delete()
    }
}

impl Player for StreamingPlayer {
    fn get_write_size(&self) -> Result<usize, AudioError> {
        let mut state = self.lock();
        if state.end_of_stream {
            return Ok(0);
        }
        let buffered = state.buffered()?;
        Ok(state.format.align(state.capacity.saturating_sub(buffered)))
    }

    fn refill(&self, num_bytes: usize) -> Result<(), AudioError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.source.unqueue_buffers()?;

        // A trailing partial frame cannot be sourced and is left for the next refill
        let mut remaining = state.format.align(num_bytes);
        while remaining > 0 && !state.end_of_stream {
            let chunk = remaining.min(state.buffer_size);
            let audio_data = match state.audio_source.get_audio_data(chunk) {
                Some(audio_data) if !audio_data.is_empty() => audio_data,
                _ => {
                    debug!("Player reached end of stream");
                    state.end_of_stream = true;
                    break;
                }
            };
            remaining = remaining.saturating_sub(audio_data.len());

            let mut buffer = state
                .pool
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_buffer()?;
            if let Err(e) = buffer.data(&audio_data, &state.format) {
                state
                    .pool
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .unqueue_buffer(buffer);
                return Err(e);
            }
            state.source.queue_buffer(buffer)?;
        }

        if state.playing && state.source.queued_bytes() > 0 && !state.source.is_playing()? {
            if state.source.cached_state() == SourceState::Stopped {
                info!("Player underrun, restarting source");
            }
            state.source.play()?;
        }
        Ok(())
    }
}

impl fmt::Debug for StreamingPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("StreamingPlayer")
            .field("source", &state.source)
            .field("format", &state.format)
            .field("playing", &state.playing)
            .field("end_of_stream", &state.end_of_stream)
            .finish()
    }
}
