use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace, warn};

use super::backend::{
    check_error, source_state_from_raw, AlBackend, SourceParam, AL_INVALID_ENUM, AL_NO_ERROR,
};
use super::buffer::Buffer;
use super::context::ContextShared;
use crate::error::AudioError;
use crate::models::SourceState;

/// A native source created from a [`Context`](super::context::Context)
///
/// Buffers queued on the source are held here until the backend reports them
/// processed, then go back to the context's pool. Every call first makes the
/// owning context current on the calling thread.
pub struct Source {
    context: Arc<ContextShared>,
    name: Option<u32>,
    state: SourceState,
    queued: VecDeque<Buffer>,
}

impl Source {
    pub(crate) fn create(context: Arc<ContextShared>) -> Result<Self, AudioError> {
        context.make_current()?;
        let name = context.backend.gen_source();
        check_error(context.backend.as_ref(), "Failed to create source.")?;
        trace!("Created source {}", name);

        Ok(Self {
            context,
            name: Some(name),
            state: SourceState::Initial,
            queued: VecDeque::new(),
        })
    }

    fn backend(&self) -> &dyn AlBackend {
        self.context.backend.as_ref()
    }

    /// Native name of a live source, with its context made current
    fn prepare(&self, operation: &'static str) -> Result<u32, AudioError> {
        let name = self.name.ok_or(AudioError::InvalidResource {
            resource: "source",
            operation,
        })?;
        self.context.make_current()?;
        Ok(name)
    }

    fn get_int(&self, param: SourceParam, operation: &'static str) -> Result<i32, AudioError> {
        let name = self.prepare(operation)?;
        let value = self.backend().get_source_i(name, param);
        check_error(self.backend(), "Failed to get value")?;
        Ok(value)
    }

    pub fn is_valid(&self) -> bool {
        self.name.is_some()
    }

    pub fn play(&mut self) -> Result<(), AudioError> {
        let name = self.prepare("play")?;
        self.backend().source_play(name);
        check_error(self.backend(), "Failed to play source.")?;
        self.state()?;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), AudioError> {
        let name = self.prepare("pause")?;
        self.backend().source_pause(name);
        check_error(self.backend(), "Failed to pause source.")?;
        self.state()?;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), AudioError> {
        let name = self.prepare("stop")?;
        self.backend().source_stop(name);
        check_error(self.backend(), "Failed to stop source.")?;
        self.state()?;
        Ok(())
    }

    /// Read the current state from the backend
    pub fn state(&mut self) -> Result<SourceState, AudioError> {
        let raw = self.get_int(SourceParam::State, "state")?;
        let state = source_state_from_raw(raw).ok_or_else(|| AudioError::Backend {
            code: AL_INVALID_ENUM,
            description: self.backend().error_string(AL_INVALID_ENUM),
            message: format!("Unknown source state {:#x}.", raw),
        })?;
        self.state = state;
        Ok(state)
    }

    /// State seen by the last query, without asking the backend
    pub fn cached_state(&self) -> SourceState {
        self.state
    }

    pub fn is_initial(&mut self) -> Result<bool, AudioError> {
        Ok(self.state()? == SourceState::Initial)
    }

    pub fn is_playing(&mut self) -> Result<bool, AudioError> {
        Ok(self.state()? == SourceState::Playing)
    }

    pub fn is_paused(&mut self) -> Result<bool, AudioError> {
        Ok(self.state()? == SourceState::Paused)
    }

    pub fn is_stopped(&mut self) -> Result<bool, AudioError> {
        Ok(self.state()? == SourceState::Stopped)
    }

    pub fn buffers_processed(&self) -> Result<usize, AudioError> {
        Ok(self.get_int(SourceParam::BuffersProcessed, "buffers_processed")?.max(0) as usize)
    }

    pub fn buffers_queued(&self) -> Result<usize, AudioError> {
        Ok(self.get_int(SourceParam::BuffersQueued, "buffers_queued")?.max(0) as usize)
    }

    /// Play position in bytes, counted from the start of the first queued buffer
    pub fn byte_offset(&self) -> Result<usize, AudioError> {
        Ok(self.get_int(SourceParam::ByteOffset, "byte_offset")?.max(0) as usize)
    }

    /// Bytes held by buffers still queued on this source
    pub fn queued_bytes(&self) -> usize {
        self.queued.iter().map(Buffer::len).sum()
    }

    /// Append a filled buffer to the playback queue
    ///
    /// On failure the buffer goes back to the pool.
    pub fn queue_buffer(&mut self, buffer: Buffer) -> Result<(), AudioError> {
        let result = self.prepare("queue_buffer").and_then(|name| {
            let buffer_name = buffer.name().ok_or(AudioError::InvalidResource {
                resource: "buffer",
                operation: "queue_buffer",
            })?;
            self.backend().source_queue_buffers(name, &[buffer_name]);
            check_error(self.backend(), "Failed to queue buffer.")
        });

        match result {
            Ok(()) => {
                self.queued.push_back(buffer);
                Ok(())
            }
            Err(e) => {
                self.context.lock_pool().unqueue_buffer(buffer);
                Err(e)
            }
        }
    }

    /// Return every processed buffer to the pool
    pub fn unqueue_buffers(&mut self) -> Result<usize, AudioError> {
        let name = self.prepare("unqueue_buffers")?;
        let processed = self.buffers_processed()?;
        if processed == 0 {
            return Ok(0);
        }

        let names = self.backend().source_unqueue_buffers(name, processed);
        check_error(self.backend(), "Failed to unqueue buffers from source.")?;

        let mut pool = self.context.lock_pool();
        for buffer_name in &names {
            match self.queued.iter().position(|b| b.name() == Some(*buffer_name)) {
                Some(index) => {
                    if let Some(buffer) = self.queued.remove(index) {
                        pool.unqueue_buffer(buffer);
                    }
                }
                None => warn!("Backend unqueued unknown buffer {}", buffer_name),
            }
        }
        Ok(names.len())
    }

    /// Release the native source. Safe to call more than once.
    ///
    /// Buffers still queued are not returned to the pool; they are released
    /// here, and the pool's validity check covers drivers that already freed
    /// them along with the source.
    ///
    /// If the backend refuses, the source keeps its name and queued buffers
    /// so the call can be retried.
    pub fn delete(&mut self) -> Result<(), AudioError> {
        let Some(name) = self.name else {
            return Ok(());
        };
        // Sources die with their context
        if self.context.is_alive() {
            self.context.make_current()?;
            let unread = self.backend().get_error();
            if unread != AL_NO_ERROR {
                debug!("Discarding unread backend error {:#x} before deleting source", unread);
            }
            self.backend().delete_source(name);
            check_error(self.backend(), "Failed to delete source.")?;
        }
        self.name = None;
        self.queued.clear();
        trace!("Deleted source {}", name);
        Ok(())
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            warn!("Failed to delete source: {}", e);
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("queued", &self.queued.len())
            .finish()
    }
}
