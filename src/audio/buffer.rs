use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use log::{trace, warn};
use serde::{Deserialize, Serialize};

use super::backend::{check_error, format_for, AlBackend};
use crate::error::AudioError;
use crate::models::{AudioData, AudioFormat};

/// One native buffer object
///
/// Validity is asked from the backend every time, since some drivers delete
/// buffers behind our back (for example together with the source they were
/// queued on).
pub struct Buffer {
    backend: Arc<dyn AlBackend>,
    name: Option<u32>,
    size: usize,
}

impl Buffer {
    /// Create a new native buffer
    pub fn create(backend: Arc<dyn AlBackend>) -> Result<Self, AudioError> {
        let name = backend.gen_buffer();
        check_error(backend.as_ref(), "Failed to create buffer.")?;
        Ok(Self {
            backend,
            name: Some(name),
            size: 0,
        })
    }

    /// Native name, `None` once deleted
    pub fn name(&self) -> Option<u32> {
        self.name
    }

    /// Bytes uploaded by the last call to [`Buffer::data`]
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_valid(&self) -> bool {
        match self.name {
            Some(name) => self.backend.is_buffer(name),
            None => false,
        }
    }

    /// Upload PCM data
    pub fn data(&mut self, audio_data: &AudioData, format: &AudioFormat) -> Result<(), AudioError> {
        let name = self.name.ok_or(AudioError::InvalidResource {
            resource: "buffer",
            operation: "data",
        })?;
        let al_format = format_for(format)?;
        self.backend
            .buffer_data(name, al_format, &audio_data.data, format.sample_rate as i32);
        check_error(self.backend.as_ref(), "Failed to add data to buffer.")?;
        self.size = audio_data.len();
        Ok(())
    }

    /// Release the native buffer. Safe to call more than once.
    pub fn delete(&mut self) -> Result<(), AudioError> {
        let Some(name) = self.name.take() else {
            return Ok(());
        };
        if self.backend.is_buffer(name) {
            self.backend.delete_buffer(name);
            check_error(self.backend.as_ref(), "Error deleting buffer.")?;
        }
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            warn!("Failed to release buffer: {}", e);
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

/// Order in which freed buffers are handed out again
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReuseOrder {
    /// Most recently freed first
    #[default]
    Lifo,
    /// Least recently freed first
    Fifo,
}

/// Recycling store for native buffers
///
/// Holds only buffers that were valid when they were returned, and checks
/// them again before handing them out.
pub struct BufferPool {
    backend: Arc<dyn AlBackend>,
    buffers: VecDeque<Buffer>,
    reuse_order: ReuseOrder,
}

impl BufferPool {
    pub fn new(backend: Arc<dyn AlBackend>) -> Self {
        Self {
            backend,
            buffers: VecDeque::new(),
            reuse_order: ReuseOrder::default(),
        }
    }

    pub fn with_reuse_order(mut self, reuse_order: ReuseOrder) -> Self {
        self.reuse_order = reuse_order;
        self
    }

    pub fn set_reuse_order(&mut self, reuse_order: ReuseOrder) {
        self.reuse_order = reuse_order;
    }

    pub fn reuse_order(&self) -> ReuseOrder {
        self.reuse_order
    }

    /// Number of free buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    fn take_free(&mut self) -> Option<Buffer> {
        match self.reuse_order {
            ReuseOrder::Lifo => self.buffers.pop_back(),
            ReuseOrder::Fifo => self.buffers.pop_front(),
        }
    }

    /// Get a valid buffer, reusing a free one when possible
    pub fn get_buffer(&mut self) -> Result<Buffer, AudioError> {
        while let Some(buffer) = self.take_free() {
            if buffer.is_valid() {
                return Ok(buffer);
            }
            trace!("Discarding invalidated buffer {:?}", buffer.name());
        }

        let buffer = Buffer::create(Arc::clone(&self.backend))?;
        if !buffer.is_valid() {
            return Err(AudioError::InvalidResource {
                resource: "buffer",
                operation: "create",
            });
        }
        Ok(buffer)
    }

    /// Get `count` valid buffers
    pub fn get_buffers(&mut self, count: usize) -> Result<Vec<Buffer>, AudioError> {
        (0..count).map(|_| self.get_buffer()).collect()
    }

    /// Take back a buffer the source has finished with
    pub fn unqueue_buffer(&mut self, buffer: Buffer) {
        if buffer.is_valid() {
            self.buffers.push_back(buffer);
        } else {
            trace!("Dropping returned buffer {:?}, no longer valid", buffer.name());
        }
    }

    /// Delete every free buffer
    pub fn clear(&mut self) {
        for mut buffer in self.buffers.drain(..) {
            if let Err(e) = buffer.delete() {
                warn!("Failed to delete pooled buffer: {}", e);
            }
        }
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffers", &self.buffers)
            .field("reuse_order", &self.reuse_order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::software::SoftwareBackend;
    use std::time::Duration;

    fn setup() -> (Arc<SoftwareBackend>, BufferPool) {
        let backend = Arc::new(SoftwareBackend::new());
        let pool = BufferPool::new(backend.clone());
        (backend, pool)
    }

    #[test]
    fn test_get_unqueue_get_reuses_same_buffer() {
        let (_backend, mut pool) = setup();
        assert_eq!(pool.len(), 0);

        let buffer = pool.get_buffer().unwrap();
        let name = buffer.name();
        assert!(buffer.is_valid());
        assert_eq!(pool.len(), 0);

        pool.unqueue_buffer(buffer);
        assert_eq!(pool.len(), 1);

        let again = pool.get_buffer().unwrap();
        assert_eq!(again.name(), name);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_get_buffers_returns_distinct_valid_buffers() {
        let (_backend, mut pool) = setup();

        let buffers = pool.get_buffers(3).unwrap();
        assert_eq!(buffers.len(), 3);
        assert_eq!(pool.len(), 0);
        assert!(buffers.iter().all(Buffer::is_valid));

        let mut names: Vec<_> = buffers.iter().map(|b| b.name()).collect();
        names.dedup();
        assert_eq!(names.len(), 3);

        for buffer in buffers {
            pool.unqueue_buffer(buffer);
        }
        assert_eq!(pool.len(), 3);

        let _buffer = pool.get_buffer().unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_invalid_buffer_is_not_stored() {
        let (backend, mut pool) = setup();
        let buffer = pool.get_buffer().unwrap();
        backend.delete_buffer(buffer.name().unwrap());
        assert!(!buffer.is_valid());

        pool.unqueue_buffer(buffer);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_invalidated_pooled_buffer_is_replaced() {
        let (backend, mut pool) = setup();
        let buffer = pool.get_buffer().unwrap();
        let stale = buffer.name();
        pool.unqueue_buffer(buffer);

        // Freed out-of-band while sitting in the pool
        backend.delete_buffer(stale.unwrap());

        let fresh = pool.get_buffer().unwrap();
        assert!(fresh.is_valid());
        assert_ne!(fresh.name(), stale);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_pool_never_hands_out_invalid_buffers() {
        let (backend, mut pool) = setup();
        let mut held: Vec<Buffer> = Vec::new();

        for step in 0..60 {
            match step % 4 {
                0 | 1 => {
                    let buffer = pool.get_buffer().unwrap();
                    assert!(buffer.is_valid());
                    held.push(buffer);
                }
                2 => {
                    if let Some(buffer) = held.pop() {
                        pool.unqueue_buffer(buffer);
                    }
                }
                _ => {
                    // Invalidate one held buffer and one pooled buffer
                    if let Some(buffer) = held.first() {
                        backend.delete_buffer(buffer.name().unwrap());
                    }
                    if let Some(buffer) = pool.buffers.front() {
                        backend.delete_buffer(buffer.name().unwrap());
                    }
                    if let Some(buffer) = held.pop() {
                        pool.unqueue_buffer(buffer);
                    }
                }
            }
        }
    }

    #[test]
    fn test_fifo_reuse_order() {
        let (_backend, mut pool) = setup();
        pool.set_reuse_order(ReuseOrder::Fifo);

        let buffers = pool.get_buffers(2).unwrap();
        let first = buffers[0].name();
        for buffer in buffers {
            pool.unqueue_buffer(buffer);
        }

        assert_eq!(pool.get_buffer().unwrap().name(), first);
    }

    #[test]
    fn test_lifo_reuse_order() {
        let (_backend, mut pool) = setup();

        let buffers = pool.get_buffers(2).unwrap();
        let last = buffers[1].name();
        for buffer in buffers {
            pool.unqueue_buffer(buffer);
        }

        assert_eq!(pool.get_buffer().unwrap().name(), last);
    }

    #[test]
    fn test_clear_deletes_native_buffers() {
        let (backend, mut pool) = setup();
        for buffer in pool.get_buffers(4).unwrap() {
            pool.unqueue_buffer(buffer);
        }
        assert_eq!(backend.buffer_count(), 4);

        pool.clear();
        assert_eq!(pool.len(), 0);
        assert_eq!(backend.buffer_count(), 0);

        pool.clear();
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_buffer_data_and_delete() {
        let (backend, mut pool) = setup();
        let mut buffer = pool.get_buffer().unwrap();
        let format = AudioFormat::new(1, 16, 8000);
        let data = AudioData::new(vec![0; 1600], Duration::ZERO, Duration::from_millis(100));

        buffer.data(&data, &format).unwrap();
        assert_eq!(buffer.len(), 1600);

        buffer.delete().unwrap();
        buffer.delete().unwrap();
        assert!(!buffer.is_valid());
        assert_eq!(backend.buffer_count(), 0);

        match buffer.data(&data, &format) {
            Err(AudioError::InvalidResource { resource, .. }) => assert_eq!(resource, "buffer"),
            other => panic!("Expected InvalidResource, got {:?}", other),
        }
    }

    #[test]
    fn test_buffer_data_rejects_unsupported_format() {
        let (_backend, mut pool) = setup();
        let mut buffer = pool.get_buffer().unwrap();
        let data = AudioData::new(vec![0; 64], Duration::ZERO, Duration::ZERO);

        let result = buffer.data(&data, &AudioFormat::new(6, 16, 48000));
        assert!(matches!(result, Err(AudioError::UnsupportedFormat { .. })));
    }
}
