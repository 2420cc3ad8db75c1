use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use super::backend::{AlBackend, ContextHandle, DeviceHandle, ALC_INVALID_CONTEXT};
use super::buffer::BufferPool;
use super::source::Source;
use crate::error::AudioError;

/// State shared between a context and the sources created from it
pub(crate) struct ContextShared {
    pub(crate) backend: Arc<dyn AlBackend>,
    handle: Mutex<Option<ContextHandle>>,
    pool: Arc<Mutex<BufferPool>>,
}

impl ContextShared {
    fn handle(&self, operation: &'static str) -> Result<ContextHandle, AudioError> {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or(AudioError::InvalidResource {
                resource: "context",
                operation,
            })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Make this context current on the calling thread if it is not already
    pub(crate) fn make_current(&self) -> Result<(), AudioError> {
        let handle = self.handle("make_current")?;
        if self.backend.current_context() == Some(handle) {
            return Ok(());
        }
        if !self.backend.make_context_current(Some(handle)) {
            return Err(AudioError::Backend {
                code: ALC_INVALID_CONTEXT,
                description: "Invalid Context".to_string(),
                message: "Failed to make context current.".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn lock_pool(&self) -> MutexGuard<'_, BufferPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A native context and its buffer pool
pub struct Context {
    shared: Arc<ContextShared>,
}

impl Context {
    pub(crate) fn create(backend: Arc<dyn AlBackend>, device: DeviceHandle) -> Result<Self, AudioError> {
        let handle = backend
            .create_context(device)
            .ok_or_else(|| AudioError::InitializationFailed("Failed to create context".to_string()))?;
        let pool = Arc::new(Mutex::new(BufferPool::new(Arc::clone(&backend))));
        let context = Self {
            shared: Arc::new(ContextShared {
                backend,
                handle: Mutex::new(Some(handle)),
                pool,
            }),
        };
        context.make_current()?;
        debug!("Created context {:?}", handle);
        Ok(context)
    }

    pub fn make_current(&self) -> Result<(), AudioError> {
        self.shared.make_current()
    }

    /// Whether this context is current on the calling thread
    pub fn is_current(&self) -> bool {
        match self.shared.handle("is_current") {
            Ok(handle) => self.shared.backend.current_context() == Some(handle),
            Err(_) => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.shared.is_alive()
    }

    pub fn create_source(&self) -> Result<Source, AudioError> {
        Source::create(Arc::clone(&self.shared))
    }

    pub fn buffer_pool(&self) -> Arc<Mutex<BufferPool>> {
        Arc::clone(&self.shared.pool)
    }

    /// Clear the pool and destroy the native context. Safe to call more than once.
    pub fn delete(&mut self) -> Result<(), AudioError> {
        if !self.shared.is_alive() {
            return Ok(());
        }
        self.shared.lock_pool().clear();

        let handle = self
            .shared
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let backend = &self.shared.backend;
            if backend.current_context() == Some(handle) {
                backend.make_context_current(None);
            }
            backend.destroy_context(handle);
            debug!("Destroyed context {:?}", handle);
        }
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            warn!("Failed to delete context: {}", e);
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handle = *self.shared.handle.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Context").field("handle", &handle).finish()
    }
}
