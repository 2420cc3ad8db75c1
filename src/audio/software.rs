//! In-process implementation of the native backend
//!
//! `SoftwareBackend` keeps the same object model and error behaviour as an
//! AL driver: integer names, one current context per thread, an error code
//! that sticks until read, and sources that consume their buffer queue as
//! time advances. It does not mix or render audio; something has to call
//! [`SoftwareBackend::advance`] (see `audio::output`) to move playback on.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::{debug, trace};

use super::backend::*;
use crate::models::SourceState;

pub const DEFAULT_DEVICE_NAME: &str = "Software Renderer";

const NANOS_PER_SEC: u128 = 1_000_000_000;

const EXTENSIONS: &str = "ALC_ENUMERATE_ALL_EXT ALC_ENUMERATION_EXT ALC_EXT_CAPTURE";

#[derive(Debug)]
struct ContextEntry {
    device: DeviceHandle,
}

#[derive(Debug)]
struct SourceEntry {
    context: ContextHandle,
    state: SourceState,
    queue: VecDeque<u32>,
    processed: usize,
    /// Bytes consumed from `queue[processed]`
    offset: usize,
    /// Playback time short of one more byte, in byte-nanoseconds
    carry: u128,
}

#[derive(Debug, Default)]
struct BufferEntry {
    len: usize,
    bytes_per_second: usize,
}

#[derive(Debug)]
struct Inner {
    device_names: Vec<String>,
    devices: HashMap<u32, String>,
    contexts: HashMap<u32, ContextEntry>,
    current: HashMap<ThreadId, ContextHandle>,
    errors: HashMap<ThreadId, i32>,
    sources: HashMap<u32, SourceEntry>,
    buffers: HashMap<u32, BufferEntry>,
    next_name: u32,
    frees_buffers_on_source_delete: bool,
}

impl Inner {
    /// Names are never reused, so a stale handle can never alias a new object
    fn next_name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    /// Record an error for the calling thread unless one is already pending
    fn set_error(&mut self, code: i32) {
        let slot = self.errors.entry(thread::current().id()).or_insert(AL_NO_ERROR);
        if *slot == AL_NO_ERROR {
            *slot = code;
        }
    }

    fn current_context(&self) -> Option<ContextHandle> {
        self.current.get(&thread::current().id()).copied()
    }

    fn source_mut(&mut self, source: u32) -> Option<&mut SourceEntry> {
        if self.sources.contains_key(&source) {
            self.sources.get_mut(&source)
        } else {
            self.set_error(AL_INVALID_NAME);
            None
        }
    }

    fn queued_in_any_source(&self, buffer: u32) -> bool {
        self.sources.values().any(|s| s.queue.contains(&buffer))
    }
}

/// Software AL driver
#[derive(Debug)]
pub struct SoftwareBackend {
    inner: Mutex<Inner>,
}

impl SoftwareBackend {
    /// Backend with a single default device
    pub fn new() -> Self {
        Self::with_devices(vec![DEFAULT_DEVICE_NAME.to_string()])
    }

    /// Backend exposing the given device names; the first one is the default
    pub fn with_devices(device_names: Vec<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                device_names,
                devices: HashMap::new(),
                contexts: HashMap::new(),
                current: HashMap::new(),
                errors: HashMap::new(),
                sources: HashMap::new(),
                buffers: HashMap::new(),
                next_name: 0,
                frees_buffers_on_source_delete: false,
            }),
        }
    }

    /// Emulate drivers that delete queued buffers together with their source
    pub fn with_frees_buffers_on_source_delete(self, enabled: bool) -> Self {
        self.lock().frees_buffers_on_source_delete = enabled;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn device_names(&self) -> Vec<String> {
        self.lock().device_names.clone()
    }

    /// Number of live buffer objects, pooled or queued
    pub fn buffer_count(&self) -> usize {
        self.lock().buffers.len()
    }

    pub fn source_count(&self) -> usize {
        self.lock().sources.len()
    }

    /// Move every playing source forward by `elapsed` of playback time
    pub fn advance(&self, elapsed: Duration) {
        let mut inner = self.lock();
        let Inner { sources, buffers, .. } = &mut *inner;

        for (name, source) in sources.iter_mut() {
            if source.state != SourceState::Playing {
                continue;
            }

            let mut remaining = elapsed.as_nanos();
            while source.processed < source.queue.len() {
                let (len, bytes_per_second) = buffers
                    .get(&source.queue[source.processed])
                    .map(|b| (b.len, b.bytes_per_second as u128))
                    .unwrap_or((0, 0));
                let left_in_buffer = len.saturating_sub(source.offset) as u128;

                if bytes_per_second == 0 || left_in_buffer == 0 {
                    source.processed += 1;
                    source.offset = 0;
                    source.carry = 0;
                    continue;
                }

                // Byte-nanoseconds, so fractions of a byte survive between calls
                let available = remaining * bytes_per_second + source.carry;
                let needed = left_in_buffer * NANOS_PER_SEC;
                if available >= needed {
                    remaining = (available - needed) / bytes_per_second;
                    source.processed += 1;
                    source.offset = 0;
                    source.carry = 0;
                } else {
                    source.offset += (available / NANOS_PER_SEC) as usize;
                    source.carry = available % NANOS_PER_SEC;
                    break;
                }
            }

            if source.processed == source.queue.len() {
                trace!("Source {} ran out of queued audio", name);
                source.state = SourceState::Stopped;
                source.offset = 0;
                source.carry = 0;
            }
        }
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AlBackend for SoftwareBackend {
    fn open_device(&self, name: Option<&str>) -> Option<DeviceHandle> {
        let mut inner = self.lock();
        let device_name = match name {
            Some(name) => inner.device_names.iter().find(|n| n.as_str() == name).cloned()?,
            None => inner.device_names.first().cloned()?,
        };
        let handle = inner.next_name();
        debug!("Opened software device '{}' as {}", device_name, handle);
        inner.devices.insert(handle, device_name);
        Some(DeviceHandle(handle))
    }

    fn close_device(&self, device: DeviceHandle) -> bool {
        let mut inner = self.lock();
        if inner.contexts.values().any(|c| c.device == device) {
            return false;
        }
        inner.devices.remove(&device.0).is_some()
    }

    fn device_name(&self, device: DeviceHandle) -> Option<String> {
        self.lock().devices.get(&device.0).cloned()
    }

    fn device_version(&self, device: DeviceHandle) -> (i32, i32) {
        if self.lock().devices.contains_key(&device.0) {
            (1, 1)
        } else {
            (0, 0)
        }
    }

    fn device_extensions(&self, device: DeviceHandle) -> String {
        if self.lock().devices.contains_key(&device.0) {
            EXTENSIONS.to_string()
        } else {
            String::new()
        }
    }

    fn create_context(&self, device: DeviceHandle) -> Option<ContextHandle> {
        let mut inner = self.lock();
        if !inner.devices.contains_key(&device.0) {
            return None;
        }
        let handle = inner.next_name();
        inner.contexts.insert(handle, ContextEntry { device });
        Some(ContextHandle(handle))
    }

    fn destroy_context(&self, context: ContextHandle) {
        let mut inner = self.lock();
        if inner.contexts.remove(&context.0).is_none() {
            return;
        }
        inner.current.retain(|_, current| *current != context);
        inner.sources.retain(|_, source| source.context != context);
    }

    fn make_context_current(&self, context: Option<ContextHandle>) -> bool {
        let mut inner = self.lock();
        let thread_id = thread::current().id();
        match context {
            None => {
                inner.current.remove(&thread_id);
                true
            }
            Some(handle) if inner.contexts.contains_key(&handle.0) => {
                inner.current.insert(thread_id, handle);
                true
            }
            Some(_) => false,
        }
    }

    fn current_context(&self) -> Option<ContextHandle> {
        self.lock().current_context()
    }

    fn gen_source(&self) -> u32 {
        let mut inner = self.lock();
        let Some(context) = inner.current_context() else {
            inner.set_error(AL_INVALID_OPERATION);
            return 0;
        };
        let name = inner.next_name();
        inner.sources.insert(
            name,
            SourceEntry {
                context,
                state: SourceState::Initial,
                queue: VecDeque::new(),
                processed: 0,
                offset: 0,
                carry: 0,
            },
        );
        name
    }

    fn delete_source(&self, source: u32) {
        let mut inner = self.lock();
        let Some(entry) = inner.sources.remove(&source) else {
            inner.set_error(AL_INVALID_NAME);
            return;
        };
        if inner.frees_buffers_on_source_delete {
            for buffer in entry.queue {
                inner.buffers.remove(&buffer);
            }
        }
    }

    fn source_play(&self, source: u32) {
        let mut inner = self.lock();
        let Some(entry) = inner.source_mut(source) else {
            return;
        };
        match entry.state {
            SourceState::Playing => {}
            SourceState::Stopped => {
                entry.processed = 0;
                entry.offset = 0;
                entry.carry = 0;
                entry.state = SourceState::Playing;
            }
            SourceState::Initial | SourceState::Paused => entry.state = SourceState::Playing,
        }
        if entry.queue.is_empty() {
            entry.state = SourceState::Stopped;
        }
    }

    fn source_pause(&self, source: u32) {
        let mut inner = self.lock();
        if let Some(entry) = inner.source_mut(source) {
            if entry.state == SourceState::Playing {
                entry.state = SourceState::Paused;
            }
        }
    }

    fn source_stop(&self, source: u32) {
        let mut inner = self.lock();
        if let Some(entry) = inner.source_mut(source) {
            entry.state = SourceState::Stopped;
            entry.processed = entry.queue.len();
            entry.offset = 0;
            entry.carry = 0;
        }
    }

    fn get_source_i(&self, source: u32, param: SourceParam) -> i32 {
        let mut inner = self.lock();
        if !inner.sources.contains_key(&source) {
            inner.set_error(AL_INVALID_NAME);
            return 0;
        }
        let inner = &*inner;
        let entry = &inner.sources[&source];
        match param {
            SourceParam::State => source_state_to_raw(entry.state),
            SourceParam::BuffersQueued => entry.queue.len() as i32,
            SourceParam::BuffersProcessed => entry.processed as i32,
            SourceParam::ByteOffset => match entry.state {
                SourceState::Playing | SourceState::Paused => {
                    // Counted from the first buffer still in the queue
                    let consumed: usize = entry
                        .queue
                        .iter()
                        .take(entry.processed)
                        .map(|b| inner.buffers.get(b).map(|e| e.len).unwrap_or(0))
                        .sum();
                    (consumed + entry.offset) as i32
                }
                SourceState::Initial | SourceState::Stopped => 0,
            },
        }
    }

    fn source_queue_buffers(&self, source: u32, buffers: &[u32]) {
        let mut inner = self.lock();
        if buffers.iter().any(|b| !inner.buffers.contains_key(b)) {
            inner.set_error(AL_INVALID_NAME);
            return;
        }
        if buffers.iter().any(|b| inner.queued_in_any_source(*b)) {
            inner.set_error(AL_INVALID_OPERATION);
            return;
        }
        if let Some(entry) = inner.source_mut(source) {
            entry.queue.extend(buffers.iter().copied());
        }
    }

    fn source_unqueue_buffers(&self, source: u32, count: usize) -> Vec<u32> {
        let mut inner = self.lock();
        let Some(entry) = inner.source_mut(source) else {
            return Vec::new();
        };
        if count > entry.processed {
            inner.set_error(AL_INVALID_VALUE);
            return Vec::new();
        }
        entry.processed -= count;
        entry.queue.drain(..count).collect()
    }

    fn gen_buffer(&self) -> u32 {
        let mut inner = self.lock();
        let name = inner.next_name();
        inner.buffers.insert(name, BufferEntry::default());
        name
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut inner = self.lock();
        if !inner.buffers.contains_key(&buffer) {
            inner.set_error(AL_INVALID_NAME);
            return;
        }
        if inner.queued_in_any_source(buffer) {
            inner.set_error(AL_INVALID_OPERATION);
            return;
        }
        inner.buffers.remove(&buffer);
    }

    fn is_buffer(&self, buffer: u32) -> bool {
        self.lock().buffers.contains_key(&buffer)
    }

    fn buffer_data(&self, buffer: u32, format: i32, data: &[u8], frequency: i32) {
        let mut inner = self.lock();
        let Some((channels, sample_size)) = format_layout(format) else {
            inner.set_error(AL_INVALID_ENUM);
            return;
        };
        if frequency <= 0 {
            inner.set_error(AL_INVALID_VALUE);
            return;
        }
        if inner.queued_in_any_source(buffer) {
            inner.set_error(AL_INVALID_OPERATION);
            return;
        }
        let bytes_per_second =
            channels as usize * (sample_size as usize >> 3) * frequency as usize;
        match inner.buffers.get_mut(&buffer) {
            Some(entry) => {
                entry.len = data.len();
                entry.bytes_per_second = bytes_per_second;
            }
            None => inner.set_error(AL_INVALID_NAME),
        }
    }

    fn get_error(&self) -> i32 {
        self.lock()
            .errors
            .remove(&thread::current().id())
            .unwrap_or(AL_NO_ERROR)
    }

    fn error_string(&self, code: i32) -> String {
        match code {
            AL_NO_ERROR => "No Error",
            AL_INVALID_NAME => "Invalid Name",
            AL_INVALID_ENUM => "Invalid Enum",
            AL_INVALID_VALUE => "Invalid Value",
            AL_INVALID_OPERATION => "Invalid Operation",
            AL_OUT_OF_MEMORY => "Out of Memory",
            _ => "Unknown Error",
        }
        .to_string()
    }
}
