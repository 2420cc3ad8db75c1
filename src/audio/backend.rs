//! Native audio backend capability interface
//!
//! Everything the wrappers in this crate need from an AL-style audio API:
//! devices, contexts, sources and buffers addressed by integer names, plus
//! a sticky error code that is cleared by reading it. The wrappers never
//! talk to a platform library directly; they go through [`AlBackend`].

use crate::error::AudioError;
use crate::models::{AudioFormat, SourceState};

pub const AL_NO_ERROR: i32 = 0;
pub const AL_INVALID_NAME: i32 = 0xA001;
pub const AL_INVALID_ENUM: i32 = 0xA002;
pub const AL_INVALID_VALUE: i32 = 0xA003;
pub const AL_INVALID_OPERATION: i32 = 0xA004;
pub const AL_OUT_OF_MEMORY: i32 = 0xA005;

pub const ALC_INVALID_CONTEXT: i32 = 0xA002;

pub const AL_INITIAL: i32 = 0x1011;
pub const AL_PLAYING: i32 = 0x1012;
pub const AL_PAUSED: i32 = 0x1013;
pub const AL_STOPPED: i32 = 0x1014;

pub const AL_FORMAT_MONO8: i32 = 0x1100;
pub const AL_FORMAT_MONO16: i32 = 0x1101;
pub const AL_FORMAT_STEREO8: i32 = 0x1102;
pub const AL_FORMAT_STEREO16: i32 = 0x1103;

/// Opaque native device handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

/// Opaque native context handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u32);

/// Integer source properties that can be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceParam {
    State,
    BuffersQueued,
    BuffersProcessed,
    ByteOffset,
}

/// Capability interface of the native audio API
///
/// Calls that can fail record an error code instead of returning one;
/// callers read it back with [`AlBackend::get_error`], which also clears it.
/// Source and buffer names of `0` mean "no object".
pub trait AlBackend: Send + Sync {
    // === Devices ===

    /// Open a device by name, or the default device for `None`
    fn open_device(&self, name: Option<&str>) -> Option<DeviceHandle>;

    /// Close a device. Fails while contexts created from it are alive.
    fn close_device(&self, device: DeviceHandle) -> bool;

    fn device_name(&self, device: DeviceHandle) -> Option<String>;

    fn device_version(&self, device: DeviceHandle) -> (i32, i32);

    /// Extension list as the platform reports it (NUL- or space-separated)
    fn device_extensions(&self, device: DeviceHandle) -> String;

    // === Contexts ===

    fn create_context(&self, device: DeviceHandle) -> Option<ContextHandle>;

    fn destroy_context(&self, context: ContextHandle);

    /// Make a context current for the calling thread (`None` clears it)
    fn make_context_current(&self, context: Option<ContextHandle>) -> bool;

    /// Context current on the calling thread
    fn current_context(&self) -> Option<ContextHandle>;

    // === Sources ===

    fn gen_source(&self) -> u32;

    fn delete_source(&self, source: u32);

    fn source_play(&self, source: u32);

    fn source_pause(&self, source: u32);

    fn source_stop(&self, source: u32);

    fn get_source_i(&self, source: u32, param: SourceParam) -> i32;

    fn source_queue_buffers(&self, source: u32, buffers: &[u32]);

    fn source_unqueue_buffers(&self, source: u32, count: usize) -> Vec<u32>;

    // === Buffers ===

    fn gen_buffer(&self) -> u32;

    fn delete_buffer(&self, buffer: u32);

    fn is_buffer(&self, buffer: u32) -> bool;

    fn buffer_data(&self, buffer: u32, format: i32, data: &[u8], frequency: i32);

    // === Errors ===

    /// Read and clear the pending error code
    fn get_error(&self) -> i32;

    fn error_string(&self, code: i32) -> String;
}

/// Read the backend error code and turn anything nonzero into an error
pub fn check_error(backend: &dyn AlBackend, message: &str) -> Result<(), AudioError> {
    let code = backend.get_error();
    if code == AL_NO_ERROR {
        return Ok(());
    }
    Err(AudioError::Backend {
        code,
        description: backend.error_string(code),
        message: message.to_string(),
    })
}

/// Native format enum for a PCM layout
pub fn format_for(format: &AudioFormat) -> Result<i32, AudioError> {
    match (format.channels, format.sample_size) {
        (1, 8) => Ok(AL_FORMAT_MONO8),
        (1, 16) => Ok(AL_FORMAT_MONO16),
        (2, 8) => Ok(AL_FORMAT_STEREO8),
        (2, 16) => Ok(AL_FORMAT_STEREO16),
        (channels, sample_size) => Err(AudioError::UnsupportedFormat {
            channels,
            sample_size,
        }),
    }
}

/// `(channels, sample_size)` of a native format enum
pub fn format_layout(format: i32) -> Option<(u16, u16)> {
    match format {
        AL_FORMAT_MONO8 => Some((1, 8)),
        AL_FORMAT_MONO16 => Some((1, 16)),
        AL_FORMAT_STEREO8 => Some((2, 8)),
        AL_FORMAT_STEREO16 => Some((2, 16)),
        _ => None,
    }
}

pub fn source_state_from_raw(raw: i32) -> Option<SourceState> {
    match raw {
        AL_INITIAL => Some(SourceState::Initial),
        AL_PLAYING => Some(SourceState::Playing),
        AL_PAUSED => Some(SourceState::Paused),
        AL_STOPPED => Some(SourceState::Stopped),
        _ => None,
    }
}

pub fn source_state_to_raw(state: SourceState) -> i32 {
    match state {
        SourceState::Initial => AL_INITIAL,
        SourceState::Playing => AL_PLAYING,
        SourceState::Paused => AL_PAUSED,
        SourceState::Stopped => AL_STOPPED,
    }
}

/// Split an extension string into names.
///
/// Some platforms report a space-separated list, others a NUL-separated list
/// terminated by a double NUL. Anything after the double NUL is ignored.
pub fn split_extension_list(raw: &str) -> Vec<String> {
    let list = match raw.find("\0\0") {
        Some(end) => &raw[..end],
        None => raw,
    };
    list.split(|c: char| c == '\0' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_supported_layouts() {
        assert_eq!(format_for(&AudioFormat::new(1, 8, 44100)).unwrap(), AL_FORMAT_MONO8);
        assert_eq!(format_for(&AudioFormat::new(1, 16, 44100)).unwrap(), AL_FORMAT_MONO16);
        assert_eq!(format_for(&AudioFormat::new(2, 8, 44100)).unwrap(), AL_FORMAT_STEREO8);
        assert_eq!(format_for(&AudioFormat::new(2, 16, 44100)).unwrap(), AL_FORMAT_STEREO16);
    }

    #[test]
    fn test_format_for_unsupported_layout() {
        match format_for(&AudioFormat::new(6, 24, 48000)) {
            Err(AudioError::UnsupportedFormat { channels, sample_size }) => {
                assert_eq!(channels, 6);
                assert_eq!(sample_size, 24);
            }
            other => panic!("Expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_format_layout_matches_format_for() {
        for (channels, size) in [(1, 8), (1, 16), (2, 8), (2, 16)] {
            let code = format_for(&AudioFormat::new(channels, size, 8000)).unwrap();
            assert_eq!(format_layout(code), Some((channels, size)));
        }
        assert_eq!(format_layout(0x1234), None);
    }

    #[test]
    fn test_source_state_raw_values() {
        for state in [
            SourceState::Initial,
            SourceState::Playing,
            SourceState::Paused,
            SourceState::Stopped,
        ] {
            assert_eq!(source_state_from_raw(source_state_to_raw(state)), Some(state));
        }
        assert_eq!(source_state_from_raw(0), None);
    }

    #[test]
    fn test_split_space_separated_extensions() {
        let names = split_extension_list("ALC_ENUMERATE_ALL_EXT ALC_EXT_CAPTURE  ALC_EXT_EFX");
        assert_eq!(names, vec!["ALC_ENUMERATE_ALL_EXT", "ALC_EXT_CAPTURE", "ALC_EXT_EFX"]);
    }

    #[test]
    fn test_split_nul_separated_extensions() {
        let names = split_extension_list("ALC_EXT_CAPTURE\0ALC_EXT_EFX\0\0garbage");
        assert_eq!(names, vec!["ALC_EXT_CAPTURE", "ALC_EXT_EFX"]);
    }

    #[test]
    fn test_split_empty_extension_list() {
        assert!(split_extension_list("").is_empty());
        assert!(split_extension_list("\0\0").is_empty());
    }
}
