//! Clocks that drive the software backend
//!
//! The software backend only consumes queued audio when told how much time
//! has passed. [`DeviceClock`] takes that time from a real output device's
//! callback (writing silence, since mixing is out of scope), while
//! [`TimerClock`] uses a plain thread for machines without audio hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use log::{debug, error, info, warn};

use super::software::SoftwareBackend;
use crate::error::AudioError;

/// Names of the output devices the host exposes
pub fn list_output_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

    let mut names = Vec::new();
    for device in devices {
        match device.name() {
            Ok(name) => names.push(name),
            Err(e) => warn!("Skipping device without a name: {}", e),
        }
    }
    Ok(names)
}

pub fn default_output_device_name() -> Option<String> {
    cpal::default_host()
        .default_output_device()
        .and_then(|device| device.name().ok())
}

fn find_output_device(device_name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                device: name.to_string(),
            }),
        None => host.default_output_device().ok_or(AudioError::NoDevices),
    }
}

/// Advances the backend from an output device's callback
pub struct DeviceClock {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
}

impl DeviceClock {
    pub fn open(backend: Arc<SoftwareBackend>, device_name: Option<&str>) -> Result<Self, AudioError> {
        let device = find_output_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get default config: {}", e)))?;
        let sample_format = default_config.sample_format();
        let config: StreamConfig = default_config.into();
        let sample_rate = config.sample_rate.0;

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, backend)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, backend)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, backend)?,
            other => {
                return Err(AudioError::InitializationFailed(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };
        stream
            .play()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to start stream: {}", e)))?;

        info!("Output clock running on '{}' at {} Hz", name, sample_rate);
        Ok(Self {
            _stream: stream,
            device_name: name,
            sample_rate,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        backend: Arc<SoftwareBackend>,
    ) -> Result<Stream, AudioError>
    where
        T: cpal::SizedSample + Send + 'static,
    {
        let sample_rate = config.sample_rate.0 as f64;
        let channels = config.channels.max(1) as usize;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    data.fill(T::EQUILIBRIUM);
                    let frames = data.len() / channels;
                    backend.advance(Duration::from_secs_f64(frames as f64 / sample_rate));
                },
                move |err| {
                    error!("Output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to build output stream: {}", e)))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Advances the backend in real time from a background thread
pub struct TimerClock {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TimerClock {
    pub fn start(backend: Arc<SoftwareBackend>, tick: Duration) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("alstream-clock".to_string())
            .spawn(move || {
                let mut last = Instant::now();
                while flag.load(Ordering::Acquire) {
                    thread::sleep(tick);
                    let now = Instant::now();
                    backend.advance(now - last);
                    last = now;
                }
            })
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to spawn clock thread: {}", e)))?;

        debug!("Timer clock started with {:?} ticks", tick);
        Ok(Self {
            running,
            thread: Some(thread),
        })
    }
}

impl Drop for TimerClock {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Clock thread panicked");
            }
        }
    }
}

/// Whichever clock is pacing playback
pub enum Clock {
    Device(DeviceClock),
    Timer(TimerClock),
}

impl Clock {
    pub fn describe(&self) -> String {
        match self {
            Clock::Device(clock) => format!("{} ({} Hz)", clock.device_name(), clock.sample_rate()),
            Clock::Timer(_) => "timer (no output device)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::{AlBackend, SourceParam, AL_FORMAT_MONO8, AL_STOPPED};

    #[test]
    fn test_timer_clock_drives_playback() {
        let backend = Arc::new(SoftwareBackend::new());
        let device = backend.open_device(None).unwrap();
        let context = backend.create_context(device).unwrap();
        backend.make_context_current(Some(context));

        let source = backend.gen_source();
        let buffer = backend.gen_buffer();
        // 20 ms at 1000 Hz mono 8-bit
        backend.buffer_data(buffer, AL_FORMAT_MONO8, &[0x80; 20], 1000);
        backend.source_queue_buffers(source, &[buffer]);
        backend.source_play(source);

        let clock = TimerClock::start(backend.clone(), Duration::from_millis(2)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while backend.get_source_i(source, SourceParam::State) != AL_STOPPED
            && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(2));
        }
        drop(clock);

        assert_eq!(backend.get_source_i(source, SourceParam::State), AL_STOPPED);
        assert_eq!(backend.get_source_i(source, SourceParam::BuffersProcessed), 1);
    }

    #[test]
    fn test_timer_clock_stops_on_drop() {
        let backend = Arc::new(SoftwareBackend::new());
        let clock = TimerClock::start(backend, Duration::from_millis(1)).unwrap();
        let description = Clock::Timer(clock).describe();
        assert!(description.contains("timer"));
    }
}
