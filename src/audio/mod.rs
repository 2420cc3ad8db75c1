pub mod backend;
pub mod buffer;
pub mod context;
pub mod device;
pub mod output;
pub mod player;
pub mod procedural;
pub mod software;
pub mod source;
pub mod worker;

// Re-export the native API seam
pub use backend::{AlBackend, ContextHandle, DeviceHandle, SourceParam};

// Re-export resource wrappers
pub use buffer::{Buffer, BufferPool, ReuseOrder};
pub use context::Context;
pub use device::Device;
pub use source::Source;

// Re-export playback scheduling
pub use player::{Player, StreamingPlayer};
pub use worker::Worker;

// Re-export audio generation
pub use procedural::{AudioSource, ProceduralSource, Waveform};

// Re-export drivers and clocks
pub use output::{Clock, DeviceClock, TimerClock};
pub use software::SoftwareBackend;
