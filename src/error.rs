use thiserror::Error;

/// Top-level application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AppError {
    /// Message fit for printing to the terminal
    pub fn user_message(&self) -> String {
        match self {
            AppError::Audio(err) => err.user_message(),
            AppError::Config(err) => err.user_message(),
            AppError::Io(err) => format!("System error: {}", err),
            AppError::InvalidArgument(msg) => msg.clone(),
        }
    }

    /// Things the user can try next
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AppError::Audio(err) => err.recovery_suggestions(),
            AppError::Config(err) => err.recovery_suggestions(),
            AppError::Io(_) => vec!["Try the operation again".to_string()],
            AppError::InvalidArgument(_) => vec!["Run with --help to see accepted values".to_string()],
        }
    }

    /// How loudly to report this
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Audio(err) => err.severity(),
            AppError::Config(_) => ErrorSeverity::Warning,
            AppError::Io(_) => ErrorSeverity::Error,
            AppError::InvalidArgument(_) => ErrorSeverity::Warning,
        }
    }
}

/// How serious an error is, for logs and the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Audio-related errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// A native call left a nonzero error code behind
    #[error("Audio backend error [{code}: {description}]: {message}")]
    Backend {
        code: i32,
        description: String,
        message: String,
    },

    #[error("{resource} used after delete: {operation}")]
    InvalidResource {
        resource: &'static str,
        operation: &'static str,
    },

    #[error("No such output device: {device}")]
    DeviceNotFound { device: String },

    #[error("No audio devices available")]
    NoDevices,

    #[error("Unsupported format: {channels} channel(s), {sample_size}-bit")]
    UnsupportedFormat { channels: u16, sample_size: u16 },

    #[error("Audio output init failed: {0}")]
    InitializationFailed(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Player fault: {0}")]
    PlayerFault(String),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::Backend { message, description, .. } => {
                format!("The audio backend rejected an operation ({}): {}", description, message)
            }
            AudioError::InvalidResource { resource, .. } => {
                format!("The {} has already been released", resource)
            }
            AudioError::DeviceNotFound { device } => {
                format!("No output device named '{}'", device)
            }
            AudioError::NoDevices => "No audio output device could be opened".to_string(),
            AudioError::UnsupportedFormat { channels, sample_size } => {
                format!(
                    "{}-bit audio with {} channel(s) cannot be played by this backend",
                    sample_size, channels
                )
            }
            AudioError::InitializationFailed(msg) => {
                format!("Audio output could not be started: {}", msg)
            }
            AudioError::Worker(msg) => format!("Audio feeding thread failed: {}", msg),
            AudioError::PlayerFault(msg) => format!("A player stopped responding: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AudioError::Backend { .. } => vec![
                "Stop and restart playback".to_string(),
                "Run with ALSTREAM_LOG_LEVEL=debug for backend details".to_string(),
            ],
            AudioError::InvalidResource { .. } => vec![
                "Create a new device, context or source before retrying".to_string(),
            ],
            AudioError::DeviceNotFound { .. } => vec![
                "Use 'alstream devices' to see available audio devices".to_string(),
                "Device names must match exactly, including case".to_string(),
                "Omit --device to use the default device".to_string(),
            ],
            AudioError::NoDevices => vec![
                "Connect an audio output device".to_string(),
                "Use --null-output to run without hardware".to_string(),
            ],
            AudioError::UnsupportedFormat { .. } => vec![
                "Use mono or stereo audio with 8 or 16 bits per sample".to_string(),
            ],
            AudioError::InitializationFailed(_) => vec![
                "Pick another device with --device".to_string(),
                "Use --null-output to pace playback with a timer".to_string(),
            ],
            AudioError::Worker(_) => vec!["Restart playback".to_string()],
            AudioError::PlayerFault(_) => vec![
                "The faulting stream was dropped; start it again".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::Backend { .. } => true, // Caller may drop the source and continue
            AudioError::InvalidResource { .. } => false,
            AudioError::DeviceNotFound { .. } => true, // Can fall back to default device
            AudioError::NoDevices => false,
            AudioError::UnsupportedFormat { .. } => false,
            AudioError::InitializationFailed(_) => true,
            AudioError::Worker(_) => true,
            AudioError::PlayerFault(_) => true,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AudioError::PlayerFault(_) => ErrorSeverity::Warning,
            AudioError::DeviceNotFound { .. } => ErrorSeverity::Error,
            AudioError::UnsupportedFormat { .. } => ErrorSeverity::Error,
            AudioError::InvalidResource { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Critical,
        }
    }
}

/// Failures reading or writing the settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Home directory unknown")]
    ConfigDirNotFound,

    #[error("Settings file IO: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Settings encode: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Settings parse: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "No home directory to keep alstream settings in".to_string()
            }
            ConfigError::IoError(err) => format!("Settings file unreadable or unwritable: {}", err),
            ConfigError::SerializationError(err) => format!("Settings could not be encoded: {}", err),
            ConfigError::DeserializationError(err) => format!("Settings file is not valid TOML: {}", err),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Pass --config with an explicit file path".to_string(),
                "Set HOME so ~/.config/alstream/ can be used".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Run 'alstream config path' and check that location is writable".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Run 'alstream config reset' and reapply your changes".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Run 'alstream config reset' to restore defaults".to_string(),
                "Compare the file with 'alstream config show' output".to_string(),
            ],
        }
    }
}
