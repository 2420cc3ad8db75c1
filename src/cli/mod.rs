use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub mod status;
pub use status::StatusDisplay;

#[cfg(test)]
mod tests;

/// Streaming audio scheduler CLI
#[derive(Debug, Parser)]
#[command(name = "alstream")]
#[command(about = "Feeds streaming audio sources through a background refill worker")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List audio output devices
    Devices,
    /// Stream generated tones through the refill worker
    Play {
        /// Number of concurrent players
        #[arg(short, long, default_value_t = 1)]
        players: usize,
        /// Tone frequency of the first player in Hz
        #[arg(short, long, default_value_t = 440.0)]
        frequency: f64,
        /// Length of each stream (e.g. "2.5", "1:30", "90s")
        #[arg(short, long, default_value = "2")]
        duration: String,
        /// Output device to pace playback with
        #[arg(long)]
        device: Option<String>,
        /// Pace playback with a timer instead of an output device
        #[arg(long)]
        null_output: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the active configuration
    Show,
    /// Restore and save the default configuration
    Reset,
    /// Print the configuration file location
    Path,
    /// Remember an output device (omit the name to use the default)
    Device { name: Option<String> },
}

/// Error parsing a command-line value
#[derive(Debug, PartialEq)]
pub enum ParseError {
    InvalidTime(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ParseError::InvalidTime(time) => write!(f, "Invalid time format: {}", time),
        }
    }
}

impl std::error::Error for ParseError {}

impl CliApp {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse "90", "90s", "2.5" or "m:ss" into a duration
    pub fn parse_time(time_str: &str) -> Result<Duration, ParseError> {
        let invalid = || ParseError::InvalidTime(time_str.to_string());
        let trimmed = time_str.trim();

        let seconds = if let Some((minutes, seconds)) = trimmed.split_once(':') {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
            if !(0.0..60.0).contains(&seconds) {
                return Err(invalid());
            }
            minutes as f64 * 60.0 + seconds
        } else {
            trimmed
                .strip_suffix('s')
                .unwrap_or(trimmed)
                .parse::<f64>()
                .map_err(|_| invalid())?
        };

        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(invalid());
        }
        Ok(Duration::from_secs_f64(seconds))
    }

    /// Format a duration as m:ss.t
    pub fn format_duration(duration: Duration) -> String {
        let tenths = duration.as_millis() / 100;
        format!("{}:{:02}.{}", tenths / 600, (tenths / 10) % 60, tenths % 10)
    }
}
