use std::time::Duration;

use crate::cli::CliApp;
use crate::error::AppError;
use crate::models::{AudioFormat, SourceState};

/// Progress of one stream, as shown while playing
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStatus {
    pub index: usize,
    pub format: AudioFormat,
    pub state: SourceState,
    pub finished: bool,
}

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Print output devices, marking the default one
    pub fn display_devices(devices: &[String], default: Option<&str>) {
        if devices.is_empty() {
            println!("No output devices found");
            return;
        }

        println!("┌─ Output Devices ────────────────────────────────────────┐");
        for device in devices {
            let marker = if Some(device.as_str()) == default { "*" } else { " " };
            println!("│ {} {}", marker, device);
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// One line per stream, e.g. "#1 Playing | 16-bit/44100 Hz - 1 channel | 0:01.5"
    pub fn stream_line(status: &StreamStatus, elapsed: Duration) -> String {
        let state = if status.finished {
            "Finished"
        } else {
            status.state.as_str()
        };
        format!(
            "#{} {} | {} | {}",
            status.index,
            state,
            status.format.format_description(),
            CliApp::format_duration(elapsed)
        )
    }

    pub fn display_streams(streams: &[StreamStatus], elapsed: Duration) {
        for status in streams {
            println!("{}", Self::stream_line(status, elapsed));
        }
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &AppError) {
        let severity = error.severity();
        eprintln!("[{}] {}", severity.as_str(), error.user_message());

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("Suggestion: {}", suggestions[0]);
        }
    }

    /// Display an error with every recovery suggestion
    pub fn display_error(error: &AppError) {
        eprintln!("Error: {}", error.user_message());
        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!();
            eprintln!("Suggestions:");
            for suggestion in suggestions {
                eprintln!("  • {}", suggestion);
            }
        }
    }
}
