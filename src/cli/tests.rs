use crate::cli::status::{StatusDisplay, StreamStatus};
use crate::cli::{CliApp, Commands, ConfigAction, ParseError};
use crate::models::{AudioFormat, SourceState};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_parse_play_defaults() {
    let cli = CliApp::try_parse_from(["alstream", "play"]).unwrap();
    match cli.command {
        Commands::Play {
            players,
            frequency,
            duration,
            device,
            null_output,
        } => {
            assert_eq!(players, 1);
            assert_eq!(frequency, 440.0);
            assert_eq!(duration, "2");
            assert!(device.is_none());
            assert!(!null_output);
        }
        other => panic!("Expected Play command, got {:?}", other),
    }
    assert!(cli.config.is_none());
}

#[test]
fn test_parse_play_with_options() {
    let cli = CliApp::try_parse_from([
        "alstream",
        "play",
        "--players",
        "3",
        "--frequency",
        "220",
        "--duration",
        "1:30",
        "--device",
        "Speakers",
        "--null-output",
    ])
    .unwrap();

    match cli.command {
        Commands::Play {
            players,
            frequency,
            duration,
            device,
            null_output,
        } => {
            assert_eq!(players, 3);
            assert_eq!(frequency, 220.0);
            assert_eq!(duration, "1:30");
            assert_eq!(device.as_deref(), Some("Speakers"));
            assert!(null_output);
        }
        other => panic!("Expected Play command, got {:?}", other),
    }
}

#[test]
fn test_parse_config_commands() {
    let cli = CliApp::try_parse_from(["alstream", "config", "show", "--config", "/tmp/a.toml"]).unwrap();
    assert!(matches!(cli.command, Commands::Config { action: ConfigAction::Show }));
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.toml")));

    let cli = CliApp::try_parse_from(["alstream", "config", "device", "Headphones"]).unwrap();
    match cli.command {
        Commands::Config {
            action: ConfigAction::Device { name },
        } => assert_eq!(name.as_deref(), Some("Headphones")),
        other => panic!("Expected Config Device, got {:?}", other),
    }

    assert!(CliApp::try_parse_from(["alstream", "config"]).is_err());
    assert!(CliApp::try_parse_from(["alstream", "rewind"]).is_err());
}

#[test]
fn test_parse_time() {
    assert_eq!(CliApp::parse_time("90").unwrap(), Duration::from_secs(90));
    assert_eq!(CliApp::parse_time("90s").unwrap(), Duration::from_secs(90));
    assert_eq!(CliApp::parse_time("2.5").unwrap(), Duration::from_millis(2500));
    assert_eq!(CliApp::parse_time("1:30").unwrap(), Duration::from_secs(90));

    for bad in ["", "abc", "0", "-1", "1:75", "x:10"] {
        assert_eq!(
            CliApp::parse_time(bad),
            Err(ParseError::InvalidTime(bad.to_string())),
            "{:?} should be rejected",
            bad
        );
    }
}

#[test]
fn test_format_duration() {
    assert_eq!(CliApp::format_duration(Duration::from_millis(0)), "0:00.0");
    assert_eq!(CliApp::format_duration(Duration::from_millis(1500)), "0:01.5");
    assert_eq!(CliApp::format_duration(Duration::from_secs(95)), "1:35.0");
}

#[test]
fn test_stream_line() {
    let status = StreamStatus {
        index: 2,
        format: AudioFormat::new(1, 16, 44100),
        state: SourceState::Playing,
        finished: false,
    };
    assert_eq!(
        StatusDisplay::stream_line(&status, Duration::from_millis(1500)),
        "#2 Playing | 16-bit/44100 Hz - 1 channel | 0:01.5"
    );

    let finished = StreamStatus {
        finished: true,
        state: SourceState::Stopped,
        ..status
    };
    assert!(StatusDisplay::stream_line(&finished, Duration::from_secs(2)).starts_with("#2 Finished"));
}
