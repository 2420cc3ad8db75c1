use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use alstream::audio::output::{default_output_device_name, list_output_devices};
use alstream::audio::{
    Clock, Device, DeviceClock, Player, ProceduralSource, SoftwareBackend, StreamingPlayer,
    TimerClock, Worker,
};
use alstream::cli::status::StreamStatus;
use alstream::cli::{CliApp, Commands, ConfigAction, StatusDisplay};
use alstream::config::{AudioConfig, ConfigManager};
use alstream::error::{AppError, AudioError};
use alstream::logging;

const TIMER_TICK: Duration = Duration::from_millis(10);
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

struct PlayOptions {
    players: usize,
    frequency: f64,
    duration: Duration,
    device: Option<String>,
    null_output: bool,
}

/// A player together with the handle the worker knows it by
struct Stream {
    player: Arc<StreamingPlayer>,
    handle: Arc<dyn Player>,
    finished: bool,
}

fn main() {
    if let Err(e) = logging::init(log::LevelFilter::Warn) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse();
    if let Err(e) = run(cli) {
        StatusDisplay::display_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: CliApp) -> Result<(), AppError> {
    let mut config_manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    match cli.command {
        Commands::Devices => {
            let devices = list_output_devices()?;
            StatusDisplay::display_devices(&devices, default_output_device_name().as_deref());
        }
        Commands::Play {
            players,
            frequency,
            duration,
            device,
            null_output,
        } => {
            let duration = CliApp::parse_time(&duration)
                .map_err(|e| AppError::InvalidArgument(e.to_string()))?;
            let options = PlayOptions {
                players,
                frequency,
                duration,
                device,
                null_output,
            };
            play(config_manager.get_config(), options)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("# {}", config_manager.config_path().display());
                print!("{}", config_manager.to_toml()?);
            }
            ConfigAction::Reset => {
                config_manager.reset_to_defaults()?;
                println!("OK: Configuration reset to defaults");
            }
            ConfigAction::Path => {
                println!("{}", config_manager.config_path().display());
            }
            ConfigAction::Device { name } => {
                match &name {
                    Some(name) => println!("OK: Output device set to '{}'", name),
                    None => println!("OK: Using the default output device"),
                }
                config_manager.set_device(name)?;
            }
        },
    }
    Ok(())
}

fn open_clock(
    backend: &Arc<SoftwareBackend>,
    device: Option<&str>,
    null_output: bool,
) -> Result<Clock, AudioError> {
    if null_output {
        return Ok(Clock::Timer(TimerClock::start(backend.clone(), TIMER_TICK)?));
    }

    match DeviceClock::open(backend.clone(), device) {
        Ok(clock) => Ok(Clock::Device(clock)),
        Err(e) => {
            warn!("Output device unavailable, pacing with a timer: {}", e);
            eprintln!("Warning: {}", e.user_message());
            Ok(Clock::Timer(TimerClock::start(backend.clone(), TIMER_TICK)?))
        }
    }
}

fn play(config: &AudioConfig, options: PlayOptions) -> Result<(), AppError> {
    if options.players == 0 {
        return Err(AppError::InvalidArgument(
            "At least one player is required".to_string(),
        ));
    }
    if !options.frequency.is_finite() || options.frequency <= 0.0 {
        return Err(AppError::InvalidArgument(format!(
            "Invalid frequency: {}",
            options.frequency
        )));
    }

    let backend = Arc::new(SoftwareBackend::new());
    let device_name = options.device.clone().or_else(|| config.device.clone());
    let clock = open_clock(&backend, device_name.as_deref(), options.null_output)?;
    println!("Output: {}", clock.describe());

    let mut device = Device::open(backend.clone(), None)?;
    let mut context = device.create_context()?;
    context
        .buffer_pool()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .set_reuse_order(config.pool.reuse_order);

    let worker = Worker::new(config.worker.clone());
    worker.start()?;

    let mut streams = Vec::with_capacity(options.players);
    for index in 0..options.players {
        let frequency = options.frequency * (index + 1) as f64;
        let source = ProceduralSource::sine(options.duration, frequency);
        let player = Arc::new(StreamingPlayer::new(&context, Box::new(source), &config.player)?);
        player.play()?;

        let handle: Arc<dyn Player> = player.clone();
        worker.add(handle.clone());
        streams.push(Stream {
            player,
            handle,
            finished: false,
        });
    }
    info!("Streaming {} player(s) for {:?}", options.players, options.duration);

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::Relaxed);
    })
    .map_err(|e| AudioError::InitializationFailed(format!("Failed to set Ctrl-C handler: {}", e)))?;

    let started = Instant::now();
    let mut last_report = started;
    let result = supervise(&worker, &mut streams, &running, started, &mut last_report);

    if !running.load(Ordering::Relaxed) {
        println!("\nInterrupted. Shutting down...");
    }

    worker.stop()?;
    for stream in &streams {
        stream.player.stop()?;
        stream.player.delete()?;
    }
    drop(streams);
    context.delete()?;
    device.delete()?;
    drop(clock);

    result?;
    println!("Done in {}", CliApp::format_duration(started.elapsed()));
    Ok(())
}

/// Poll the players until all of them are done or playback is interrupted
fn supervise(
    worker: &Worker,
    streams: &mut [Stream],
    running: &AtomicBool,
    started: Instant,
    last_report: &mut Instant,
) -> Result<(), AppError> {
    while running.load(Ordering::Relaxed) {
        let mut statuses = Vec::with_capacity(streams.len());
        let mut active = 0;

        for (index, stream) in streams.iter_mut().enumerate() {
            if !stream.finished {
                if stream.player.is_finished()? {
                    worker.remove(&stream.handle);
                    stream.finished = true;
                    info!("Player {} finished", index + 1);
                } else if !worker.contains(&stream.handle) {
                    // The worker drops players whose callbacks fail
                    warn!("Player {} was dropped by the worker", index + 1);
                    stream.finished = true;
                } else {
                    active += 1;
                }
            }

            statuses.push(StreamStatus {
                index: index + 1,
                format: stream.player.audio_format(),
                state: stream.player.source_state()?,
                finished: stream.finished,
            });
        }

        if last_report.elapsed() >= REPORT_INTERVAL || active == 0 {
            StatusDisplay::display_streams(&statuses, started.elapsed());
            *last_report = Instant::now();
        }
        if active == 0 {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}
