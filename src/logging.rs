use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

/// Environment variable that overrides the log level
pub const LOG_LEVEL_ENV: &str = "ALSTREAM_LOG_LEVEL";

/// Parse a level name, falling back to `default` for anything unknown
pub fn parse_level(level: &str, default: log::LevelFilter) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => default,
    }
}

/// Initialize logging with `ALSTREAM_LOG_LEVEL`, or `default` when unset
pub fn init(default: log::LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    let level = std::env::var(LOG_LEVEL_ENV)
        .map(|value| parse_level(&value, default))
        .unwrap_or(default);

    let mut builder = env_logger::Builder::new();
    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            std::thread::current().name().unwrap_or("unnamed"),
            record.args()
        )
    });
    builder.filter_level(level);
    builder.try_init()?;

    info!("Logging initialized with level: {}", level);
    Ok(())
}

/// Measures how long one step takes and logs the result
///
/// The worker wraps every refill in one of these so slow players show up
/// in the log.
pub struct OperationTimer {
    started: Instant,
    label: String,
}

impl OperationTimer {
    pub fn new(label: String) -> Self {
        trace!("{}: started", label);
        Self {
            started: Instant::now(),
            label,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn millis(elapsed: Duration) -> f64 {
        elapsed.as_secs_f64() * 1000.0
    }

    /// Stop timing and log at trace level
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        trace!("{}: done in {:.2}ms", self.label, Self::millis(elapsed));
        elapsed
    }

    /// Stop timing, warning if `threshold` was exceeded
    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let elapsed = self.elapsed();
        if elapsed > threshold {
            warn!(
                "{}: slow, {:.2}ms (limit {}ms)",
                self.label,
                Self::millis(elapsed),
                threshold.as_millis()
            );
        } else {
            debug!("{}: done in {:.2}ms", self.label, Self::millis(elapsed));
        }
        elapsed
    }
}
