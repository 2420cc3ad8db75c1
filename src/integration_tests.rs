use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::audio::output::TimerClock;
use crate::audio::procedural::{ProceduralSource, Waveform};
use crate::audio::{
    AudioSource, Context, Device, Player, ReuseOrder, SoftwareBackend, StreamingPlayer, Worker,
};
use crate::config::{ConfigManager, PlayerConfig, WorkerConfig};
use crate::error::AudioError;
use crate::models::SourceState;

// 1000 Hz mono 8-bit: one byte per millisecond of playback
fn tone(millis: u64) -> Box<dyn AudioSource> {
    Box::new(
        ProceduralSource::new(
            Waveform::Sine { frequency: 50.0 },
            Duration::from_millis(millis),
            1000,
            8,
        )
        .unwrap(),
    )
}

fn player_config() -> PlayerConfig {
    PlayerConfig {
        buffer_size: 100,
        buffered_seconds: 0.25,
    }
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        min_write_size: 50,
        nap_time_ms: 2,
        slow_refill_ms: 1000,
    }
}

fn setup(backend: SoftwareBackend) -> (Arc<SoftwareBackend>, Device, Context) {
    let backend = Arc::new(backend);
    let device = Device::open(backend.clone(), None).unwrap();
    let context = device.create_context().unwrap();
    (backend, device, context)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn test_worker_streams_players_to_completion() {
    let (backend, _device, context) = setup(SoftwareBackend::new());
    let worker = Worker::new(worker_config());
    worker.start().unwrap();

    let players: Vec<Arc<StreamingPlayer>> = [300, 450]
        .iter()
        .map(|&millis| Arc::new(StreamingPlayer::new(&context, tone(millis), &player_config()).unwrap()))
        .collect();
    for player in &players {
        player.play().unwrap();
        worker.add(player.clone());
    }

    let finished = wait_until(Duration::from_secs(10), || {
        backend.advance(Duration::from_millis(5));
        players.iter().all(|p| p.is_finished().unwrap())
    });
    assert!(finished, "players did not drain in time");

    for player in &players {
        let handle: Arc<dyn Player> = player.clone();
        worker.remove(&handle);
        assert_eq!(player.get_write_size().unwrap(), 0);
    }
    assert!(worker.is_empty());
    worker.stop().unwrap();

    // Every live buffer is back in the pool
    let pooled = context.buffer_pool().lock().unwrap().len();
    assert!(pooled > 0);
    assert_eq!(pooled, backend.buffer_count());
}

#[test]
fn test_timer_clock_paces_worker_playback() {
    let (backend, _device, context) = setup(SoftwareBackend::new());
    let worker = Worker::new(worker_config());
    worker.start().unwrap();

    let player = Arc::new(StreamingPlayer::new(&context, tone(200), &player_config()).unwrap());
    player.play().unwrap();
    worker.add(player.clone());

    let clock = TimerClock::start(backend.clone(), Duration::from_millis(2)).unwrap();
    let started = Instant::now();
    assert!(wait_until(Duration::from_secs(10), || player.is_finished().unwrap()));
    drop(clock);

    // Real time pacing: 200 ms of audio cannot finish much sooner
    assert!(started.elapsed() >= Duration::from_millis(150));
    worker.stop().unwrap();
    assert_eq!(player.source_state().unwrap(), SourceState::Stopped);
}

#[test]
fn test_pool_reuses_buffers_between_players() {
    let (backend, _device, context) = setup(SoftwareBackend::new());
    let config = PlayerConfig {
        buffer_size: 100,
        buffered_seconds: 0.5,
    };

    let first = StreamingPlayer::new(&context, tone(500), &config).unwrap();
    first.refill(500).unwrap();
    first.play().unwrap();
    backend.advance(Duration::from_millis(600));
    first.refill(100).unwrap();
    assert!(first.is_finished().unwrap());
    assert_eq!(backend.buffer_count(), 5);
    assert_eq!(context.buffer_pool().lock().unwrap().len(), 5);

    let second = StreamingPlayer::new(&context, tone(300), &config).unwrap();
    second.refill(300).unwrap();
    assert_eq!(backend.buffer_count(), 5);
    assert_eq!(context.buffer_pool().lock().unwrap().len(), 2);
}

#[test]
fn test_fifo_pool_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "[pool]\nreuse_order = \"fifo\"\n").unwrap();
    let manager = ConfigManager::with_path(config_path);

    let (_backend, _device, context) = setup(SoftwareBackend::new());
    let pool = context.buffer_pool();
    let mut pool = pool.lock().unwrap();
    pool.set_reuse_order(manager.get_config().pool.reuse_order);
    assert_eq!(pool.reuse_order(), ReuseOrder::Fifo);

    let buffers = pool.get_buffers(3).unwrap();
    let names: Vec<_> = buffers.iter().map(|b| b.name()).collect();
    for buffer in buffers {
        pool.unqueue_buffer(buffer);
    }
    assert_eq!(pool.get_buffer().unwrap().name(), names[0]);
}

/// Fails on its third write-size query
struct FlakyPlayer {
    calls: AtomicUsize,
}

impl Player for FlakyPlayer {
    fn get_write_size(&self) -> Result<usize, AudioError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= 2 {
            return Err(AudioError::PlayerFault("stream vanished".to_string()));
        }
        Ok(0)
    }

    fn refill(&self, _num_bytes: usize) -> Result<(), AudioError> {
        Ok(())
    }
}

#[test]
fn test_faulty_player_does_not_starve_others() {
    let (backend, _device, context) = setup(SoftwareBackend::new());
    let worker = Worker::new(worker_config());
    worker.start().unwrap();

    let flaky: Arc<dyn Player> = Arc::new(FlakyPlayer {
        calls: AtomicUsize::new(0),
    });
    worker.add(flaky.clone());

    let player = Arc::new(StreamingPlayer::new(&context, tone(1000), &player_config()).unwrap());
    player.play().unwrap();
    worker.add(player.clone());

    assert!(wait_until(Duration::from_secs(5), || !worker.contains(&flaky)));
    assert!(wait_until(Duration::from_secs(5), || {
        player.source_state().unwrap() == SourceState::Playing
    }));

    backend.advance(Duration::from_millis(100));
    assert!(wait_until(Duration::from_secs(5), || {
        player.get_write_size().unwrap() < 50
    }));
    assert_eq!(worker.len(), 1);
    worker.stop().unwrap();
}

#[test]
fn test_driver_freeing_queued_buffers_with_source() {
    let (backend, _device, context) =
        setup(SoftwareBackend::new().with_frees_buffers_on_source_delete(true));

    let first = StreamingPlayer::new(&context, tone(1000), &player_config()).unwrap();
    first.refill(250).unwrap();
    first.play().unwrap();
    backend.advance(Duration::from_millis(150));
    // One buffer played and went back to the pool; two are still queued
    assert_eq!(first.get_write_size().unwrap(), 150);
    assert_eq!(context.buffer_pool().lock().unwrap().len(), 1);

    first.delete().unwrap();
    assert_eq!(backend.buffer_count(), 1);

    let second = StreamingPlayer::new(&context, tone(1000), &player_config()).unwrap();
    second.refill(250).unwrap();
    second.play().unwrap();
    assert_eq!(second.source_state().unwrap(), SourceState::Playing);
    assert_eq!(backend.buffer_count(), 3);
    assert!(context.buffer_pool().lock().unwrap().is_empty());
}

/// Records every refill size while feeding a real player
struct CountingPlayer {
    inner: StreamingPlayer,
    refills: Mutex<Vec<usize>>,
}

impl Player for CountingPlayer {
    fn get_write_size(&self) -> Result<usize, AudioError> {
        self.inner.get_write_size()
    }

    fn refill(&self, num_bytes: usize) -> Result<(), AudioError> {
        self.refills.lock().unwrap().push(num_bytes);
        self.inner.refill(num_bytes)
    }
}

#[test]
fn test_refills_never_overfill_capacity() {
    let (backend, _device, context) = setup(SoftwareBackend::new());
    let worker = Worker::new(worker_config());
    worker.start().unwrap();

    let player = Arc::new(CountingPlayer {
        inner: StreamingPlayer::new(&context, tone(2000), &player_config()).unwrap(),
        refills: Mutex::new(Vec::new()),
    });
    player.inner.play().unwrap();
    worker.add(player.clone());

    for _ in 0..50 {
        backend.advance(Duration::from_millis(7));
        thread::sleep(Duration::from_millis(2));
        // Queued-but-unplayed audio never exceeds the 250 byte target
        assert!(player.inner.get_write_size().unwrap() <= 250);
    }
    worker.stop().unwrap();

    let refills = player.refills.lock().unwrap();
    assert!(!refills.is_empty());
    assert!(refills.iter().all(|&n| n > 50 && n <= 250));
}

#[test]
fn test_full_teardown_releases_native_objects() {
    let (backend, mut device, mut context) = setup(SoftwareBackend::new());
    let player = StreamingPlayer::new(&context, tone(1000), &player_config()).unwrap();
    player.refill(250).unwrap();
    player.play().unwrap();

    // The device refuses to close under a live context
    assert!(device.delete().is_err());

    player.stop().unwrap();
    player.delete().unwrap();
    assert_eq!(backend.source_count(), 0);

    context.delete().unwrap();
    assert_eq!(backend.buffer_count(), 0);
    device.delete().unwrap();
    assert!(!device.is_ready());
}
