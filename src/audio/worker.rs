//! Background feeding thread
//!
//! One thread services every registered [`Player`]: it measures how much
//! each can take, skips those below `min_write_size`, and refills the rest
//! largest first with exactly the measured amount. Refills run inline on
//! the worker thread, so a player must keep its work bounded by the size it
//! is asked for.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, error, info, trace};

use super::player::Player;
use crate::config::WorkerConfig;
use crate::error::AudioError;
use crate::logging::OperationTimer;

fn same_player(a: &Arc<dyn Player>, b: &Arc<dyn Player>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "player panicked".to_string()
    }
}

/// Run a player callback, turning a panic into a player fault
fn guarded<T>(callback: impl FnOnce() -> Result<T, AudioError>) -> Result<T, AudioError> {
    panic::catch_unwind(AssertUnwindSafe(callback))
        .unwrap_or_else(|payload| Err(AudioError::PlayerFault(panic_message(payload))))
}

struct WorkerState {
    players: Vec<Arc<dyn Player>>,
    stopped: bool,
}

struct Shared {
    config: WorkerConfig,
    state: Mutex<WorkerState>,
    wakeup: Condvar,
    /// Held for the whole of each service pass
    pass: Mutex<()>,
    thread_id: Mutex<Option<ThreadId>>,
}

impl Shared {
    fn on_worker_thread(&self) -> bool {
        *lock(&self.thread_id) == Some(thread::current().id())
    }

    fn is_registered(&self, player: &Arc<dyn Player>) -> bool {
        lock(&self.state).players.iter().any(|p| same_player(p, player))
    }

    fn is_stopped(&self) -> bool {
        lock(&self.state).stopped
    }

    /// Block until there is something to do. Returns false once stopped.
    fn wait(&self) -> bool {
        let mut state = lock(&self.state);
        if state.stopped {
            return false;
        }
        state = if state.players.is_empty() {
            self.wakeup.wait(state).unwrap_or_else(PoisonError::into_inner)
        } else {
            self.wakeup
                .wait_timeout(state, self.config.nap_time())
                .unwrap_or_else(PoisonError::into_inner)
                .0
        };
        !state.stopped
    }

    fn drop_faulted(&self, player: &Arc<dyn Player>, err: AudioError) {
        log::log!(
            err.severity().log_level(),
            "Removing player after fault: {}",
            err
        );
        lock(&self.state).players.retain(|p| !same_player(p, player));
    }

    fn service(&self) {
        let players = lock(&self.state).players.clone();

        let mut eligible = Vec::with_capacity(players.len());
        for player in players {
            if !self.is_registered(&player) {
                continue;
            }
            match guarded(|| player.get_write_size()) {
                Ok(size) if size > self.config.min_write_size => eligible.push((player, size)),
                Ok(_) => {}
                Err(e) => self.drop_faulted(&player, e),
            }
        }

        // Most starved first; the sort is stable so ties keep registration order
        eligible.sort_by(|a, b| b.1.cmp(&a.1));

        for (player, size) in eligible {
            if self.is_stopped() {
                break;
            }
            if !self.is_registered(&player) {
                continue;
            }
            trace!("Refilling player with {} bytes", size);
            let timer = OperationTimer::new(format!("refill {} bytes", size));
            match guarded(|| player.refill(size)) {
                Ok(()) => {
                    timer.finish_with_threshold(self.config.slow_refill());
                }
                Err(e) => self.drop_faulted(&player, e),
            }
        }
    }

    fn run(&self) {
        *lock(&self.thread_id) = Some(thread::current().id());
        debug!("Worker thread started");

        while self.wait() {
            let _pass = lock(&self.pass);
            self.service();
        }

        *lock(&self.thread_id) = None;
        debug!("Worker thread exiting");
    }
}

/// Feeds registered players from a dedicated background thread
pub struct Worker {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Serialises start and stop, held across the join
    lifecycle: Mutex<()>,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(WorkerState {
                    players: Vec::new(),
                    stopped: false,
                }),
                wakeup: Condvar::new(),
                pass: Mutex::new(()),
                thread_id: Mutex::new(None),
            }),
            handle: Mutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Start the background thread. Does nothing if it is already running.
    ///
    /// Waits for a `stop()` in progress on another thread to finish first.
    pub fn start(&self) -> Result<(), AudioError> {
        if self.shared.on_worker_thread() {
            return Ok(());
        }
        let _lifecycle = lock(&self.lifecycle);
        let mut handle = lock(&self.handle);
        if handle.is_some() {
            return Ok(());
        }

        lock(&self.shared.state).stopped = false;
        let shared = Arc::clone(&self.shared);
        let thread = thread::Builder::new()
            .name("alstream-worker".to_string())
            .spawn(move || shared.run())
            .map_err(|e| AudioError::Worker(format!("Failed to spawn worker thread: {}", e)))?;

        *handle = Some(thread);
        info!("Worker started");
        Ok(())
    }

    /// Stop the background thread and wait for it to exit
    ///
    /// No refill is issued once this returns, even when another thread
    /// is stopping the worker at the same time. Calling it from a player
    /// callback is an error, since the thread cannot join itself.
    pub fn stop(&self) -> Result<(), AudioError> {
        if self.shared.on_worker_thread() {
            return Err(AudioError::Worker(
                "stop() called from the worker thread".to_string(),
            ));
        }

        let _lifecycle = lock(&self.lifecycle);
        let thread = {
            let mut handle = lock(&self.handle);
            let Some(thread) = handle.take() else {
                return Ok(());
            };
            lock(&self.shared.state).stopped = true;
            thread
        };
        self.shared.wakeup.notify_all();

        thread
            .join()
            .map_err(|_| AudioError::Worker("Worker thread panicked".to_string()))?;
        info!("Worker stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        lock(&self.handle).is_some()
    }

    /// Register a player. Adding one that is already registered does nothing.
    pub fn add(&self, player: Arc<dyn Player>) {
        {
            let mut state = lock(&self.shared.state);
            if state.players.iter().any(|p| same_player(p, &player)) {
                return;
            }
            state.players.push(player);
            debug!("Player added, {} registered", state.players.len());
        }
        self.shared.wakeup.notify_all();
    }

    /// Unregister a player
    ///
    /// Once this returns the worker makes no further calls into the player.
    /// Removing a player that is not registered does nothing. Must not be
    /// called while holding a lock the player's callbacks take.
    pub fn remove(&self, player: &Arc<dyn Player>) {
        let removed = {
            let mut state = lock(&self.shared.state);
            let before = state.players.len();
            state.players.retain(|p| !same_player(p, player));
            before != state.players.len()
        };
        if !removed {
            return;
        }
        debug!("Player removed");
        self.shared.wakeup.notify_all();

        // From a callback the pass in flight is our own; elsewhere wait it out
        if !self.shared.on_worker_thread() {
            drop(lock(&self.shared.pass));
        }
    }

    pub fn contains(&self, player: &Arc<dyn Player>) -> bool {
        self.shared.is_registered(player)
    }

    /// Number of registered players
    pub fn len(&self) -> usize {
        lock(&self.shared.state).players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.shared.on_worker_thread() {
            // The thread cannot join itself; let it exit on its own
            lock(&self.shared.state).stopped = true;
            self.shared.wakeup.notify_all();
            return;
        }
        if let Err(e) = self.stop() {
            error!("Failed to stop worker: {}", e);
        }
    }
}
