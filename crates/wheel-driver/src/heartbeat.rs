//! Heartbeat - background position poller
//!
//! The controller never pushes state, so a background thread periodically
//! queries the position and publishes it into the [`DeviceState`](crate::DeviceState)
//! snapshot.
//!
//! - Normal cadence: every 2 s
//! - Fast cadence (jogging / sweeping): every 300 ms
//! - Paused while a closed-loop run owns the wire, via [`HeartbeatPause`]
//!
//! The thread never reconnects on its own: when the session is down it
//! skips the beat and waits for an explicit reconnect.

use crate::Driver;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Heartbeat configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Poll interval while idle or closed-loop
    pub interval: Duration,
    /// Poll interval while jogging or sweeping
    pub fast_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            fast_interval: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    fast: AtomicBool,
    pauses: AtomicUsize,
    beats: AtomicU64,
    failures: AtomicU64,
}

/// Background heartbeat thread handle
///
/// Dropping the handle stops the thread and joins it.
pub struct Heartbeat {
    handle: Option<thread::JoinHandle<()>>,
    shutdown_tx: Option<Sender<()>>,
    shared: Arc<Shared>,
}

impl Heartbeat {
    /// Spawn the heartbeat thread
    pub fn start(driver: Arc<Driver>, config: HeartbeatConfig) -> Self {
        let shared = Arc::new(Shared::default());
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("wheel-heartbeat".to_string())
            .spawn(move || heartbeat_loop(driver, config, thread_shared, shutdown_rx))
            .map_err(|e| warn!("Failed to spawn heartbeat thread: {}", e))
            .ok();

        Self {
            handle,
            shutdown_tx: Some(shutdown_tx),
            shared,
        }
    }

    /// Switch between normal and fast cadence
    pub fn set_fast(&self, fast: bool) {
        self.shared.fast.store(fast, Ordering::Relaxed);
    }

    pub fn is_fast(&self) -> bool {
        self.shared.fast.load(Ordering::Relaxed)
    }

    /// Suspend polling until the returned guard is dropped
    ///
    /// Guards nest: polling resumes when the last one is released.
    pub fn pause(&self) -> HeartbeatPause {
        self.shared.pauses.fetch_add(1, Ordering::AcqRel);
        HeartbeatPause {
            shared: self.shared.clone(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.pauses.load(Ordering::Acquire) > 0
    }

    /// Number of successful beats so far
    pub fn beats(&self) -> u64 {
        self.shared.beats.load(Ordering::Relaxed)
    }

    /// Number of failed beats so far
    pub fn failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the sleeper
        self.shutdown_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

/// RAII guard returned by [`Heartbeat::pause`]
#[must_use = "the heartbeat resumes as soon as the guard is dropped"]
pub struct HeartbeatPause {
    shared: Arc<Shared>,
}

impl Drop for HeartbeatPause {
    fn drop(&mut self) {
        self.shared.pauses.fetch_sub(1, Ordering::AcqRel);
    }
}

fn heartbeat_loop(
    driver: Arc<Driver>,
    config: HeartbeatConfig,
    shared: Arc<Shared>,
    shutdown_rx: Receiver<()>,
) {
    debug!("Heartbeat thread started");
    loop {
        let interval = if shared.fast.load(Ordering::Relaxed) {
            config.fast_interval
        } else {
            config.interval
        };

        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {},
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        if shared.pauses.load(Ordering::Acquire) > 0 || !driver.is_connected() {
            continue;
        }

        match driver.refresh_position() {
            Ok(position) => {
                shared.beats.fetch_add(1, Ordering::Relaxed);
                trace!("Heartbeat position {}", position);
            },
            Err(e) => {
                shared.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Heartbeat failed: {}", e);
            },
        }
    }
    debug!("Heartbeat thread stopped");
}
