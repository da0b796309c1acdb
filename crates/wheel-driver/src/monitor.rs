//! Connection Monitor - tracks the time of the last successful round-trip
//!
//! The controller never pushes data, so the only liveness signal is a reply
//! to one of our own queries. Timestamps are stored as microseconds relative
//! to a process-wide monotonic anchor so they fit in an `AtomicU64`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global anchor point for monotonic time
static APP_START: OnceLock<Instant> = OnceLock::new();

fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Reply freshness monitor
pub struct ConnectionMonitor {
    last_reply: AtomicU64,
    replies: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// Create a monitor that considers the link stale after `timeout` without a reply
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_reply: AtomicU64::new(monotonic_micros()),
            replies: AtomicU64::new(0),
            timeout,
        }
    }

    /// Record a successful round-trip
    pub fn register_reply(&self) {
        self.last_reply.store(monotonic_micros(), Ordering::Relaxed);
        self.replies.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether a reply arrived within the timeout window
    pub fn is_fresh(&self) -> bool {
        self.time_since_last_reply() < self.timeout
    }

    pub fn time_since_last_reply(&self) -> Duration {
        let last_us = self.last_reply.load(Ordering::Relaxed);
        Duration::from_micros(monotonic_micros().saturating_sub(last_us))
    }

    /// Total successful round-trips
    pub fn reply_count(&self) -> u64 {
        self.replies.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_initially_fresh() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert!(monitor.is_fresh());
        assert_eq!(monitor.reply_count(), 0);
    }

    #[test]
    fn test_goes_stale_without_replies() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(30));
        thread::sleep(Duration::from_millis(60));
        assert!(!monitor.is_fresh());

        monitor.register_reply();
        assert!(monitor.is_fresh());
        assert_eq!(monitor.reply_count(), 1);
    }
}
