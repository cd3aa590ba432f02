//! Sleeper trait for deterministic retry timing in tests.
//!
//! The reconnect loop waits through a `Sleeper` so tests can swap the real
//! tokio timer for [`MockSleeper`], which records each requested pause and
//! returns immediately.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use telterm_common::mutex_lock_or_recover;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealSleeper;

#[async_trait]
impl Sleeper for RealSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records sleep calls without waiting.
#[derive(Debug, Default)]
pub struct MockSleeper {
    call_count: AtomicU64,
    durations: Mutex<Vec<Duration>>,
}

impl MockSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn durations(&self) -> Vec<Duration> {
        mutex_lock_or_recover(&self.durations).clone()
    }
}

#[async_trait]
impl Sleeper for MockSleeper {
    async fn sleep(&self, duration: Duration) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        mutex_lock_or_recover(&self.durations).push(duration);
        tokio::task::yield_now().await;
    }
}

/// Sleeps forever: lets tests cancel a link while it waits between attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingSleeper;

#[async_trait]
impl Sleeper for PendingSleeper {
    async fn sleep(&self, _duration: Duration) {
        std::future::pending::<()>().await;
    }
}
