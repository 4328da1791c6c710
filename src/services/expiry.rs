//! Per-transaction expiry timers.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::tasks::TaskSupervisor;

/// Arms one timer per pending transaction. Timers live only in memory and are
/// abandoned on shutdown.
#[derive(Clone)]
pub struct ExpiryScheduler {
    supervisor: TaskSupervisor,
    armed: Arc<AtomicUsize>,
}

struct ArmedGuard(Arc<AtomicUsize>);

impl Drop for ArmedGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ExpiryScheduler {
    pub fn new(supervisor: TaskSupervisor) -> Self {
        Self {
            supervisor,
            armed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of timers that have not fired yet.
    pub fn armed(&self) -> usize {
        self.armed.load(Ordering::Relaxed)
    }

    /// Runs `on_fire` once `expires_at` has passed. A deadline already in the
    /// past fires immediately.
    pub fn schedule<F>(&self, order_id: &str, expires_at: DateTime<Utc>, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = delay_until(expires_at, Utc::now());
        self.armed.fetch_add(1, Ordering::Relaxed);
        let guard = ArmedGuard(self.armed.clone());

        tracing::debug!(order_id, delay_secs = delay.as_secs(), "expiry timer armed");
        let started = self.supervisor.spawn("expiry-timer", async move {
            let _guard = guard;
            tokio::time::sleep(delay).await;
            on_fire.await;
        });
        if !started {
            tracing::warn!(order_id, "expiry timer not armed, shutting down");
        }
    }
}

pub fn delay_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}
