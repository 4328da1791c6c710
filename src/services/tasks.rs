//! Supervised background tasks: expiry timers and webhook retry sequences.

use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

/// Owns every background task the engine starts. Each task races its body
/// against the shutdown signal and holds a completion token; `shutdown`
/// flips the signal and waits until all tokens are gone.
#[derive(Clone)]
pub struct TaskSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    shutdown_tx: watch::Sender<bool>,
    done_tx: StdMutex<Option<mpsc::Sender<()>>>,
    done_rx: Mutex<mpsc::Receiver<()>>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (done_tx, done_rx) = mpsc::channel(1);
        Self {
            inner: Arc::new(Inner {
                shutdown_tx,
                done_tx: StdMutex::new(Some(done_tx)),
                done_rx: Mutex::new(done_rx),
            }),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Runs `task` in the background until it completes or shutdown begins.
    /// Returns false when the supervisor is already shutting down.
    pub fn spawn<F>(&self, name: &'static str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = {
            let guard = self
                .inner
                .done_tx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => {
                    tracing::debug!(task = name, "supervisor shutting down, task not started");
                    return false;
                }
            }
        };
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let _token = token;
            tokio::select! {
                _ = task => {}
                _ = async { shutdown_rx.wait_for(|stopping| *stopping).await.is_ok() } => {
                    tracing::debug!(task = name, "background task cancelled");
                }
            }
        });
        true
    }

    /// Signals every task to stop and waits up to `grace` for them to exit.
    /// Returns true when all tasks finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.inner.shutdown_tx.send_replace(true);
        self.inner
            .done_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let mut done_rx = self.inner.done_rx.lock().await;
        match tokio::time::timeout(grace, done_rx.recv()).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(grace_secs = grace.as_secs(), "background tasks still running after grace period");
                false
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
