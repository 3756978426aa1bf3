//! Background lease extension
//!
//! Extends a held lease every third of its TTL until stopped. The first
//! failed extension ends the task and marks the lease lost; callers watch
//! for that and abort their critical section.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::handle::LeaseHandle;

/// Keeps one lease alive from a spawned task
pub struct LeaseKeepAlive {
    lost_rx: watch::Receiver<bool>,
    stop_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl LeaseKeepAlive {
    /// Start extending `handle` by `ttl` seconds (manager default when
    /// unset). Must be called inside a tokio runtime.
    pub fn start(handle: LeaseHandle, ttl: Option<u64>) -> Self {
        let ttl_secs = ttl.unwrap_or(handle.manager().config().lock_default_ttl_secs);
        let period = Duration::from_secs((ttl_secs / 3).max(1));

        let (lost_tx, lost_rx) = watch::channel(false);
        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately and the lease is fresh
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match handle.extend(ttl).await {
                            Ok(()) => debug!(lease = %handle, "Keep-alive extended lease"),
                            Err(e) => {
                                warn!(lease = %handle, error = %e, "Keep-alive lost lease");
                                let _ = lost_tx.send(true);
                                break;
                            }
                        }
                    }
                    _ = stop_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            lost_rx,
            stop_tx,
            task: Some(task),
        }
    }

    /// Whether an extension has failed
    pub fn is_lost(&self) -> bool {
        *self.lost_rx.borrow()
    }

    /// Resolves once an extension fails. Pending forever if the task is
    /// stopped while the lease is still held.
    pub async fn lost(&mut self) {
        if self.lost_rx.wait_for(|lost| *lost).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Stop extending and wait for the task to finish
    pub async fn stop(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LeaseKeepAlive {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
