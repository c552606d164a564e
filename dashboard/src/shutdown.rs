//! Stop signal for a running dashboard.
//!
//! The controller hands one receiver to each chain-value source it spawns
//! and keeps one for its own select loop; the daemon hands another to the
//! HTTP server. Once the loop sees the signal it aborts in-flight receipt
//! waits, so a single `shutdown` call winds the whole dashboard down.

use tokio::signal;
use tokio::sync::broadcast;

/// Cloneable stop signal shared by the sources, the controller loop and
/// the HTTP server.
#[derive(Clone)]
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for one dashboard task. Subscribe before the task starts:
    /// a receiver created after the signal never sees it.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscribed task to stop.
    pub fn shutdown(&self) {
        let tasks = self.tx.receiver_count();
        if self.tx.send(()).is_ok() {
            tracing::debug!(tasks, "stopping dashboard tasks");
        }
    }

    /// Block until the operator interrupts the daemon (Ctrl-C or SIGTERM),
    /// then stop the dashboard.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable, only Ctrl-C stops the dashboard");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("interrupted, stopping dashboard"),
            _ = terminate => tracing::info!("terminated, stopping dashboard"),
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn polling_loops_exit_on_signal() {
        let controller = ShutdownController::new();
        let loops: Vec<_> = (0..3)
            .map(|_| {
                let mut stop = controller.subscribe();
                tokio::spawn(async move {
                    let mut polls = 0u32;
                    loop {
                        tokio::select! {
                            _ = stop.recv() => return polls,
                            _ = tokio::time::sleep(Duration::from_millis(100)) => polls += 1,
                        }
                    }
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(350)).await;
        controller.clone().shutdown();
        for task in loops {
            let polls = tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .expect("loop kept polling after shutdown")
                .unwrap();
            assert!(polls >= 3);
        }
    }

    #[tokio::test]
    async fn late_subscriber_misses_the_signal() {
        let controller = ShutdownController::new();
        controller.shutdown();
        let mut rx = controller.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
