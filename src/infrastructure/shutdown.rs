//! Graceful Shutdown Handler
//!
//! One controller is shared by the HTTP server and `main`. The server stops
//! accepting on [`ShutdownController::wait`]; `main` then runs the remaining
//! cleanup (closing the auth backend socket) under [`ShutdownController::drain`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Process-wide stop flag with async notification.
#[derive(Clone)]
pub struct ShutdownController {
    initiated: Arc<AtomicBool>,
    notify_tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (notify_tx, _) = broadcast::channel(1);
        Self {
            initiated: Arc::new(AtomicBool::new(false)),
            notify_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify_tx.subscribe()
    }

    /// Flip the flag and wake every waiter. Later calls are no-ops.
    pub fn shutdown(&self) {
        if !self.initiated.swap(true, Ordering::SeqCst) {
            tracing::info!("initiating graceful shutdown");
            let _ = self.notify_tx.send(());
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been initiated, including when it already was.
    pub async fn wait(&self) {
        // Subscribe before checking the flag so a concurrent shutdown is not missed
        let mut rx = self.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Run a cleanup step with an upper bound. Returns false on timeout.
    pub async fn drain<F>(&self, timeout: Duration, cleanup: F) -> bool
    where
        F: Future<Output = ()>,
    {
        match tokio::time::timeout(timeout, cleanup).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!("shutdown cleanup did not finish within {:?}", timeout);
                false
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for Ctrl+C, SIGTERM or a programmatic shutdown, then mark the
/// controller as shut down.
///
/// A signal source that cannot be installed is logged and ignored.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, stopping gateway");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, stopping gateway");
        }
        _ = controller.wait() => {}
    }

    controller.shutdown();
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    // ===== Flag Tests =====

    #[test]
    fn test_starts_running() {
        assert!(!ShutdownController::new().is_shutdown());
        assert!(!ShutdownController::default().is_shutdown());
    }

    #[tokio::test]
    async fn test_shutdown_notifies_subscribers_once() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();

        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutdown());

        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let controller = ShutdownController::new();
        controller.clone().shutdown();
        assert!(controller.is_shutdown());
    }

    // ===== Wait Tests =====

    #[tokio::test]
    async fn test_wait_after_shutdown_returns_immediately() {
        let controller = ShutdownController::new();
        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), controller.wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_pending_until_shutdown() {
        let controller = ShutdownController::new();
        let mut waiter = tokio_test::task::spawn(controller.wait());
        tokio_test::assert_pending!(waiter.poll());

        controller.shutdown();
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn test_many_waiters_released() {
        let controller = ShutdownController::new();
        let released = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let controller = controller.clone();
                let released = released.clone();
                tokio::spawn(async move {
                    controller.wait().await;
                    released.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(released.load(Ordering::SeqCst), 0);

        controller.shutdown();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_signal_future_completes_on_manual_shutdown() {
        let controller = ShutdownController::new();
        let handle = tokio::spawn(shutdown_signal(controller.clone()));

        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(500), handle).await;
        assert!(result.is_ok());
    }

    // ===== Drain Tests =====

    #[tokio::test]
    async fn test_drain_runs_cleanup() {
        let controller = ShutdownController::new();
        let ran = AtomicUsize::new(0);

        let finished = controller
            .drain(Duration::from_secs(1), async {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert!(finished);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_on_stuck_cleanup() {
        let controller = ShutdownController::new();

        let finished = controller
            .drain(Duration::from_secs(5), std::future::pending::<()>())
            .await;

        assert!(!finished);
    }
}
