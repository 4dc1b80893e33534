//! Graceful shutdown coordination.
//!
//! A [`ShutdownSignal`] is cloned into every long-lived task (queue
//! producer, ingest worker, heartbeats). When SIGINT or SIGTERM arrives,
//! `main` runs the ordered teardown; a watchdog forces exit if any step
//! hangs past [`FORCE_EXIT_AFTER`].

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

/// How long teardown may take before the watchdog forces `exit(1)`.
pub const FORCE_EXIT_AFTER: Duration = Duration::from_secs(10);

/// A signal for coordinating graceful shutdown across components.
///
/// Backed by a `tokio::broadcast` channel so every clone observes the
/// trigger exactly once.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates a new, untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Blocks until SIGINT or SIGTERM is received, then notifies all
    /// subscribers. Re-entry is harmless: later signals find the channel
    /// already drained.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to install SIGINT handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("received SIGINT, shutting down"),
            () = terminate => info!("received SIGTERM, shutting down"),
        }

        let _ = self.sender.send(());
    }

    /// Subscribes to shutdown notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Triggers shutdown programmatically (tests, fatal errors).
    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the force-exit watchdog. If the process is still alive after
/// [`FORCE_EXIT_AFTER`], exits with code 1.
pub fn spawn_watchdog() {
    tokio::spawn(async {
        tokio::time::sleep(FORCE_EXIT_AFTER).await;
        tracing::error!(
            timeout_secs = FORCE_EXIT_AFTER.as_secs(),
            "shutdown watchdog fired, forcing exit"
        );
        std::process::exit(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_all_subscribers() {
        let signal = ShutdownSignal::new();
        let mut rx1 = signal.subscribe();
        let mut rx2 = signal.clone().subscribe();

        signal.trigger();

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn subscribe_after_trigger_misses_nothing_new() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        // A receiver created afterwards only sees future triggers.
        let mut late = signal.subscribe();
        assert!(late.try_recv().is_err());
    }
}
