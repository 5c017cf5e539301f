//! Cooperative worker shutdown
//!
//! A process runs exactly one stage worker, so shutdown is a single shared
//! signal connecting the OS signal listener to the worker loop. Delivery is
//! cooperative: the loop only checks between tasks, which means a stopping
//! worker never half-acks. An in-flight message either finishes (persist,
//! produce, ack) or stays un-acked and returns to the pending-entry list
//! for the next consumer of the group.

use std::sync::Arc;

use tokio::sync::watch;

/// Why the worker was asked to stop. The first request wins; later
/// requests are ignored so the logged reason matches what actually
/// initiated the stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C at an interactive terminal
    Interrupt,
    /// SIGTERM from a supervisor (systemd, k8s)
    Terminate,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Interrupt => "interrupt",
            ShutdownReason::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared stop signal for one worker process
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
    rx: watch::Receiver<Option<ShutdownReason>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Ask the worker loop to stop after the task it is currently on.
    pub fn request(&self, reason: ShutdownReason) {
        let recorded = self.tx.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(reason);
                true
            } else {
                false
            }
        });
        if recorded {
            tracing::info!(reason = %reason, "shutdown requested");
        } else {
            tracing::debug!(reason = %reason, "shutdown already in progress, request ignored");
        }
    }

    /// Whether a stop has been requested
    pub fn requested(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The recorded stop reason, if any
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.rx.borrow()
    }

    /// Receiver for the worker loop to select on between tasks
    pub fn watch(&self) -> watch::Receiver<Option<ShutdownReason>> {
        self.rx.clone()
    }

    /// Spawn the OS signal listener that feeds this signal.
    pub fn listen_for_signals(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            let reason = wait_for_os_signal().await;
            signal.request(reason);
        });
    }
}

/// Block until the process receives a stop signal from the OS and map it
/// onto a [`ShutdownReason`].
async fn wait_for_os_signal() -> ShutdownReason {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Ctrl+C handler installation failed");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation failed")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => ShutdownReason::Interrupt,
        _ = terminate => ShutdownReason::Terminate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_without_request() {
        let signal = ShutdownSignal::new();
        assert!(!signal.requested());
        assert_eq!(signal.reason(), None);
    }

    #[tokio::test]
    async fn test_first_reason_wins() {
        let signal = ShutdownSignal::new();
        signal.request(ShutdownReason::Terminate);
        signal.request(ShutdownReason::Interrupt);

        assert_eq!(signal.reason(), Some(ShutdownReason::Terminate));
    }

    #[tokio::test]
    async fn test_clones_share_one_signal() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();

        signal.request(ShutdownReason::Interrupt);
        assert!(observer.requested());
        assert_eq!(observer.reason(), Some(ShutdownReason::Interrupt));
    }

    #[tokio::test]
    async fn test_watcher_wakes_on_request() {
        let signal = ShutdownSignal::new();
        let mut rx = signal.watch();

        let waiter = tokio::spawn(async move {
            rx.wait_for(|state| state.is_some()).await.map(|state| *state)
        });
        tokio::task::yield_now().await;
        signal.request(ShutdownReason::Terminate);

        let observed = tokio::time::timeout(std::time::Duration::from_millis(100), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(observed, Some(ShutdownReason::Terminate));
    }
}
