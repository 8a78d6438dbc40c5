//! Cooperative shutdown.
//!
//! A single [`Shutdown`] handle is created in the CLI layer's `main` and
//! cloned into the worker loop. The first SIGINT/SIGTERM requests a graceful
//! drain (the in-flight job, if any, is allowed to finish); a second signal
//! escalates to [`Signal::Halt`] so the caller can force-kill the running
//! child process tree. This mirrors the sibling MTA's controller shutdown
//! handling almost exactly, down to the double-signal race.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop taking new work; let anything in flight finish.
    Shutdown,
    /// A second signal arrived before the first was honoured — force-kill.
    Halt,
}

/// A cloneable shutdown flag with a broadcast channel for wakeups.
#[derive(Clone)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    sender: broadcast::Sender<Signal>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(16);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Whether shutdown has been requested. Checked by the worker loop before
    /// each poll and before dispatching each job.
    #[must_use]
    pub fn requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }

    /// Requests a graceful drain. Idempotent: the broadcast only fires once.
    pub fn request(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            let _ = self.sender.send(Signal::Shutdown);
        }
    }

    /// Escalates to an immediate halt, e.g. after a second OS signal.
    pub fn halt(&self) {
        self.flag.store(true, Ordering::Release);
        let _ = self.sender.send(Signal::Halt);
    }

    /// Installs SIGINT/SIGTERM handlers and drives the two-stage shutdown
    /// described above. Runs until the process receives a second signal.
    ///
    /// # Errors
    /// Returns an error only if the OS signal handlers fail to install.
    pub async fn listen_for_os_signals(self) -> std::io::Result<()> {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, draining -- press again to force shutdown");
            }
            _ = terminate.recv() => {
                tracing::info!("received SIGTERM, draining");
            }
        }
        self.request();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received second signal, forcing shutdown");
                self.halt();
            }
            _ = terminate.recv() => {
                tracing::warn!("received second signal, forcing shutdown");
                self.halt();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_idempotent_and_visible_immediately() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.requested());
        shutdown.request();
        assert!(shutdown.requested());
        shutdown.request();
        assert!(shutdown.requested());
    }

    #[tokio::test]
    async fn subscribers_observe_the_broadcast_signal() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        shutdown.request();
        assert_eq!(rx.recv().await.unwrap(), Signal::Shutdown);
    }

    #[tokio::test]
    async fn halt_is_observable_after_request() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        shutdown.request();
        assert_eq!(rx.recv().await.unwrap(), Signal::Shutdown);
        shutdown.halt();
        assert_eq!(rx.recv().await.unwrap(), Signal::Halt);
    }
}
