//! Drain trigger shared between a serve loop and whoever stops it.

use tokio::sync::watch;

/// One-shot shutdown signal.
///
/// Backed by a watch channel so a trigger that fires before anyone waits is
/// still observed by later waiters.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new, untriggered signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Trigger the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Resolve once the signal has fired.
    pub fn triggered(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // The sender lives in `self`; an Err here means every clone was dropped,
            // which can only happen once nobody can trigger any more.
            let _ = rx.wait_for(|fired| *fired).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
