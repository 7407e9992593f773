//! Shutdown coordination (spec §4.8).
//!
//! Grounded in `main_backup.rs`'s `tokio::signal::unix` wiring, generalized
//! into a shared flag every long-running loop polls cooperatively rather
//! than a one-shot `break` inside `main` itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use crate::error::StartupError;

/// Shared flag consulted by the listener loop, every connection's
/// keep-alive wait, and the GC worker.
#[derive(Clone)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a task that sets `shutdown` once SIGINT or SIGTERM arrives.
pub fn install_signal_handlers(shutdown: Shutdown) -> Result<(), StartupError> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(StartupError::Signal)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(StartupError::Signal)?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
        }
        shutdown.request();
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unrequested_and_is_shareable() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());
        let clone = shutdown.clone();
        shutdown.request();
        assert!(clone.is_requested());
    }
}
