//! Cooperative cancellation.
//!
//! The token is a shared flag that flips exactly once. The beat scheduler
//! reads it at the top of every beat; the signal listener thread sets it when
//! the process is asked to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};

/// Process-wide shutdown flag.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Returns `true` only for the call that flipped it.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Spawn a thread that cancels `token` on SIGINT or SIGTERM (Ctrl-C elsewhere).
///
/// The thread runs its own current-thread Tokio runtime, so no runtime is
/// needed on the caller's side. Handlers are installed before this returns.
pub fn spawn_signal_listener(token: CancellationToken) -> Result<JoinHandle<()>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("creating Tokio runtime for signal handling")?;

    let signals = rt
        .block_on(async { ShutdownSignals::install() })
        .context("installing shutdown signal handlers")?;

    let handle = std::thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            rt.block_on(async move {
                let name = signals.recv().await;
                tracing::info!("[Signals] Received {}, stopping after the current beat", name);
                token.cancel();
            });
        })
        .context("spawning signal listener thread")?;

    Ok(handle)
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl-C",
            Err(err) => {
                tracing::warn!("[Signals] Ctrl-C handler failed: {}", err);
                std::future::pending().await
            }
        }
    }
}
