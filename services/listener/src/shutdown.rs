//! Cancellation scopes and process signal handling.
//!
//! A [`ShutdownToken`] is a `CancellationToken` that also remembers why it
//! was cancelled. Children are cancelled with their parent and report the
//! parent's cause unless they were cancelled on their own first.

use std::sync::{Arc, OnceLock};

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancellation scope carrying an optional cause.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    token: CancellationToken,
    cause: Arc<OnceLock<String>>,
    /// Cause cells of the ancestors, nearest first.
    ancestors: Vec<Arc<OnceLock<String>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope cancelled together with this one, but cancellable on its own.
    pub fn child(&self) -> Self {
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.push(Arc::clone(&self.cause));
        ancestors.extend(self.ancestors.iter().cloned());

        Self {
            token: self.token.child_token(),
            cause: Arc::new(OnceLock::new()),
            ancestors,
        }
    }

    /// Cancel without recording a cause.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and record `cause`. A scope that is already cancelled keeps its original cause.
    pub fn cancel_with_cause(&self, cause: impl Into<String>) {
        if !self.token.is_cancelled() {
            let _ = self.cause.set(cause.into());
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Why the scope was cancelled, if anyone said.
    pub fn cause(&self) -> Option<String> {
        std::iter::once(&self.cause)
            .chain(self.ancestors.iter())
            .find_map(|cell| cell.get().cloned())
    }
}

/// Keeps the signal watcher alive; dropping it releases the subscription.
#[derive(Debug)]
pub struct SignalGuard {
    handle: JoinHandle<()>,
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Cancel `shutdown` on SIGTERM or SIGINT.
pub fn install_signal_handler(shutdown: ShutdownToken) -> std::io::Result<SignalGuard> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let handle = tokio::spawn(async move {
        let cause = tokio::select! {
            _ = sigterm.recv() => "received SIGTERM",
            _ = sigint.recv() => "received SIGINT",
        };
        info!(cause, "Initiating graceful shutdown");
        shutdown.cancel_with_cause(cause);
    });

    Ok(SignalGuard { handle })
}
