//! Shared deadline context observed by every pipeline stage.
//!
//! A [`ShutdownContext`] wraps a [`CancellationToken`] with an optional absolute
//! deadline. When the deadline passes, or [`ShutdownContext::cancel`] is called,
//! the token fires and stays fired. The first trigger wins and is remembered as
//! the [`ShutdownReason`].

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Why a [`ShutdownContext`] fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The absolute deadline passed
    DeadlineReached,
    /// Someone called [`ShutdownContext::cancel`] (e.g. a termination signal)
    Cancelled,
}

/// OS signal that stops a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT or Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        })
    }
}

struct Inner {
    token: CancellationToken,
    deadline: Option<Instant>,
    reason: Arc<OnceLock<ShutdownReason>>,
    timer: Option<AbortHandle>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Cancellation signal with an absolute expiry, cheap to clone and share between stages
#[derive(Clone)]
pub struct ShutdownContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ShutdownContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownContext")
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl ShutdownContext {
    /// Create a context that fires `timeout` from now
    ///
    /// Must be called from within a Tokio runtime: a timer task is spawned that
    /// cancels the token when the deadline passes.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Create a context that fires at `deadline`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_deadline(deadline: Instant) -> Self {
        let token = CancellationToken::new();
        let reason = Arc::new(OnceLock::new());

        let timer = {
            let token = token.clone();
            let reason = Arc::clone(&reason);
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        if reason.set(ShutdownReason::DeadlineReached).is_ok() {
                            tracing::info!("Shutdown deadline reached, cancelling all stages");
                        }
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
            .abort_handle()
        };

        Self {
            inner: Arc::new(Inner {
                token,
                deadline: Some(deadline),
                reason,
                timer: Some(timer),
            }),
        }
    }

    /// Create a context that only fires on explicit [`cancel`](Self::cancel)
    pub fn without_deadline() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: CancellationToken::new(),
                deadline: None,
                reason: Arc::new(OnceLock::new()),
                timer: None,
            }),
        }
    }

    /// Fire the context. Has no effect on the reason if it already fired.
    pub fn cancel(&self) {
        if self.inner.reason.set(ShutdownReason::Cancelled).is_ok() {
            tracing::info!("Shutdown requested, cancelling all stages");
        }
        self.inner.token.cancel();
    }

    /// Returns true once the context has fired
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Future that resolves when the context fires
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }

    /// Why the context fired, or `None` while it is still live
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.inner.reason.get().copied()
    }

    /// The absolute deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left until the deadline (zero once passed, `None` without a deadline)
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// A clone of the underlying token, for APIs that take one directly
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Spawn a task that cancels this context on SIGTERM/SIGINT (Ctrl+C elsewhere)
    ///
    /// The task exits on its own once the context fires for any other reason.
    pub fn cancel_on_signal(&self) -> tokio::task::JoinHandle<()> {
        let ctx = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                signal = wait_for_signal() => {
                    tracing::warn!(%signal, "Received termination signal");
                    ctx.cancel();
                }
                _ = ctx.cancelled() => {}
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownSignal {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in sandboxes; fall back to whichever stream is available
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut terminate), Ok(mut interrupt)) => tokio::select! {
            _ = terminate.recv() => ShutdownSignal::Terminate,
            _ = interrupt.recv() => ShutdownSignal::Interrupt,
        },
        (Ok(mut terminate), Err(e)) => {
            tracing::warn!(error = %e, "SIGINT handler unavailable, only SIGTERM stops the run");
            terminate.recv().await;
            ShutdownSignal::Terminate
        }
        (Err(e), Ok(mut interrupt)) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, only SIGINT stops the run");
            interrupt.recv().await;
            ShutdownSignal::Interrupt
        }
        (Err(e), Err(_)) => {
            tracing::warn!(error = %e, "No unix signal handlers available, listening for Ctrl+C");
            wait_for_ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownSignal {
    wait_for_ctrl_c().await
}

/// Resolves on Ctrl+C, or never if the listener cannot be installed
async fn wait_for_ctrl_c() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C, signals will not stop the run");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}
