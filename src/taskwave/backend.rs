//! Provider-agnostic LLM backend interface.
//!
//! The orchestrator never talks to a concrete LLM vendor. Everything it needs
//! is behind [`AgentBackend`]: hand over a system prompt, a user prompt, an
//! output token cap and a model name, get back text plus token accounting.
//! Implementations wrap whatever provider SDK or local inference stack the
//! application uses and **must** be thread-safe (`Send + Sync`) so a single
//! backend can serve many concurrent tasks.
//!
//! Failures are classified by the backend itself: [`BackendErrorKind::Transient`]
//! errors (rate limits, connection resets) are retried by the task runner
//! with exponential backoff, [`BackendErrorKind::Permanent`] errors are not.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use taskwave::{AgentBackend, BackendError, CancelToken, Completion};
//!
//! struct EchoBackend;
//!
//! #[async_trait]
//! impl AgentBackend for EchoBackend {
//!     async fn complete(
//!         &self,
//!         _system: &str,
//!         user: &str,
//!         _max_tokens: usize,
//!         model: &str,
//!         _cancel: &CancelToken,
//!     ) -> Result<Completion, BackendError> {
//!         Ok(Completion {
//!             text: format!("echo: {}", user),
//!             input_tokens: user.len() / 4,
//!             output_tokens: user.len() / 4,
//!             stop_reason: format!("end_turn ({})", model),
//!         })
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// A completed backend call: the generated text plus accounting metadata.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The generated text, forwarded opaquely to downstream tasks.
    pub text: String,
    /// Prompt tokens billed by the provider.
    pub input_tokens: usize,
    /// Generated tokens billed by the provider.
    pub output_tokens: usize,
    /// Provider-specific completion status (e.g. `"end_turn"`, `"max_tokens"`).
    pub stop_reason: String,
}

impl Completion {
    /// Input plus output tokens, the figure recorded on the task result.
    pub fn total_tokens(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// Whether a backend failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Retryable: rate limit, connection reset, upstream overload.
    Transient,
    /// Not retryable: invalid request, auth failure, model refusal.
    Permanent,
}

/// A failed backend call, classified by the backend itself.
#[derive(Debug, Clone)]
pub struct BackendError {
    /// Retry classification.
    pub kind: BackendErrorKind,
    /// Human-readable failure description, surfaced on `task_error` events.
    pub message: String,
}

impl BackendError {
    /// Build a retryable error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Transient,
            message: message.into(),
        }
    }

    /// Build a non-retryable error.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// True when the task runner may retry this failure.
    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Transient
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for BackendError {}

/// Trait-driven abstraction over a concrete LLM provider.
///
/// The orchestrator owns prompt assembly and retry policy; implementations
/// translate one call into the provider wire format and report token usage.
/// The `cancel` token is the run's cancellation flag. Implementations that
/// can abort an in-flight request should watch it (for example with
/// `tokio::select!` against [`CancelToken::cancelled`]); implementations that
/// cannot are still safe, because the task runner races every call against
/// the same token.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Run one completion and return the generated text with token counts.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: usize,
        model: &str,
        cancel: &CancelToken,
    ) -> Result<Completion, BackendError>;
}

/// Cloneable cooperative cancellation flag for one workflow run.
///
/// Set once via [`cancel`](CancelToken::cancel) (idempotent), observed either
/// synchronously via [`is_cancelled`](CancelToken::is_cancelled) or as an
/// awaitable edge via [`cancelled`](CancelToken::cancelled). Every suspension
/// point in the scheduler and task runner races against it.
///
/// # Example
///
/// ```rust
/// use taskwave::CancelToken;
///
/// let token = CancelToken::new();
/// let watcher = token.clone();
/// assert!(!watcher.is_cancelled());
/// token.cancel();
/// token.cancel(); // idempotent
/// assert!(watcher.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Flip the flag and wake every waiter. Safe to call repeatedly.
    pub fn cancel(&self) {
        // send_replace never fails: the Arc'd sender keeps the channel open.
        self.tx.send_replace(true);
    }

    /// Synchronous check of the flag.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the token is cancelled; resolves immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // The sender cannot drop while `self` exists, so we only get here
        // if the token outlived every producer without a cancel.
        std::future::pending::<()>().await;
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
