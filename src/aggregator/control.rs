//! Cancellation and deadline control threaded through collaborator calls.

use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag shared between a caller and a run.
///
/// A child token observes its parent's cancellation, but cancelling the child leaves
/// the parent untouched. [`CancellationToken::cancelled`] resolves as soon as the
/// token or any ancestor is cancelled, so in-flight calls can be abandoned.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<CancelState>,
    ancestors: Vec<Arc<CancelState>>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation, waking every task waiting on this token or its children.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Whether this token or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.states()
            .any(|state| state.cancelled.load(Ordering::SeqCst))
    }

    /// Wait until this token or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let mut waiters: Vec<Pin<Box<Notified<'_>>>> = self
                .states()
                .map(|state| Box::pin(state.notify.notified()))
                .collect();
            for waiter in &mut waiters {
                waiter.as_mut().enable();
            }
            // Checked after registering so a concurrent cancel cannot be missed.
            if self.is_cancelled() {
                return;
            }
            poll_fn(|cx| {
                if waiters
                    .iter_mut()
                    .any(|waiter| waiter.as_mut().poll(cx).is_ready())
                {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            })
            .await;
        }
    }

    /// Derive a token that is cancelled whenever `self` is.
    pub fn child_token(&self) -> Self {
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.push(Arc::clone(&self.state));
        ancestors.extend(self.ancestors.iter().cloned());
        Self {
            state: Arc::default(),
            ancestors,
        }
    }

    fn states(&self) -> impl Iterator<Item = &Arc<CancelState>> {
        std::iter::once(&self.state).chain(self.ancestors.iter())
    }
}

/// Reason a guarded call did not run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interruption {
    /// The run was cancelled before or during the call.
    #[error("cancelled")]
    Cancelled,
    /// The run deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline for one aggregation run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunControl {
    /// No deadline, fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `token` for cancellation.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Abort collaborator calls still running at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancellation token of this run.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline of this run, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Same deadline, child cancellation token.
    pub(crate) fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Run `call` unless the run is cancelled, bounding it by the deadline.
    ///
    /// Cancellation while `call` is pending drops it and returns
    /// [`Interruption::Cancelled`].
    pub(crate) async fn guard<F, T>(&self, call: F) -> Result<T, Interruption>
    where
        F: Future<Output = T>,
    {
        if self.token.is_cancelled() {
            return Err(Interruption::Cancelled);
        }
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, call)
                    .await
                    .map_err(|_| Interruption::DeadlineExceeded),
                None => Ok(call.await),
            }
        };
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Interruption::Cancelled),
            outcome = bounded => outcome,
        }
    }
}
