//! Cancellation scopes with optional deadlines.
//!
//! A [`CancelScope`] pairs a [`CancellationToken`] with an optional
//! deadline. Scopes can be derived into bounded children that end at the
//! earlier of the parent's deadline and a local ceiling.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    /// The scope's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// The scope's token was cancelled.
    #[error("cancelled")]
    Cancelled,
}

/// A cancellation token that may carry a deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// A scope with no deadline that only ends through [`cancel`](Self::cancel).
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an externally owned token. Cancelling it ends the scope.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A scope that ends `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// A scope that ends at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The reason the scope ended, or `None` while it is still live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Derive a child scope bounded by `timeout`.
    ///
    /// The child ends at the earlier of the parent's deadline and
    /// `now + timeout`. Cancelling the parent cancels the child; cancelling
    /// the child leaves the parent untouched.
    pub fn child_with_timeout(&self, timeout: Duration) -> CancelScope {
        let local = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, local) {
            (Some(parent), Some(local)) => Some(parent.min(local)),
            (parent, local) => parent.or(local),
        };

        CancelScope {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Wait until the scope ends.
    ///
    /// Cancellation wins when both the token and the deadline have fired.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => CancelReason::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scope_has_no_deadline() {
        let scope = CancelScope::new();
        assert!(scope.deadline().is_none());
        assert!(scope.remaining().is_none());
        assert!(scope.err().is_none());
    }

    #[test]
    fn test_cancel_sets_reason() {
        let scope = CancelScope::new();
        scope.cancel();
        assert!(scope.is_cancelled());
        assert_eq!(scope.err(), Some(CancelReason::Cancelled));
    }

    #[tokio::test]
    async fn test_child_takes_earlier_deadline() {
        let parent = CancelScope::with_timeout(Duration::from_millis(50));
        let child = parent.child_with_timeout(Duration::from_secs(300));
        assert_eq!(child.deadline(), parent.deadline());

        let parent = CancelScope::with_timeout(Duration::from_secs(300));
        let child = parent.child_with_timeout(Duration::from_millis(50));
        assert!(child.deadline().unwrap() < parent.deadline().unwrap());
    }

    #[tokio::test]
    async fn test_child_of_unbounded_parent_gets_local_deadline() {
        let parent = CancelScope::new();
        let child = parent.child_with_timeout(Duration::from_secs(1));
        let remaining = child.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(1));
        assert!(remaining > Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_parent_cancel_propagates_to_child() {
        let parent = CancelScope::new();
        let child = parent.child_with_timeout(Duration::from_secs(300));
        parent.cancel();
        assert_eq!(child.done().await, CancelReason::Cancelled);
    }

    #[tokio::test]
    async fn test_child_cancel_leaves_parent_live() {
        let parent = CancelScope::new();
        let child = parent.child_with_timeout(Duration::from_secs(300));
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_done_reports_deadline() {
        let scope = CancelScope::with_timeout(Duration::from_millis(20));
        assert_eq!(scope.done().await, CancelReason::DeadlineExceeded);
        assert_eq!(scope.err(), Some(CancelReason::DeadlineExceeded));
        assert_eq!(scope.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_external_token_ends_scope() {
        let token = CancellationToken::new();
        let scope = CancelScope::from_token(token.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        assert_eq!(scope.done().await, CancelReason::Cancelled);
    }

    #[test]
    fn test_reason_messages() {
        assert_eq!(CancelReason::DeadlineExceeded.to_string(), "deadline exceeded");
        assert_eq!(CancelReason::Cancelled.to_string(), "cancelled");
    }
}
