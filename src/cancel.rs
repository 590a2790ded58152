//! Request-scoped cancellation.
//!
//! A [`RequestContext`] is cancelled either explicitly or once its deadline
//! passes. Loops race their waits against [`RequestContext::done`] with
//! `tokio::select!` so a cancellation is seen without waiting out a sleep.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `cancel` was called on this context or a parent.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("context cancelled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Cancellation signal tied to the lifetime of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that also ends after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Child context, cancelled with its parent. The earlier deadline wins.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let deadline = match (self.deadline, timeout.map(|t| Instant::now() + t)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking poll.
    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Reason the context ended, `None` while it is still live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            Some(CancelReason::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {},
                    () = tokio::time::sleep_until(deadline) => {},
                }
            },
            None => self.token.cancelled().await,
        }
    }

    /// Wait for `delay` unless the context ends first.
    ///
    /// Returns `true` if the whole delay elapsed, `false` on cancellation.
    pub async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.done() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let ctx = RequestContext::new();
        let start = Instant::now();

        assert!(ctx.sleep(Duration::from_secs(1)).await);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(ctx.err(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted() {
        let ctx = RequestContext::new();
        let start = Instant::now();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        assert!(!ctx.sleep(Duration::from_secs(10)).await);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert_eq!(ctx.err(), Some(CancelReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(2));
        assert!(ctx.deadline().is_some());
        assert!(!ctx.is_cancelled());

        assert!(!ctx.sleep(Duration::from_secs(5)).await);
        assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child() {
        let parent = RequestContext::with_timeout(Duration::from_secs(5));
        let child = parent.child(Some(Duration::from_secs(10)));
        assert_eq!(child.deadline(), parent.deadline());

        parent.cancel();
        assert_eq!(child.err(), Some(CancelReason::Cancelled));
        child.done().await;

        let sibling = RequestContext::new().child(None);
        sibling.cancel();
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            CancelReason::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
    }
}
