//! Reconnection policy
//!
//! A pure decision function: failure cause + attempt index in, retry delay or
//! give-up out. The session manager owns the waiting and the reconnecting.

use std::time::Duration;

use crate::Error;

/// Classification of a session failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// Worth retrying: network reset, mid-stream disconnect, backend timeout
    Transient,
    /// Never retried: authentication failure, protocol violation
    Fatal,
}

impl FailureCause {
    /// Classify an error for reconnection purposes
    #[must_use]
    pub const fn classify(error: &Error) -> Self {
        match error {
            Error::Stream(_) | Error::BackendTimeout(_) | Error::Io(_) => Self::Transient,
            _ => Self::Fatal,
        }
    }
}

/// Outcome of a reconnection decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Wait this long, then reconnect
    Retry(Duration),
    /// Surface the failure upward
    GiveUp,
}

/// One scheduled reconnection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectAttempt {
    /// Zero-based attempt index within the failure episode
    pub attempt: u32,
    /// Why the stream failed
    pub cause: FailureCause,
    /// Backoff delay before the attempt
    pub delay: Duration,
}

/// Bounded exponential backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay for attempt 0 (doubles each attempt)
    pub base_delay: Duration,
    /// Delay ceiling
    pub max_delay: Duration,
    /// Give up once `attempt >= max_attempts`
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Decide what to do after failure number `attempt` (zero-based).
    ///
    /// Fatal causes give up on the first occurrence regardless of the attempt
    /// count.
    #[must_use]
    pub fn decide(&self, attempt: u32, cause: FailureCause) -> Decision {
        if cause == FailureCause::Fatal || attempt >= self.max_attempts {
            return Decision::GiveUp;
        }

        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        Decision::Retry(delay)
    }

    /// Plan reconnection attempt number `attempt` (zero-based).
    ///
    /// Returns the scheduled attempt, or `None` when [`Self::decide`] gives
    /// up.
    #[must_use]
    pub fn plan(&self, attempt: u32, cause: FailureCause) -> Option<ReconnectAttempt> {
        match self.decide(attempt, cause) {
            Decision::GiveUp => None,
            Decision::Retry(delay) => Some(ReconnectAttempt {
                attempt,
                cause,
                delay,
            }),
        }
    }
}
