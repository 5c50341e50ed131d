// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Failure policies consulted by the task runner.
//!
//! A policy decides whether a failed transport task is attempted again and
//! is notified when the transport reports a lost connection. Policies are
//! plain values injected into the runner; the default never reconnects.

use crate::transport::TransportError;

/// Retry ceiling used by [`RetryLimit::default`].
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Decides retry behaviour for failed transport work.
pub trait FailurePolicy: Send + Sync {
    /// Whether a task that failed with `failure` after `attempts` retries
    /// should run again.
    fn should_retry(&self, failure: &TransportError, attempts: u32) -> bool;

    /// Called when the transport reports a lost connection.
    ///
    /// The default only logs; reconnection is left to the application.
    fn on_disconnect(&self, cause: &TransportError) {
        log::warn!("[policy] transport disconnected: {}", cause);
    }
}

/// Retry any failure until `max_retries` retries have been made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryLimit {
    pub max_retries: u32,
}

impl RetryLimit {
    pub const fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

impl Default for RetryLimit {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl FailurePolicy for RetryLimit {
    fn should_retry(&self, failure: &TransportError, attempts: u32) -> bool {
        let retry = attempts < self.max_retries;
        log::debug!(
            "[policy] failure after {} retries ({}), retry={}",
            attempts,
            failure,
            retry
        );
        retry
    }
}

/// Retry only transient transport failures, up to `max_retries` times.
///
/// Rejections, closed transports and I/O errors fail on first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientOnly {
    pub max_retries: u32,
}

impl TransientOnly {
    pub const fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

impl Default for TransientOnly {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl FailurePolicy for TransientOnly {
    fn should_retry(&self, failure: &TransportError, attempts: u32) -> bool {
        failure.is_transient() && attempts < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_limit_counts_retries() {
        let policy = RetryLimit::default();
        let err = TransportError::Busy;
        assert!(policy.should_retry(&err, 0));
        assert!(policy.should_retry(&err, 4));
        assert!(!policy.should_retry(&err, 5));
    }

    #[test]
    fn retry_limit_ignores_error_kind() {
        let policy = RetryLimit::new(1);
        let rejected = TransportError::Rejected {
            operation: "publish".to_string(),
            reason: "not authorized".to_string(),
        };
        assert!(policy.should_retry(&rejected, 0));
        assert!(!policy.should_retry(&rejected, 1));
    }

    #[test]
    fn zero_retries_never_retries() {
        assert!(!RetryLimit::new(0).should_retry(&TransportError::Timeout, 0));
    }

    #[test]
    fn transient_only_skips_permanent_failures() {
        let policy = TransientOnly::default();
        assert!(policy.should_retry(&TransportError::NotConnected, 0));
        assert!(policy.should_retry(&TransportError::Timeout, 2));
        assert!(!policy.should_retry(&TransportError::Closed, 0));
        assert!(!policy.should_retry(&TransportError::Io("reset".into()), 0));
        assert!(!policy.should_retry(&TransportError::Busy, 5));
    }
}
