// self
use crate::_prelude::*;

/// Result of a [`RateLimiter`](crate::limiter::RateLimiter) check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed; one permit was taken.
	Allow,
	/// The bucket is empty; the request should be rejected.
	Delay(RetryDirective),
}
impl RateLimitDecision {
	/// Returns `true` for [`RateLimitDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow)
	}

	/// Stable label used for metrics and logs.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Allow => "allow",
			Self::Delay(_) => "delay",
		}
	}
}

/// Advises callers when to retry after a [`RateLimitDecision::Delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when the next permit becomes available.
	pub earliest_retry_at: OffsetDateTime,
	/// Wait until the next permit.
	pub recommended_backoff: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}
}
