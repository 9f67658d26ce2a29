//! Observability helpers for orchestrator flows and maintenance tasks.
//!
//! Spans are always emitted through `tracing` as `linkauth.flow` with `flow` and `stage`
//! fields. Enable the `metrics` feature to publish counters through the global recorder:
//!
//! - `linkauth_flow_total{flow, outcome}` for every attempt/success/failure.
//! - `linkauth_rate_limit_total{decision}` for limiter checks.
//! - `linkauth_side_channel_failures_total` for dropped chat notifications.
//! - `linkauth_tokens_swept_total` for expired tokens deleted by the sweeper.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Magic-link request (find-or-create, issue, email).
	RequestLogin,
	/// Token redemption for a session credential.
	ExchangeToken,
	/// Feedback intake.
	SubmitFeedback,
	/// Expired token cleanup.
	ExpirySweep,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::RequestLogin => "request_login",
			FlowKind::ExchangeToken => "exchange_token",
			FlowKind::SubmitFeedback => "submit_feedback",
			FlowKind::ExpirySweep => "expiry_sweep",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
