// self
use crate::{
	limiter::RateLimitDecision,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"linkauth_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a rate limiter decision.
pub fn record_rate_limit_decision(decision: &RateLimitDecision) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("linkauth_rate_limit_total", "decision" => decision.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = decision;
	}
}

/// Records a best-effort notification that failed.
pub fn record_side_channel_failure() {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("linkauth_side_channel_failures_total").increment(1);
	}
}

/// Records how many expired tokens one sweep deleted.
pub fn record_tokens_swept(count: u64) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("linkauth_tokens_swept_total").increment(count);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = count;
	}
}
