// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{task::JoinHandle, time::MissedTickBehavior};
// self
use crate::{
	_prelude::*,
	clock::Clock,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	redemption::TokenProtocol,
};

/// Background task that periodically deletes expired login tokens.
///
/// A failed sweep is logged and retried on the next tick; it never stops the task.
#[derive(Clone)]
pub struct ExpirySweeper {
	protocol: TokenProtocol,
	clock: Arc<dyn Clock>,
	interval: StdDuration,
}
impl ExpirySweeper {
	/// Creates a sweeper that runs every `interval`.
	pub fn new(protocol: TokenProtocol, clock: Arc<dyn Clock>, interval: StdDuration) -> Self {
		Self { protocol, clock, interval }
	}

	/// Runs one sweep at the clock's current instant.
	pub async fn run_once(&self) -> Result<u64> {
		const KIND: FlowKind = FlowKind::ExpirySweep;

		let span = FlowSpan::new(KIND, "run_once");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.protocol.sweep_expired(self.clock.now())).await;

		match &result {
			Ok(removed) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				obs::record_tokens_swept(*removed);

				if *removed > 0 {
					tracing::debug!(removed, "Expired login tokens deleted.");
				}
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				tracing::warn!(error = %e, "Expired token sweep failed; retrying next interval.");
			},
		}

		result
	}

	/// Spawns the sweep loop on the current tokio runtime.
	///
	/// The first sweep runs immediately. Must be called from within a runtime.
	pub fn spawn(self) -> SweeperHandle {
		let interval = self.interval.max(StdDuration::from_millis(1));
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;

				let _ = self.run_once().await;
			}
		});

		SweeperHandle { task }
	}
}

impl Debug for ExpirySweeper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExpirySweeper").field("interval", &self.interval).finish()
	}
}

/// Owner of a spawned [`ExpirySweeper`] task; dropping it stops the sweeps.
#[derive(Debug)]
pub struct SweeperHandle {
	task: JoinHandle<()>,
}
impl SweeperHandle {
	/// Stops the sweep loop and waits for the task to wind down.
	pub async fn shutdown(mut self) {
		self.task.abort();

		let _ = (&mut self.task).await;
	}

	/// Returns `true` once the task has stopped.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}
}
impl Drop for SweeperHandle {
	fn drop(&mut self) {
		self.task.abort();
	}
}
