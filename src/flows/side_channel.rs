//! Best-effort notification dispatch decoupled from the caller's result.
//!
//! [`SideChannel::dispatch`] spawns the post on the ambient tokio runtime and returns
//! immediately. Failures never reach the caller; they are logged, counted in
//! [`SideChannelMetrics`], and published through the `metrics` feature when enabled.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::{runtime::Handle, task::JoinHandle};
// self
use crate::{_prelude::*, ext::Notifier, obs};

/// Thread-safe counters for side-channel deliveries.
#[derive(Debug, Default)]
pub struct SideChannelMetrics {
	attempts: AtomicU64,
	delivered: AtomicU64,
	failures: AtomicU64,
}
impl SideChannelMetrics {
	/// Returns the number of dispatched notifications.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of notifications the notifier accepted.
	pub fn delivered(&self) -> u64 {
		self.delivered.load(Ordering::Relaxed)
	}

	/// Returns the number of notifications that were dropped.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	fn record_delivered(&self) {
		self.delivered.fetch_add(1, Ordering::Relaxed);
	}

	fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
		obs::record_side_channel_failure();
	}
}

/// Fire-and-forget wrapper around a [`Notifier`].
#[derive(Clone)]
pub struct SideChannel {
	notifier: Arc<dyn Notifier>,
	metrics: Arc<SideChannelMetrics>,
}
impl SideChannel {
	/// Wraps `notifier`.
	pub fn new(notifier: Arc<dyn Notifier>) -> Self {
		Self { notifier, metrics: Default::default() }
	}

	/// Delivery counters shared by every clone of this channel.
	pub fn metrics(&self) -> &Arc<SideChannelMetrics> {
		&self.metrics
	}

	/// Posts `message` to `channel` in a detached task.
	///
	/// Returns the task handle so tests can wait for delivery; production callers drop it.
	/// Outside a tokio runtime nothing is spawned, the notification is counted as failed,
	/// and `None` is returned.
	pub fn dispatch(&self, channel: String, message: String) -> Option<JoinHandle<()>> {
		self.metrics.record_attempt();

		let Ok(runtime) = Handle::try_current() else {
			self.metrics.record_failure();

			tracing::warn!(channel = %channel, "No async runtime available; notification dropped.");

			return None;
		};
		let notifier = self.notifier.clone();
		let metrics = self.metrics.clone();

		Some(runtime.spawn(async move {
			match notifier.post(&channel, &message).await {
				Ok(()) => metrics.record_delivered(),
				Err(e) => {
					metrics.record_failure();

					tracing::warn!(channel = %channel, error = %e, "Best-effort notification failed.");
				},
			}
		}))
	}
}
impl Debug for SideChannel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SideChannel").field("metrics", &self.metrics).finish()
	}
}
