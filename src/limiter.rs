//! In-memory token-bucket rate limiter keyed by `(client identity, resource path)`.
//!
//! Buckets are created lazily at full capacity on first use and refill continuously at one
//! permit per [`RateLimitConfig::refill_interval`]. A bucket stores how far its theoretical
//! arrival time runs ahead of the last update (GCRA), so refill math is exact integer time with
//! no fractional permits to drift. Every read-check-decrement runs inside a
//! single mutex together with the eviction sweep, so a sweep never drops a bucket another
//! caller is updating. Idle buckets are evicted once their last granted request is older than
//! [`RateLimitConfig::entry_ttl`]; the sweep runs opportunistically on the check path at most
//! once per [`RateLimitConfig::sweep_interval`].
//!
//! State is process-local and lost on restart, so the limiter is a fairness measure rather
//! than a security control.

mod decision;

pub use decision::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientIdentity, ResourcePath},
	clock::{Clock, SystemClock},
	error::ConfigError,
	obs,
};

/// Token-bucket parameters shared by every key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
	/// Maximum permits a bucket can hold (burst size).
	pub capacity: u32,
	/// Time needed to regain one permit.
	pub refill_interval: Duration,
	/// Idle time after which a bucket is evicted.
	pub entry_ttl: Duration,
	/// Minimum spacing between opportunistic eviction sweeps.
	pub sweep_interval: Duration,
}
impl RateLimitConfig {
	const DEFAULT_ENTRY_TTL: Duration = Duration::minutes(10);
	const DEFAULT_SWEEP_INTERVAL: Duration = Duration::minutes(1);

	/// Creates a config with the default 10 minute idle TTL and 1 minute sweep spacing.
	pub fn new(capacity: u32, refill_interval: Duration) -> Self {
		Self {
			capacity,
			refill_interval,
			entry_ttl: Self::DEFAULT_ENTRY_TTL,
			sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
		}
	}

	/// Overrides the idle TTL.
	pub fn with_entry_ttl(mut self, ttl: Duration) -> Self {
		self.entry_ttl = ttl;

		self
	}

	/// Overrides the sweep spacing.
	pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
		self.sweep_interval = interval;

		self
	}

	/// Checks that every parameter is positive and that idle buckets outlive a full refill.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.capacity == 0 {
			return Err(ConfigError::InvalidRateLimit { reason: "capacity must be at least 1" });
		}
		if !self.refill_interval.is_positive() {
			return Err(ConfigError::InvalidRateLimit { reason: "refill interval must be positive" });
		}
		if !self.entry_ttl.is_positive() || !self.sweep_interval.is_positive() {
			return Err(ConfigError::InvalidRateLimit {
				reason: "entry TTL and sweep interval must be positive",
			});
		}
		let Some(window) = self.burst_window() else {
			return Err(ConfigError::InvalidRateLimit {
				reason: "capacity times refill interval is out of range",
			});
		};

		// Evicting a partially drained bucket would hand out a fresh burst early.
		if self.entry_ttl < window {
			return Err(ConfigError::InvalidRateLimit {
				reason: "entry TTL must cover a full refill",
			});
		}

		Ok(())
	}

	/// Time to refill an empty bucket, or `None` when it overflows.
	pub fn burst_window(&self) -> Option<Duration> {
		i32::try_from(self.capacity)
			.ok()
			.and_then(|capacity| self.refill_interval.checked_mul(capacity))
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LimiterKey {
	client: ClientIdentity,
	path: ResourcePath,
}

#[derive(Clone, Debug)]
struct Bucket {
	// Outstanding refill time: zero is a full bucket, the burst window an empty one.
	debt: Duration,
	last_update: OffsetDateTime,
	last_seen: OffsetDateTime,
}
impl Bucket {
	fn full(now: OffsetDateTime) -> Self {
		Self { debt: Duration::ZERO, last_update: now, last_seen: now }
	}

	fn debt_at(&self, now: OffsetDateTime) -> Duration {
		let elapsed = (now - self.last_update).max(Duration::ZERO);

		self.debt.saturating_sub(elapsed).max(Duration::ZERO)
	}
}

#[derive(Debug)]
struct LimiterState {
	buckets: HashMap<LimiterKey, Bucket>,
	last_sweep: Option<OffsetDateTime>,
}

/// Per-(client, path) token-bucket limiter.
///
/// Construct one per process and share it by reference (typically behind an [`Arc`]).
pub struct RateLimiter {
	config: RateLimitConfig,
	window: Duration,
	clock: Arc<dyn Clock>,
	state: Mutex<LimiterState>,
}
impl RateLimiter {
	/// Creates a limiter driven by the system clock.
	pub fn new(config: RateLimitConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let window = config.burst_window().ok_or(ConfigError::InvalidRateLimit {
			reason: "capacity times refill interval is out of range",
		})?;

		Ok(Self {
			config,
			window,
			clock: Arc::new(SystemClock),
			state: Mutex::new(LimiterState { buckets: HashMap::new(), last_sweep: None }),
		})
	}

	/// Replaces the time source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Takes one permit for the key at the clock's current instant.
	pub fn check(&self, client: &ClientIdentity, path: &ResourcePath) -> RateLimitDecision {
		self.check_at(client, path, self.clock.now())
	}

	/// Takes one permit for the key at `now`.
	///
	/// A denial leaves the bucket untouched, including its last-seen instant.
	pub fn check_at(
		&self,
		client: &ClientIdentity,
		path: &ResourcePath,
		now: OffsetDateTime,
	) -> RateLimitDecision {
		let mut state = self.state.lock();

		if state.last_sweep.is_none_or(|last| now - last >= self.config.sweep_interval) {
			Self::sweep_locked(&mut state, &self.config, now);
		}

		let key = LimiterKey { client: client.clone(), path: path.clone() };
		let bucket = state.buckets.entry(key).or_insert_with(|| Bucket::full(now));
		let debt = bucket.debt_at(now).saturating_add(self.config.refill_interval);
		let decision = if debt <= self.window {
			bucket.debt = debt;
			bucket.last_update = now;
			bucket.last_seen = now;

			RateLimitDecision::Allow
		} else {
			let backoff = debt - self.window;

			RateLimitDecision::Delay(
				RetryDirective::new(now.saturating_add(backoff), backoff)
					.with_reason(format!("Rate limit exceeded for {path}.")),
			)
		};

		drop(state);

		obs::record_rate_limit_decision(&decision);

		if !decision.is_allowed() {
			tracing::debug!(client = %client, path = %path, "Rate limit exceeded.");
		}

		decision
	}

	/// Boolean form of [`check`](Self::check).
	pub fn allow(&self, client: &ClientIdentity, path: &ResourcePath) -> bool {
		self.check(client, path).is_allowed()
	}

	/// Boolean form of [`check_at`](Self::check_at).
	pub fn allow_at(&self, client: &ClientIdentity, path: &ResourcePath, now: OffsetDateTime) -> bool {
		self.check_at(client, path, now).is_allowed()
	}

	/// Evicts idle buckets at the clock's current instant.
	pub fn sweep(&self) -> usize {
		self.sweep_at(self.clock.now())
	}

	/// Evicts every bucket whose last granted request is older than the entry TTL at `now`,
	/// returning how many were removed.
	pub fn sweep_at(&self, now: OffsetDateTime) -> usize {
		Self::sweep_locked(&mut self.state.lock(), &self.config, now)
	}

	/// Number of buckets currently held in memory.
	pub fn tracked_entries(&self) -> usize {
		self.state.lock().buckets.len()
	}

	/// Returns `true` if a bucket exists for the key.
	pub fn contains(&self, client: &ClientIdentity, path: &ResourcePath) -> bool {
		self.state
			.lock()
			.buckets
			.contains_key(&LimiterKey { client: client.clone(), path: path.clone() })
	}

	fn sweep_locked(state: &mut LimiterState, config: &RateLimitConfig, now: OffsetDateTime) -> usize {
		let before = state.buckets.len();

		state.buckets.retain(|_, bucket| now - bucket.last_seen <= config.entry_ttl);
		state.last_sweep = Some(now);

		let evicted = before - state.buckets.len();

		if evicted > 0 {
			tracing::debug!(evicted, remaining = state.buckets.len(), "Idle rate limit buckets evicted.");
		}

		evicted
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("config", &self.config)
			.field("tracked_entries", &self.tracked_entries())
			.finish()
	}
}
