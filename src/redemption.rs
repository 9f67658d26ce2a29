//! Single-use login token protocol: issuance, atomic consumption, and expiry sweeping.
//!
//! A token moves from issued to exactly one terminal observation per consume call:
//! consumed, already used, or expired. The store performs the check-and-set as one atomic
//! unit, so concurrent redemptions of the same value yield a single winner and every loser
//! observes [`Error::TokenAlreadyUsed`].

mod sweeper;

pub use sweeper::*;

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
// self
use crate::{
	_prelude::*,
	auth::{LoginToken, Secret, SubjectId},
	store::{AppStore, ConsumeOutcome},
};

/// Random bytes drawn per token value (256 bits of entropy).
pub const TOKEN_VALUE_BYTES: usize = 32;
/// Longest value [`TokenProtocol::consume`] forwards to the store.
pub const MAX_TOKEN_VALUE_LEN: usize = 512;

const ISSUE_ATTEMPTS: usize = 3;

/// Generates a fresh, unguessable token value.
pub fn generate_token_value() -> Secret {
	let mut bytes = [0_u8; TOKEN_VALUE_BYTES];

	rand::rng().fill_bytes(&mut bytes);

	Secret::new(URL_SAFE_NO_PAD.encode(bytes))
}

/// Token lifecycle operations over an [`AppStore`].
#[derive(Clone)]
pub struct TokenProtocol {
	store: Arc<dyn AppStore>,
}
impl TokenProtocol {
	/// Wraps the store that owns token state.
	pub fn new(store: Arc<dyn AppStore>) -> Self {
		Self { store }
	}

	/// Persists a new unused token for `subject` that expires `ttl` after `now`.
	///
	/// A value collision reported as [`StoreError::Conflict`](crate::store::StoreError) is
	/// retried with a fresh value a bounded number of times.
	pub async fn issue(
		&self,
		subject: SubjectId,
		ttl: Duration,
		now: OffsetDateTime,
	) -> Result<LoginToken> {
		let mut attempt = 0;

		loop {
			attempt += 1;

			let token = LoginToken::builder(subject)
				.value(generate_token_value())
				.issued_at(now)
				.expires_in(ttl)
				.build()
				.map_err(Error::unavailable)?;

			match self.store.create_token(token).await {
				Ok(record) => return Ok(record),
				Err(e) if e.is_conflict() && attempt < ISSUE_ATTEMPTS => {
					tracing::debug!(attempt, "Token value collided; regenerating.");
				},
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// Redeems `value` at `now`, returning the consumed record on success.
	///
	/// The token stays valid at exactly its expiry instant. A used token reports
	/// [`Error::TokenAlreadyUsed`] even after it expired.
	pub async fn consume(&self, value: &str, now: OffsetDateTime) -> Result<LoginToken> {
		if value.is_empty() || value.len() > MAX_TOKEN_VALUE_LEN {
			return Err(Error::TokenNotFound);
		}

		match self.store.consume_token(value, now).await? {
			ConsumeOutcome::Consumed(record) => Ok(record),
			ConsumeOutcome::AlreadyUsed => Err(Error::TokenAlreadyUsed),
			ConsumeOutcome::Expired => Err(Error::TokenExpired),
			ConsumeOutcome::NotFound => Err(Error::TokenNotFound),
		}
	}

	/// Deletes every token whose expiry is strictly before `now`.
	pub async fn sweep_expired(&self, now: OffsetDateTime) -> Result<u64> {
		Ok(self.store.delete_expired_tokens(now).await?)
	}
}
impl Debug for TokenProtocol {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProtocol").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;
	use crate::{
		_preludet::test_epoch,
		auth::{EmailAddress, Feedback, NewFeedback, NewLoginToken, User},
		store::{MemoryStore, StoreError, StoreFuture},
	};

	/// Store that reports a value conflict for the first `conflicts` inserts.
	#[derive(Debug, Default)]
	struct CollidingStore {
		inner: MemoryStore,
		conflicts: Mutex<usize>,
	}
	impl AppStore for CollidingStore {
		fn create_user<'a>(
			&'a self,
			email: &'a EmailAddress,
			now: OffsetDateTime,
		) -> StoreFuture<'a, User> {
			self.inner.create_user(email, now)
		}

		fn find_user_by_email<'a>(
			&'a self,
			email: &'a EmailAddress,
		) -> StoreFuture<'a, Option<User>> {
			self.inner.find_user_by_email(email)
		}

		fn create_token(&self, token: NewLoginToken) -> StoreFuture<'_, LoginToken> {
			{
				let mut remaining = self.conflicts.lock();

				if *remaining > 0 {
					*remaining -= 1;

					return Box::pin(async {
						Err(StoreError::Conflict { message: "value taken".into() })
					});
				}
			}

			self.inner.create_token(token)
		}

		fn consume_token<'a>(
			&'a self,
			value: &'a str,
			now: OffsetDateTime,
		) -> StoreFuture<'a, ConsumeOutcome> {
			self.inner.consume_token(value, now)
		}

		fn delete_expired_tokens(&self, before: OffsetDateTime) -> StoreFuture<'_, u64> {
			self.inner.delete_expired_tokens(before)
		}

		fn create_feedback(&self, feedback: NewFeedback) -> StoreFuture<'_, Feedback> {
			self.inner.create_feedback(feedback)
		}

		fn count_recent_duplicate_feedback<'a>(
			&'a self,
			subject: SubjectId,
			content: &'a str,
			since: OffsetDateTime,
		) -> StoreFuture<'a, u64> {
			self.inner.count_recent_duplicate_feedback(subject, content, since)
		}
	}

	#[test]
	fn generated_values_are_url_safe_and_unique() {
		let sample: HashSet<String> =
			(0..10_000).map(|_| generate_token_value().expose().to_owned()).collect();

		assert_eq!(sample.len(), 10_000, "Token values must never repeat.");

		for value in sample.iter().take(100) {
			assert_eq!(value.len(), 43);
			assert!(value.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
		}
	}

	#[tokio::test]
	async fn issue_retries_value_collisions() {
		let store = Arc::new(CollidingStore { conflicts: Mutex::new(2), ..Default::default() });
		let protocol = TokenProtocol::new(store.clone());
		let token = protocol
			.issue(SubjectId(5), Duration::minutes(15), test_epoch())
			.await
			.expect("Issue should succeed after two collisions.");

		assert_eq!(token.subject_id, SubjectId(5));
		assert_eq!(store.inner.token_count(), 1);
	}

	#[tokio::test]
	async fn issue_gives_up_after_repeated_collisions() {
		let store = Arc::new(CollidingStore { conflicts: Mutex::new(3), ..Default::default() });
		let protocol = TokenProtocol::new(store.clone());
		let err = protocol
			.issue(SubjectId(5), Duration::minutes(15), test_epoch())
			.await
			.expect_err("Issue should fail once every attempt collided.");

		assert!(matches!(err, Error::Storage(StoreError::Conflict { .. })));
		assert_eq!(store.inner.token_count(), 0);
	}

	#[tokio::test]
	async fn oversized_and_empty_values_never_reach_the_store() {
		let protocol = TokenProtocol::new(Arc::new(MemoryStore::default()));

		for value in [String::new(), "x".repeat(MAX_TOKEN_VALUE_LEN + 1)] {
			let err = protocol
				.consume(&value, test_epoch())
				.await
				.expect_err("Malformed values should be rejected.");

			assert!(matches!(err, Error::TokenNotFound));
		}
	}
}
