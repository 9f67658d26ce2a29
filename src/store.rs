//! Storage contracts and built-in store implementations for subjects, login tokens, and
//! feedback.

pub mod memory;
#[cfg(feature = "postgres")] pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")] pub use postgres::PgStore;

// self
use crate::{
	_prelude::*,
	auth::{EmailAddress, Feedback, LoginToken, NewFeedback, NewLoginToken, SubjectId, User},
};

/// Boxed future returned by [`AppStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract.
///
/// Token values are unique across the whole store, not only per subject. Implementations must
/// make [`consume_token`](AppStore::consume_token) a single atomic unit: the lookup, the
/// `used`/expiry checks, and the `used = true` write serialize with every other consume of
/// the same value.
pub trait AppStore
where
	Self: Send + Sync,
{
	/// Creates a subject; fails with [`StoreError::Conflict`] if the email is taken.
	fn create_user<'a>(
		&'a self,
		email: &'a EmailAddress,
		now: OffsetDateTime,
	) -> StoreFuture<'a, User>;

	/// Fetches the subject registered under the email, if present.
	fn find_user_by_email<'a>(&'a self, email: &'a EmailAddress) -> StoreFuture<'a, Option<User>>;

	/// Persists a new, unused token; fails with [`StoreError::Conflict`] on a duplicate value.
	fn create_token(&self, token: NewLoginToken) -> StoreFuture<'_, LoginToken>;

	/// Atomically looks up the token by value and marks it used when it is still active.
	fn consume_token<'a>(
		&'a self,
		value: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ConsumeOutcome>;

	/// Deletes tokens whose expiry is strictly before `before`, returning how many were removed.
	fn delete_expired_tokens(&self, before: OffsetDateTime) -> StoreFuture<'_, u64>;

	/// Persists a feedback entry.
	fn create_feedback(&self, feedback: NewFeedback) -> StoreFuture<'_, Feedback>;

	/// Counts entries by `subject` with identical `content` created strictly after `since`.
	fn count_recent_duplicate_feedback<'a>(
		&'a self,
		subject: SubjectId,
		content: &'a str,
		since: OffsetDateTime,
	) -> StoreFuture<'a, u64>;
}

/// Result of an atomic consume attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
	/// The token was active and is now marked used; carries the updated record.
	Consumed(LoginToken),
	/// The token had already been consumed.
	AlreadyUsed,
	/// The token is past its expiry instant.
	Expired,
	/// No token with that value exists.
	NotFound,
}
impl ConsumeOutcome {
	/// Applies the shared used-then-expiry decision to a locked record.
	///
	/// Returns the outcome and whether the caller must persist `used = true`.
	pub fn decide(record: &LoginToken, now: OffsetDateTime) -> (Self, bool) {
		match record.status_at(now) {
			crate::auth::TokenStatus::Used => (Self::AlreadyUsed, false),
			crate::auth::TokenStatus::Expired => (Self::Expired, false),
			crate::auth::TokenStatus::Active => {
				let mut consumed = record.clone();

				consumed.mark_used();

				(Self::Consumed(consumed), true)
			},
		}
	}
}

/// Error type produced by [`AppStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// A uniqueness constraint rejected the write.
	#[error("Uniqueness conflict: {message}.")]
	Conflict {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Returns `true` for uniqueness violations.
	pub fn is_conflict(&self) -> bool {
		matches!(self, Self::Conflict { .. })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		auth::{Secret, TokenId},
		error::Error,
	};

	fn record(used: bool) -> LoginToken {
		let mut token = LoginToken::builder(SubjectId(7))
			.value(Secret::new("decide"))
			.issued_at(macros::datetime!(2025-03-01 10:00 UTC))
			.expires_in(Duration::minutes(15))
			.build()
			.expect("Token fixture should build.")
			.into_record(TokenId(3));

		token.used = used;

		token
	}

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("database unreachable"));

		let source = StdError::source(&error)
			.expect("Crate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn decide_checks_used_before_expiry() {
		let late = macros::datetime!(2025-03-01 11:00 UTC);

		assert_eq!(ConsumeOutcome::decide(&record(true), late), (ConsumeOutcome::AlreadyUsed, false));
		assert_eq!(ConsumeOutcome::decide(&record(false), late), (ConsumeOutcome::Expired, false));

		let (outcome, write) =
			ConsumeOutcome::decide(&record(false), macros::datetime!(2025-03-01 10:15 UTC));

		assert!(write);
		assert!(matches!(outcome, ConsumeOutcome::Consumed(token) if token.used));
	}
}
