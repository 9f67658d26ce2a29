//! Login token records, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TokenId, token::secret::Secret},
};

/// Lifecycle status of a login token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token can still be consumed.
	Active,
	/// Token was consumed earlier.
	Used,
	/// Token outlived its expiry instant.
	Expired,
}

/// Errors produced by [`LoginTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum LoginTokenBuilderError {
	/// Issued when no token value was provided.
	#[error("Token value is required.")]
	MissingValue,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the expiry precedes the issue instant.
	#[error("Expiry must not precede the issue instant.")]
	ExpiryBeforeIssue,
	/// Issued when the relative expiry overflows the supported date range.
	#[error("Expiry is outside the supported date range.")]
	ExpiryOutOfRange,
}

/// Persisted login token.
///
/// `used` only ever moves from `false` to `true`, and only inside a store's atomic consume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginToken {
	/// Storage identifier.
	pub id: TokenId,
	/// Subject the token authenticates.
	pub subject_id: SubjectId,
	/// Unguessable value embedded in the magic link.
	pub value: Secret,
	/// Last instant at which the token is still valid.
	pub expires_at: OffsetDateTime,
	/// Whether the token was consumed.
	pub used: bool,
	/// Issue instant.
	pub created_at: OffsetDateTime,
}
impl LoginToken {
	/// Returns a builder for a token that has not been persisted yet.
	pub fn builder(subject_id: SubjectId) -> LoginTokenBuilder {
		LoginTokenBuilder::new(subject_id)
	}

	/// Computes the lifecycle status at a given instant.
	///
	/// The expiry boundary is inclusive: a token is still active at exactly `expires_at`.
	/// A used token reports [`TokenStatus::Used`] even after it expired.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.used {
			return TokenStatus::Used;
		}
		if instant > self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant > self.expires_at
	}

	/// Marks the token as consumed.
	pub fn mark_used(&mut self) {
		self.used = true;
	}
}

/// Token contents handed to a store, which assigns the identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLoginToken {
	/// Subject the token authenticates.
	pub subject_id: SubjectId,
	/// Unguessable value embedded in the magic link.
	pub value: Secret,
	/// Last instant at which the token is still valid.
	pub expires_at: OffsetDateTime,
	/// Issue instant.
	pub created_at: OffsetDateTime,
}
impl NewLoginToken {
	/// Attaches a storage identifier, producing an unused [`LoginToken`].
	pub fn into_record(self, id: TokenId) -> LoginToken {
		LoginToken {
			id,
			subject_id: self.subject_id,
			value: self.value,
			expires_at: self.expires_at,
			used: false,
			created_at: self.created_at,
		}
	}
}

/// Builder for [`NewLoginToken`].
#[derive(Clone, Debug)]
pub struct LoginTokenBuilder {
	subject_id: SubjectId,
	value: Option<Secret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl LoginTokenBuilder {
	fn new(subject_id: SubjectId) -> Self {
		Self { subject_id, value: None, issued_at: None, expires_at: None, expires_in: None }
	}

	/// Sets the issue instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issue instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the token value.
	pub fn value(mut self, value: Secret) -> Self {
		self.value = Some(value);

		self
	}

	/// Consumes the builder and produces a [`NewLoginToken`].
	///
	/// Both instants are truncated to whole microseconds, the precision of SQL timestamps, so
	/// a token behaves the same in every store.
	pub fn build(self) -> Result<NewLoginToken, LoginTokenBuilderError> {
		let value = self.value.ok_or(LoginTokenBuilderError::MissingValue)?;
		let created_at =
			self.issued_at.unwrap_or_else(OffsetDateTime::now_utc).truncate_to_microsecond();
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => created_at
				.checked_add(delta)
				.ok_or(LoginTokenBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(LoginTokenBuilderError::MissingExpiry),
		}
		.truncate_to_microsecond();

		if expires_at < created_at {
			return Err(LoginTokenBuilderError::ExpiryBeforeIssue);
		}

		Ok(NewLoginToken { subject_id: self.subject_id, value, expires_at, created_at })
	}
}
