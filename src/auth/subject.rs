//! Subjects (users) and the feedback they submit.

// self
use crate::{
	_prelude::*,
	auth::{EmailAddress, FeedbackId, SubjectId},
};

/// Account identified by its email address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	/// Storage identifier and token subject.
	pub id: SubjectId,
	/// Normalized, unique email address.
	pub email: EmailAddress,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Last update instant.
	pub updated_at: OffsetDateTime,
}

/// Persisted feedback entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
	/// Storage identifier.
	pub id: FeedbackId,
	/// Author of the feedback.
	pub subject_id: SubjectId,
	/// Free-form text.
	pub content: String,
	/// Submission instant.
	pub created_at: OffsetDateTime,
}

/// Feedback contents handed to a store, which assigns the identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFeedback {
	/// Author of the feedback.
	pub subject_id: SubjectId,
	/// Free-form text.
	pub content: String,
	/// Submission instant.
	pub created_at: OffsetDateTime,
}
impl NewFeedback {
	/// Attaches a storage identifier.
	pub fn into_record(self, id: FeedbackId) -> Feedback {
		Feedback { id, subject_id: self.subject_id, content: self.content, created_at: self.created_at }
	}
}
