//! Thread-safe in-memory [`AppStore`] implementation for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::{
		EmailAddress, Feedback, FeedbackId, LoginToken, NewFeedback, NewLoginToken, SubjectId,
		TokenId, User,
	},
	store::{AppStore, ConsumeOutcome, StoreError, StoreFuture},
};

type StoreState = Arc<RwLock<MemoryState>>;

#[derive(Debug, Default)]
struct MemoryState {
	last_user_id: u64,
	last_token_id: u64,
	last_feedback_id: u64,
	users: HashMap<EmailAddress, User>,
	// Keyed by value; the map key is the uniqueness constraint.
	tokens: HashMap<String, LoginToken>,
	feedback: Vec<Feedback>,
}

/// Thread-safe storage backend that keeps records in-process.
///
/// Every mutation runs under one write lock, so [`AppStore::consume_token`] is linearizable
/// per token value.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreState);
impl MemoryStore {
	/// Number of stored tokens, used or not.
	pub fn token_count(&self) -> usize {
		self.0.read().tokens.len()
	}

	/// Returns the token stored under `value`, if any.
	pub fn token(&self, value: &str) -> Option<LoginToken> {
		self.0.read().tokens.get(value).cloned()
	}

	/// Snapshot of every stored feedback entry in insertion order.
	pub fn feedback(&self) -> Vec<Feedback> {
		self.0.read().feedback.clone()
	}

	fn create_user_now(
		state: StoreState,
		email: EmailAddress,
		now: OffsetDateTime,
	) -> Result<User, StoreError> {
		let mut guard = state.write();

		if guard.users.contains_key(&email) {
			return Err(StoreError::Conflict { message: format!("email {email} already exists") });
		}

		guard.last_user_id += 1;

		let user =
			User { id: SubjectId(guard.last_user_id), email, created_at: now, updated_at: now };

		guard.users.insert(user.email.clone(), user.clone());

		Ok(user)
	}

	fn create_token_now(state: StoreState, token: NewLoginToken) -> Result<LoginToken, StoreError> {
		let mut guard = state.write();

		if guard.tokens.contains_key(token.value.expose()) {
			return Err(StoreError::Conflict { message: "login token value already exists".into() });
		}

		guard.last_token_id += 1;

		let record = token.into_record(TokenId(guard.last_token_id));

		guard.tokens.insert(record.value.expose().to_owned(), record.clone());

		Ok(record)
	}

	fn consume_now(state: StoreState, value: &str, now: OffsetDateTime) -> ConsumeOutcome {
		let mut guard = state.write();
		let Some(record) = guard.tokens.get_mut(value) else {
			return ConsumeOutcome::NotFound;
		};
		let (outcome, write) = ConsumeOutcome::decide(record, now);

		if write {
			record.mark_used();
		}

		outcome
	}

	fn delete_expired_now(state: StoreState, before: OffsetDateTime) -> u64 {
		let mut guard = state.write();
		let initial = guard.tokens.len();

		guard.tokens.retain(|_, token| token.expires_at >= before);

		(initial - guard.tokens.len()) as u64
	}

	fn create_feedback_now(state: StoreState, feedback: NewFeedback) -> Feedback {
		let mut guard = state.write();

		guard.last_feedback_id += 1;

		let record = feedback.into_record(FeedbackId(guard.last_feedback_id));

		guard.feedback.push(record.clone());

		record
	}

	fn count_duplicates_now(
		state: StoreState,
		subject: SubjectId,
		content: &str,
		since: OffsetDateTime,
	) -> u64 {
		state
			.read()
			.feedback
			.iter()
			.filter(|entry| {
				entry.subject_id == subject && entry.content == content && entry.created_at > since
			})
			.count() as u64
	}
}
impl AppStore for MemoryStore {
	fn create_user<'a>(
		&'a self,
		email: &'a EmailAddress,
		now: OffsetDateTime,
	) -> StoreFuture<'a, User> {
		let state = self.0.clone();
		let email = email.to_owned();

		Box::pin(async move { Self::create_user_now(state, email, now) })
	}

	fn find_user_by_email<'a>(&'a self, email: &'a EmailAddress) -> StoreFuture<'a, Option<User>> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().users.get(email).cloned()) })
	}

	fn create_token(&self, token: NewLoginToken) -> StoreFuture<'_, LoginToken> {
		let state = self.0.clone();

		Box::pin(async move { Self::create_token_now(state, token) })
	}

	fn consume_token<'a>(
		&'a self,
		value: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ConsumeOutcome> {
		let state = self.0.clone();

		Box::pin(async move { Ok(Self::consume_now(state, value, now)) })
	}

	fn delete_expired_tokens(&self, before: OffsetDateTime) -> StoreFuture<'_, u64> {
		let state = self.0.clone();

		Box::pin(async move { Ok(Self::delete_expired_now(state, before)) })
	}

	fn create_feedback(&self, feedback: NewFeedback) -> StoreFuture<'_, Feedback> {
		let state = self.0.clone();

		Box::pin(async move { Ok(Self::create_feedback_now(state, feedback)) })
	}

	fn count_recent_duplicate_feedback<'a>(
		&'a self,
		subject: SubjectId,
		content: &'a str,
		since: OffsetDateTime,
	) -> StoreFuture<'a, u64> {
		let state = self.0.clone();

		Box::pin(async move { Ok(Self::count_duplicates_now(state, subject, content, since)) })
	}
}
