//! PostgreSQL-backed [`AppStore`] using sqlx.
//!
//! Token consumption runs inside one transaction that locks the row with
//! `SELECT ... FOR UPDATE`; a concurrent consumer of the same value blocks on the lock and,
//! once the winner commits, re-reads the row with `used = true`. The expiry sweep's `DELETE`
//! waits on the same lock, so it never removes a token mid-consumption.
//!
//! `TIMESTAMPTZ` keeps microseconds; tokens built through
//! [`LoginTokenBuilder`](crate::auth::LoginTokenBuilder) are already truncated to that
//! precision and round-trip unchanged.

// crates.io
use sqlx::{
	PgPool, Row,
	postgres::{PgPoolOptions, PgRow},
};
// self
use crate::{
	_prelude::*,
	auth::{
		EmailAddress, Feedback, FeedbackId, LoginToken, NewFeedback, NewLoginToken, Secret,
		SubjectId, TokenId, User,
	},
	store::{AppStore, ConsumeOutcome, StoreError, StoreFuture},
};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");
const TOKEN_COLUMNS: &str = "id, subject_id, value, expires_at, used, created_at";

/// Store backed by a PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
	pool: PgPool,
}
impl PgStore {
	/// Connects a pool to `dsn`.
	pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, StoreError> {
		let pool = PgPoolOptions::new()
			.max_connections(max_connections)
			.connect(dsn)
			.await
			.map_err(map_sqlx_error)?;

		Ok(Self { pool })
	}

	/// Wraps an existing pool.
	pub fn from_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Applies the embedded schema; safe to run repeatedly.
	pub async fn migrate(&self) -> Result<(), StoreError> {
		sqlx::raw_sql(SCHEMA).execute(&self.pool).await.map_err(map_sqlx_error)?;

		Ok(())
	}

	async fn consume_in_tx(&self, value: &str, now: OffsetDateTime) -> Result<ConsumeOutcome, StoreError> {
		let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
		let row = sqlx::query(&format!(
			"SELECT {TOKEN_COLUMNS} FROM login_tokens WHERE value = $1 FOR UPDATE"
		))
		.bind(value)
		.fetch_optional(&mut *tx)
		.await
		.map_err(map_sqlx_error)?;
		let Some(row) = row else {
			tx.rollback().await.map_err(map_sqlx_error)?;

			return Ok(ConsumeOutcome::NotFound);
		};
		let record = token_from_row(&row)?;
		let (outcome, write) = ConsumeOutcome::decide(&record, now);

		if write {
			sqlx::query("UPDATE login_tokens SET used = TRUE WHERE id = $1")
				.bind(to_db_id(record.id.get())?)
				.execute(&mut *tx)
				.await
				.map_err(map_sqlx_error)?;
		}

		tx.commit().await.map_err(map_sqlx_error)?;

		Ok(outcome)
	}
}
impl AppStore for PgStore {
	fn create_user<'a>(
		&'a self,
		email: &'a EmailAddress,
		now: OffsetDateTime,
	) -> StoreFuture<'a, User> {
		Box::pin(async move {
			let row = sqlx::query(
				"INSERT INTO users (email, created_at, updated_at) VALUES ($1, $2, $2) \
				 RETURNING id, email, created_at, updated_at",
			)
			.bind(email.as_str())
			.bind(now)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx_error)?;

			user_from_row(&row)
		})
	}

	fn find_user_by_email<'a>(&'a self, email: &'a EmailAddress) -> StoreFuture<'a, Option<User>> {
		Box::pin(async move {
			let row = sqlx::query(
				"SELECT id, email, created_at, updated_at FROM users WHERE email = $1",
			)
			.bind(email.as_str())
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx_error)?;

			row.as_ref().map(user_from_row).transpose()
		})
	}

	fn create_token(&self, token: NewLoginToken) -> StoreFuture<'_, LoginToken> {
		Box::pin(async move {
			let row = sqlx::query(&format!(
				"INSERT INTO login_tokens (subject_id, value, expires_at, used, created_at) \
				 VALUES ($1, $2, $3, FALSE, $4) RETURNING {TOKEN_COLUMNS}"
			))
			.bind(to_db_id(token.subject_id.get())?)
			.bind(token.value.expose())
			.bind(token.expires_at)
			.bind(token.created_at)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx_error)?;

			token_from_row(&row)
		})
	}

	fn consume_token<'a>(
		&'a self,
		value: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ConsumeOutcome> {
		Box::pin(self.consume_in_tx(value, now))
	}

	fn delete_expired_tokens(&self, before: OffsetDateTime) -> StoreFuture<'_, u64> {
		Box::pin(async move {
			let result = sqlx::query("DELETE FROM login_tokens WHERE expires_at < $1")
				.bind(before)
				.execute(&self.pool)
				.await
				.map_err(map_sqlx_error)?;

			Ok(result.rows_affected())
		})
	}

	fn create_feedback(&self, feedback: NewFeedback) -> StoreFuture<'_, Feedback> {
		Box::pin(async move {
			let row = sqlx::query(
				"INSERT INTO feedback (subject_id, content, created_at) VALUES ($1, $2, $3) \
				 RETURNING id",
			)
			.bind(to_db_id(feedback.subject_id.get())?)
			.bind(&feedback.content)
			.bind(feedback.created_at)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx_error)?;
			let id = from_db_id(row.try_get("id").map_err(map_sqlx_error)?)?;

			Ok(feedback.into_record(FeedbackId(id)))
		})
	}

	fn count_recent_duplicate_feedback<'a>(
		&'a self,
		subject: SubjectId,
		content: &'a str,
		since: OffsetDateTime,
	) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			let row = sqlx::query(
				"SELECT COUNT(*) AS duplicates FROM feedback \
				 WHERE subject_id = $1 AND content = $2 AND created_at > $3",
			)
			.bind(to_db_id(subject.get())?)
			.bind(content)
			.bind(since)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx_error)?;

			from_db_id(row.try_get("duplicates").map_err(map_sqlx_error)?)
		})
	}
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
	let email: String = row.try_get("email").map_err(map_sqlx_error)?;

	Ok(User {
		id: SubjectId(from_db_id(row.try_get("id").map_err(map_sqlx_error)?)?),
		email: EmailAddress::new(&email)
			.map_err(|e| StoreError::Serialization { message: format!("stored email: {e}") })?,
		created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
		updated_at: row.try_get("updated_at").map_err(map_sqlx_error)?,
	})
}

fn token_from_row(row: &PgRow) -> Result<LoginToken, StoreError> {
	let value: String = row.try_get("value").map_err(map_sqlx_error)?;

	Ok(LoginToken {
		id: TokenId(from_db_id(row.try_get("id").map_err(map_sqlx_error)?)?),
		subject_id: SubjectId(from_db_id(row.try_get("subject_id").map_err(map_sqlx_error)?)?),
		value: Secret::new(value),
		expires_at: row.try_get("expires_at").map_err(map_sqlx_error)?,
		used: row.try_get("used").map_err(map_sqlx_error)?,
		created_at: row.try_get("created_at").map_err(map_sqlx_error)?,
	})
}

fn to_db_id(id: u64) -> Result<i64, StoreError> {
	i64::try_from(id)
		.map_err(|_| StoreError::Serialization { message: format!("identifier {id} exceeds BIGINT") })
}

fn from_db_id(id: i64) -> Result<u64, StoreError> {
	u64::try_from(id)
		.map_err(|_| StoreError::Serialization { message: format!("negative identifier {id}") })
}

fn map_sqlx_error(e: sqlx::Error) -> StoreError {
	match &e {
		sqlx::Error::Database(db) if db.is_unique_violation() =>
			StoreError::Conflict { message: db.message().to_owned() },
		sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) =>
			StoreError::Serialization { message: e.to_string() },
		_ => StoreError::Backend { message: e.to_string() },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_round_trip_through_bigint() {
		assert_eq!(to_db_id(42).and_then(from_db_id), Ok(42));
		assert!(to_db_id(u64::MAX).is_err());
		assert!(from_db_id(-1).is_err());
	}

	#[test]
	fn schema_declares_unique_token_values() {
		assert!(SCHEMA.contains("login_tokens_value_key ON login_tokens (value)"));
		assert!(SCHEMA.contains("users_email_key ON users (email)"));
	}
}
