// self
use crate::{
	_prelude::*,
	auth::{ClientIdentity, EmailAddress, ResourcePath, User},
	error::TransportError,
	ext::MailMessage,
	flows::{Orchestrator, conceal, observe},
	limiter::RateLimitDecision,
	obs::FlowKind,
};

impl Orchestrator {
	/// Emails a single-use login link to `email`, creating the subject on first use.
	///
	/// Callers get the same errors whether or not the address was already registered; the
	/// extra insert on first use still makes that path measurably slower.
	pub async fn request_login(&self, email: &str) -> Result<()> {
		observe(FlowKind::RequestLogin, "request_login", self.send_login_link(email)).await
	}

	/// Rate-limited form of [`request_login`](Self::request_login), keyed by the caller's
	/// network identity and the endpoint path.
	///
	/// Without an attached limiter this is identical to `request_login`.
	pub async fn request_login_from(
		&self,
		client: &ClientIdentity,
		path: &ResourcePath,
		email: &str,
	) -> Result<()> {
		let decision =
			self.limiter.as_ref().map(|limiter| limiter.check_at(client, path, self.clock.now()));

		if let Some(RateLimitDecision::Delay(directive)) = decision {
			return Err(Error::QuotaExceeded { retry_after: directive.recommended_backoff });
		}

		self.request_login(email).await
	}

	async fn send_login_link(&self, email: &str) -> Result<()> {
		let email = EmailAddress::new(email)?;
		let now = self.clock.now();
		let user = self.find_or_create_user(&email, now).await?;
		let token =
			self.protocol.issue(user.id, self.settings.login_link_ttl, now).await.map_err(conceal)?;
		let link = self.settings.verification_link(&token.value)?;
		let message = MailMessage {
			from: self.settings.mail_from.clone(),
			to: email,
			subject: self.settings.mail_subject.clone(),
			html_body: self
				.settings
				.login_template
				.render(&link, self.settings.login_link_ttl.whole_minutes()),
		};

		self.mailer.send(&message).await.map_err(|e| {
			tracing::warn!(subject = %user.id, error = %e, "Login email delivery failed.");

			Error::Transport(TransportError::Rejected {
				message: "login email could not be delivered".into(),
			})
		})
	}

	async fn find_or_create_user(&self, email: &EmailAddress, now: OffsetDateTime) -> Result<User> {
		if let Some(user) = self.store.find_user_by_email(email).await.map_err(Error::unavailable)? {
			return Ok(user);
		}

		match self.store.create_user(email, now).await {
			Ok(user) => Ok(user),
			// Lost a race with a concurrent request for the same address.
			Err(e) if e.is_conflict() => self
				.store
				.find_user_by_email(email)
				.await
				.map_err(Error::unavailable)?
				.ok_or_else(|| Error::unavailable(e)),
			Err(e) => Err(Error::unavailable(e)),
		}
	}
}
