//! Outbound email contract.

// self
use crate::{_prelude::*, auth::EmailAddress, error::TransportError};

/// Boxed future returned by [`Mailer::send`].
pub type MailFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + 'a + Send>>;

/// Rendered email ready for delivery.
#[derive(Clone, PartialEq, Eq)]
pub struct MailMessage {
	/// Sender address.
	pub from: String,
	/// Recipient.
	pub to: EmailAddress,
	/// Subject line.
	pub subject: String,
	/// HTML body. Login emails embed a live token, so the body must never be logged.
	pub html_body: String,
}
impl Debug for MailMessage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MailMessage")
			.field("from", &self.from)
			.field("to", &self.to)
			.field("subject", &self.subject)
			.field("html_body_len", &self.html_body.len())
			.finish()
	}
}

/// Email delivery capability.
pub trait Mailer
where
	Self: Send + Sync,
{
	/// Delivers `message`, failing with [`TransportError`] when the relay refuses it.
	fn send<'a>(&'a self, message: &'a MailMessage) -> MailFuture<'a>;
}

/// Mailer that only records deliveries in the log, for local development.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;
impl Mailer for LogMailer {
	fn send<'a>(&'a self, message: &'a MailMessage) -> MailFuture<'a> {
		tracing::info!(to = %message.to, subject = %message.subject, "Email accepted by log mailer.");

		Box::pin(async { Ok(()) })
	}
}
