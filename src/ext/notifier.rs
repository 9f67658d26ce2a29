//! Chat notification contract and adapters.

// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`Notifier::post`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + 'a + Send>>;

/// Chat posting capability.
///
/// Callers treat delivery as best effort; see [`SideChannel`](crate::flows::SideChannel).
pub trait Notifier
where
	Self: Send + Sync,
{
	/// Posts `message` to `channel`.
	fn post<'a>(&'a self, channel: &'a str, message: &'a str) -> NotifyFuture<'a>;
}

/// Notifier that writes messages to the log instead of a chat service.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;
impl Notifier for LogNotifier {
	fn post<'a>(&'a self, channel: &'a str, message: &'a str) -> NotifyFuture<'a> {
		tracing::info!(channel, message, "Chat notification.");

		Box::pin(async { Ok(()) })
	}
}

/// Notifier that posts `{"channel": .., "text": ..}` JSON to an incoming-webhook URL.
///
/// Any non-success status is reported as [`TransportError::Rejected`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
	client: ReqwestClient,
	endpoint: Url,
}
#[cfg(feature = "reqwest")]
impl WebhookNotifier {
	/// Creates a notifier with a default reqwest client.
	pub fn new(endpoint: Url) -> Self {
		Self::with_client(ReqwestClient::default(), endpoint)
	}

	/// Reuses an existing reqwest client.
	pub fn with_client(client: ReqwestClient, endpoint: Url) -> Self {
		Self { client, endpoint }
	}

	/// Webhook target.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
#[cfg(feature = "reqwest")]
impl Notifier for WebhookNotifier {
	fn post<'a>(&'a self, channel: &'a str, message: &'a str) -> NotifyFuture<'a> {
		Box::pin(async move {
			let payload = serde_json::json!({ "channel": channel, "text": message });
			let response = self.client.post(self.endpoint.clone()).json(&payload).send().await?;
			let status = response.status();

			if !status.is_success() {
				return Err(TransportError::Rejected {
					message: format!("chat webhook responded with status {}", status.as_u16()),
				});
			}

			Ok(())
		})
	}
}
