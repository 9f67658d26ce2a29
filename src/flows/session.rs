// self
use crate::{
	_prelude::*,
	ext::SessionCredential,
	flows::{Orchestrator, conceal, observe},
	obs::FlowKind,
};

impl Orchestrator {
	/// Redeems a login token and signs a session credential for its subject.
	///
	/// Fails with [`Error::TokenNotFound`], [`Error::TokenAlreadyUsed`], or
	/// [`Error::TokenExpired`] for protocol violations. A token is consumed before signing, so
	/// a signing failure still burns it.
	pub async fn exchange_token(&self, value: &str) -> Result<SessionCredential> {
		observe(FlowKind::ExchangeToken, "exchange_token", async {
			let now = self.clock.now();
			let token = self.protocol.consume(value, now).await.map_err(conceal)?;

			self.signer.sign(token.subject_id, now, self.settings.session_ttl).map_err(|e| {
				tracing::error!(subject = %token.subject_id, error = %e, "Session signing failed.");

				Error::unavailable(e)
			})
		})
		.await
	}

	/// Builds the deep-link redirect carrying `value` as its `token` parameter.
	///
	/// Fails with [`Error::Unconfigured`] when no deep-link base is set.
	pub fn build_redirect_url(&self, value: &str) -> Result<Url> {
		self.settings.redirect_url(value)
	}
}
