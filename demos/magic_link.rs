//! Walks a magic link end to end with the in-memory store: request a login link, redeem it for
//! a session credential, replay it, hit the rate limiter, and submit feedback.
//!
//! Settings come from the environment (see `linkauth::config`); every variable has a local
//! default, so `cargo run --example magic_link` works without any setup.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
// self
use linkauth::{
	auth::{ClientIdentity, ResourcePath},
	clock::{Clock, SystemClock},
	config::Settings,
	ext::{
		CredentialSigner, LogNotifier, MailFuture, MailMessage, Mailer, Notifier, WebhookNotifier,
	},
	flows::{FlowSettings, Orchestrator},
	limiter::RateLimiter,
	redemption::ExpirySweeper,
	store::{AppStore, MemoryStore},
};

/// Keeps the last login email so the demo can follow its link.
#[derive(Debug, Default)]
struct InboxMailer(Mutex<Option<MailMessage>>);
impl InboxMailer {
	fn last_link(&self) -> Option<String> {
		let body = self.0.lock().as_ref()?.html_body.clone();
		let start = body.find("token=")? + "token=".len();

		Some(
			body[start..]
				.chars()
				.take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
				.collect(),
		)
	}
}
impl Mailer for InboxMailer {
	fn send<'a>(&'a self, message: &'a MailMessage) -> MailFuture<'a> {
		*self.0.lock() = Some(message.clone());

		Box::pin(async { Ok(()) })
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.init();

	let settings = Settings::from_env()?;
	let store: Arc<dyn AppStore> = Arc::new(MemoryStore::default());
	let clock: Arc<dyn Clock> = Arc::new(SystemClock);
	let mailer = Arc::new(InboxMailer::default());
	let notifier: Arc<dyn Notifier> = match &settings.chat_webhook_url {
		Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
		None => Arc::new(LogNotifier),
	};
	let signer: Arc<dyn CredentialSigner> = Arc::new(settings.signer()?);
	let limiter = Arc::new(RateLimiter::new(settings.rate_limit_config())?);
	let orchestrator = Orchestrator::new(
		store,
		mailer.clone() as Arc<dyn Mailer>,
		signer,
		notifier,
		FlowSettings::from(&settings),
	)
	.with_clock(clock.clone())
	.with_rate_limiter(limiter);
	let sweeper = ExpirySweeper::new(
		orchestrator.protocol().clone(),
		clock,
		settings.token_sweep_interval.unsigned_abs(),
	)
	.spawn();
	let client = ClientIdentity::new("127.0.0.1")?;
	let path = ResourcePath::new("/auth/login")?;

	orchestrator.request_login_from(&client, &path, "demo@example.com").await?;

	let value = mailer.last_link().ok_or_else(|| color_eyre::eyre::eyre!("No login email."))?;
	let session = orchestrator.exchange_token(&value).await?;

	println!("Session issued for subject {} until {}.", session.subject_id, session.expires_at);

	match orchestrator.exchange_token(&value).await {
		Ok(_) => println!("Replay unexpectedly succeeded."),
		Err(e) => println!("Replay rejected: {e}"),
	}

	if orchestrator.settings().deep_link_url.is_some() {
		println!("Mobile redirect: {}.", orchestrator.build_redirect_url(&value)?);
	}

	for attempt in 1..=settings.rate_limit_burst + 1 {
		if let Err(e) = orchestrator.request_login_from(&client, &path, "demo@example.com").await {
			println!("Login request {attempt} throttled: {e}");
		}
	}

	let feedback = orchestrator.submit_feedback(session.subject_id, "Smooth login!").await?;

	println!("Feedback {} stored.", feedback.id);

	sweeper.shutdown().await;

	Ok(())
}
