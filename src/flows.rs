//! Authentication and feedback use cases composed from the redemption protocol, the rate
//! limiter, and the collaborator contracts.
//!
//! [`Orchestrator`] is the surface an HTTP binding calls:
//!
//! - [`Orchestrator::request_login`] / [`Orchestrator::request_login_from`] find or create the
//!   subject, issue a login token, and email the verification link.
//! - [`Orchestrator::exchange_token`] redeems a token for a signed session credential.
//! - [`Orchestrator::build_redirect_url`] points the verification link at the mobile deep link.
//! - [`Orchestrator::submit_feedback`] stores feedback and notifies chat on a best-effort basis.
//!
//! Storage and signing failures surface as [`Error::Unavailable`] so driver messages never
//! reach callers.

mod feedback;
mod login;
mod session;
mod side_channel;
mod template;

pub use side_channel::*;
pub use template::*;

// self
use crate::{
	_prelude::*,
	auth::Secret,
	clock::{Clock, SystemClock},
	config::Settings,
	error::ConfigError,
	ext::{CredentialSigner, Mailer, Notifier},
	limiter::RateLimiter,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	redemption::TokenProtocol,
	store::AppStore,
};

/// Per-deployment knobs consumed by the flows.
#[derive(Clone, Debug)]
pub struct FlowSettings {
	/// Public base URL; login links point at `{app_url}/auth/verify`.
	pub app_url: Url,
	/// Deep-link base for [`Orchestrator::build_redirect_url`]; `None` disables redirects.
	pub deep_link_url: Option<Url>,
	/// Login token lifetime.
	pub login_link_ttl: Duration,
	/// Session credential lifetime.
	pub session_ttl: Duration,
	/// Sender address of login emails.
	pub mail_from: String,
	/// Subject line of login emails.
	pub mail_subject: String,
	/// Login email body template.
	pub login_template: LoginTemplate,
	/// Chat channel that receives feedback notifications.
	pub feedback_channel: String,
	/// Window in which identical feedback from the same subject is rejected.
	pub duplicate_window: Duration,
}
impl FlowSettings {
	const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::minutes(5);
	const DEFAULT_LOGIN_LINK_TTL: Duration = Duration::minutes(15);
	const DEFAULT_SESSION_TTL: Duration = Duration::minutes(120);

	/// Creates settings with default lifetimes and no deep link.
	pub fn new(app_url: Url) -> Self {
		Self {
			app_url,
			deep_link_url: None,
			login_link_ttl: Self::DEFAULT_LOGIN_LINK_TTL,
			session_ttl: Self::DEFAULT_SESSION_TTL,
			mail_from: "noreply@feedback.app".into(),
			mail_subject: "Login to Feedback App".into(),
			login_template: LoginTemplate::default(),
			feedback_channel: "feedbacks".into(),
			duplicate_window: Self::DEFAULT_DUPLICATE_WINDOW,
		}
	}

	/// Sets the deep-link base used for redirects.
	pub fn with_deep_link(mut self, url: Url) -> Self {
		self.deep_link_url = Some(url);

		self
	}

	/// Overrides the login token lifetime.
	pub fn with_login_link_ttl(mut self, ttl: Duration) -> Self {
		self.login_link_ttl = ttl;

		self
	}

	/// Overrides the session credential lifetime.
	pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
		self.session_ttl = ttl;

		self
	}

	/// Replaces the login email template.
	pub fn with_login_template(mut self, template: LoginTemplate) -> Self {
		self.login_template = template;

		self
	}

	/// Overrides the feedback notification channel.
	pub fn with_feedback_channel(mut self, channel: impl Into<String>) -> Self {
		self.feedback_channel = channel.into();

		self
	}

	/// Builds `{app_url}/auth/verify?token=<value>`.
	pub fn verification_link(&self, token: &Secret) -> Result<Url> {
		let mut link = self.app_url.clone();

		link.path_segments_mut()
			.map_err(|_| ConfigError::CannotBeABase { key: "APP_URL" })?
			.pop_if_empty()
			.extend(["auth", "verify"]);
		link.set_query(None);
		link.query_pairs_mut().append_pair("token", token.expose());

		Ok(link)
	}

	/// Sets `token` on the deep-link base, replacing any existing `token` parameter and
	/// keeping every other parameter.
	pub fn redirect_url(&self, value: &str) -> Result<Url> {
		let base = self
			.deep_link_url
			.as_ref()
			.ok_or(Error::Unconfigured { setting: "DEEPLINK_URL" })?;
		let retained = base
			.query_pairs()
			.filter(|(key, _)| key.as_ref() != "token")
			.map(|(key, value)| (key.into_owned(), value.into_owned()))
			.collect::<Vec<_>>();
		let mut url = base.clone();

		url.query_pairs_mut().clear().extend_pairs(retained).append_pair("token", value);

		Ok(url)
	}
}
impl From<&Settings> for FlowSettings {
	fn from(settings: &Settings) -> Self {
		Self {
			app_url: settings.app_url.clone(),
			deep_link_url: settings.deep_link_url.clone(),
			login_link_ttl: settings.login_link_ttl,
			session_ttl: settings.session_ttl,
			mail_from: settings.mail_from.clone(),
			login_template: settings.login_template.clone(),
			feedback_channel: settings.feedback_channel.clone(),
			..Self::new(settings.app_url.clone())
		}
	}
}

/// Entry point for the login, session, and feedback use cases.
///
/// Cheap to clone; every collaborator sits behind an [`Arc`].
#[derive(Clone)]
pub struct Orchestrator {
	store: Arc<dyn AppStore>,
	protocol: TokenProtocol,
	mailer: Arc<dyn Mailer>,
	signer: Arc<dyn CredentialSigner>,
	side_channel: SideChannel,
	clock: Arc<dyn Clock>,
	limiter: Option<Arc<RateLimiter>>,
	settings: FlowSettings,
}
impl Orchestrator {
	/// Wires the collaborators together using the system clock and no rate limiter.
	pub fn new(
		store: Arc<dyn AppStore>,
		mailer: Arc<dyn Mailer>,
		signer: Arc<dyn CredentialSigner>,
		notifier: Arc<dyn Notifier>,
		settings: FlowSettings,
	) -> Self {
		Self {
			protocol: TokenProtocol::new(store.clone()),
			store,
			mailer,
			signer,
			side_channel: SideChannel::new(notifier),
			clock: Arc::new(SystemClock),
			limiter: None,
			settings,
		}
	}

	/// Replaces the time source used by every flow.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Gates [`request_login_from`](Self::request_login_from) behind `limiter`.
	pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
		self.limiter = Some(limiter);

		self
	}

	/// Active flow settings.
	pub fn settings(&self) -> &FlowSettings {
		&self.settings
	}

	/// Token protocol bound to this orchestrator's store.
	pub fn protocol(&self) -> &TokenProtocol {
		&self.protocol
	}

	/// Rate limiter, when one is attached.
	pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
		self.limiter.as_ref()
	}

	/// Delivery counters of the feedback notification side channel.
	pub fn side_channel_metrics(&self) -> &Arc<SideChannelMetrics> {
		self.side_channel.metrics()
	}
}
impl Debug for Orchestrator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Orchestrator")
			.field("settings", &self.settings)
			.field("rate_limited", &self.limiter.is_some())
			.field("side_channel", &self.side_channel)
			.finish()
	}
}

async fn observe<T, F>(kind: FlowKind, stage: &'static str, flow: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	obs::record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(flow).await;

	match &result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			obs::record_flow_outcome(kind, FlowOutcome::Failure);

			tracing::debug!(flow = kind.as_str(), category = %e.kind(), "Flow failed.");
		},
	}

	result
}

// Keeps storage detail out of caller-visible errors.
fn conceal(e: Error) -> Error {
	match e {
		Error::Storage(inner) => {
			tracing::error!(error = %inner, "Storage failure.");

			Error::unavailable(inner)
		},
		other => other,
	}
}
