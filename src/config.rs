//! Environment-driven configuration.
//!
//! [`Settings::from_env`] reads the process environment; [`Settings::from_lookup`] accepts any
//! lookup function so callers (and tests) can supply values without touching the environment.
//! Unset or empty variables fall back to their defaults, except `DEEPLINK_URL`, where an empty
//! value explicitly disables redirects. Malformed values are reported, never silently replaced.

// std
use std::fs;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::ConfigError,
	ext::Hs256Signer,
	flows::LoginTemplate,
	limiter::RateLimitConfig,
};

const DEFAULT_JWT_SECRET: &str = "super-secret-key";
const MAX_MINUTES: i64 = 525_600;
const MAX_SECONDS: i64 = MAX_MINUTES * 60;
const MAX_BURST: i64 = 100_000;
const DEFAULT_APP_URL: &str = "http://localhost:8080";
const DEFAULT_DEEP_LINK_URL: &str = "exp://127.0.0.1:8081/--/auth/callback";

/// Fully resolved service configuration.
#[derive(Clone, Debug)]
pub struct Settings {
	/// Deployment environment name (`APP_ENV`).
	pub app_env: String,
	/// Listen address for the HTTP binding (`SERVER_PORT`).
	pub listen_addr: String,
	/// Database connection string (`DATABASE_DSN` or the `DB_*` parts).
	pub database_dsn: Secret,
	/// Session signing key (`JWT_SECRET`).
	pub jwt_secret: Secret,
	/// Session credential lifetime (`JWT_TOKEN_EXPIRE_MINUTES`).
	pub session_ttl: Duration,
	/// Login token lifetime (`LOGIN_LINK_EXPIRE_MINUTES`).
	pub login_link_ttl: Duration,
	/// Time to regain one login request permit (`RATE_LIMIT`, seconds).
	pub rate_limit_interval: Duration,
	/// Login request burst size (`RATE_LIMIT_BURST`).
	pub rate_limit_burst: u32,
	/// Idle time before a limiter bucket is evicted (`RATE_LIMIT_ENTRY_TTL_SECONDS`).
	pub rate_limit_entry_ttl: Duration,
	/// Spacing between expired token sweeps (`TOKEN_SWEEP_SECONDS`).
	pub token_sweep_interval: Duration,
	/// Public base URL used in login links (`APP_URL`).
	pub app_url: Url,
	/// Mobile deep-link base for redirects (`DEEPLINK_URL`); `None` disables redirects.
	pub deep_link_url: Option<Url>,
	/// Sender address for login emails (`MAIL_FROM`).
	pub mail_from: String,
	/// Login email template (`LOGIN_TEMPLATE_PATH`, built-in when unset).
	pub login_template: LoginTemplate,
	/// Incoming-webhook URL for chat notifications (`CHAT_WEBHOOK_URL`).
	pub chat_webhook_url: Option<Url>,
	/// Channel feedback notifications are posted to (`FEEDBACK_CHANNEL`).
	pub feedback_channel: String,
}
impl Settings {
	/// Loads settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Loads settings through `lookup`, which returns the raw value for a variable name.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let env = Lookup(&lookup);
		let app_env = env.string("APP_ENV", "development");
		let jwt_secret = match lookup("JWT_SECRET") {
			Some(value) if value.is_empty() => return Err(ConfigError::MissingJwtSecret),
			Some(value) => Secret::new(value),
			None => Secret::new(DEFAULT_JWT_SECRET),
		};

		if app_env.eq_ignore_ascii_case("production") && jwt_secret.expose() == DEFAULT_JWT_SECRET {
			return Err(ConfigError::DefaultJwtSecretInProduction);
		}

		let deep_link_url = match lookup("DEEPLINK_URL") {
			Some(value) if value.is_empty() => None,
			Some(value) => Some(parse_url("DEEPLINK_URL", &value)?),
			None => Some(parse_url("DEEPLINK_URL", DEFAULT_DEEP_LINK_URL)?),
		};
		let app_url = parse_url("APP_URL", &env.string("APP_URL", DEFAULT_APP_URL))?;

		if app_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase { key: "APP_URL" });
		}

		let chat_webhook_url =
			env.optional("CHAT_WEBHOOK_URL").map(|raw| parse_url("CHAT_WEBHOOK_URL", &raw)).transpose()?;
		let login_template = match env.optional("LOGIN_TEMPLATE_PATH") {
			Some(path) => {
				let source = fs::read_to_string(&path)
					.map_err(|source| ConfigError::TemplateRead { path, source })?;

				LoginTemplate::parse(&source)?
			},
			None => LoginTemplate::default(),
		};
		let settings = Self {
			listen_addr: env.string("SERVER_PORT", ":8080"),
			database_dsn: database_dsn(&env)?,
			jwt_secret,
			session_ttl: env.minutes("JWT_TOKEN_EXPIRE_MINUTES", 120)?,
			login_link_ttl: env.minutes("LOGIN_LINK_EXPIRE_MINUTES", 15)?,
			rate_limit_interval: env.seconds("RATE_LIMIT", 5)?,
			rate_limit_burst: u32::try_from(env.positive("RATE_LIMIT_BURST", 1, MAX_BURST)?)
				.map_err(|_| ConfigError::TooLarge { key: "RATE_LIMIT_BURST", max: MAX_BURST })?,
			rate_limit_entry_ttl: env.seconds("RATE_LIMIT_ENTRY_TTL_SECONDS", 600)?,
			token_sweep_interval: env.seconds("TOKEN_SWEEP_SECONDS", 300)?,
			app_url,
			deep_link_url,
			mail_from: env.string("MAIL_FROM", "noreply@feedback.app"),
			login_template,
			chat_webhook_url,
			feedback_channel: env.string("FEEDBACK_CHANNEL", "feedbacks"),
			app_env,
		};

		settings.rate_limit_config().validate()?;

		Ok(settings)
	}

	/// Returns `true` when running with `APP_ENV=production`.
	pub fn is_production(&self) -> bool {
		self.app_env.eq_ignore_ascii_case("production")
	}

	/// Limiter parameters for the login endpoint.
	pub fn rate_limit_config(&self) -> RateLimitConfig {
		RateLimitConfig::new(self.rate_limit_burst, self.rate_limit_interval)
			.with_entry_ttl(self.rate_limit_entry_ttl)
	}

	/// Builds the session signer from `JWT_SECRET`.
	pub fn signer(&self) -> Result<Hs256Signer, ConfigError> {
		Ok(Hs256Signer::new(self.jwt_secret.expose())?)
	}
}
impl From<&Settings> for RateLimitConfig {
	fn from(settings: &Settings) -> Self {
		settings.rate_limit_config()
	}
}

struct Lookup<'a, F>(&'a F);
impl<F> Lookup<'_, F>
where
	F: Fn(&str) -> Option<String>,
{
	fn optional(&self, key: &str) -> Option<String> {
		(self.0)(key).filter(|value| !value.is_empty())
	}

	fn string(&self, key: &str, default: &str) -> String {
		self.optional(key).unwrap_or_else(|| default.to_owned())
	}

	fn positive(&self, key: &'static str, default: i64, max: i64) -> Result<i64, ConfigError> {
		let value = match self.optional(key) {
			Some(raw) => raw
				.trim()
				.parse::<i64>()
				.map_err(|_| ConfigError::InvalidNumber { key, value: raw.clone() })?,
			None => default,
		};

		if value <= 0 {
			return Err(ConfigError::NonPositive { key });
		}
		if value > max {
			return Err(ConfigError::TooLarge { key, max });
		}

		Ok(value)
	}

	fn minutes(&self, key: &'static str, default: i64) -> Result<Duration, ConfigError> {
		Ok(Duration::minutes(self.positive(key, default, MAX_MINUTES)?))
	}

	fn seconds(&self, key: &'static str, default: i64) -> Result<Duration, ConfigError> {
		Ok(Duration::seconds(self.positive(key, default, MAX_SECONDS)?))
	}
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { key, source })
}

fn database_dsn<F>(env: &Lookup<'_, F>) -> Result<Secret, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(dsn) = env.optional("DATABASE_DSN") {
		return Ok(Secret::new(dsn));
	}

	let port = env.string("DB_PORT", "5432");
	let port = port
		.parse::<u16>()
		.map_err(|_| ConfigError::InvalidNumber { key: "DB_PORT", value: port.clone() })?;
	let host = env.string("DB_HOST", "127.0.0.1");
	let mut url = parse_url("DB_HOST", &format!("postgres://{host}"))?;
	let built = url.set_port(Some(port)).is_ok()
		&& url.set_username(&env.string("DB_USER", "root")).is_ok()
		&& url.set_password(Some(&env.string("DB_PASSWORD", "root"))).is_ok();

	if !built {
		return Err(ConfigError::CannotBeABase { key: "DB_HOST" });
	}

	url.set_path(&env.string("DB_NAME", "feedback_app"));

	Ok(Secret::new(String::from(url)))
}
