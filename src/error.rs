//! Crate-level error types shared across the redemption protocol, limiter, stores, and flows.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Outbound delivery failure (email, chat).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No login token with the presented value exists.
	#[error("Login token is invalid.")]
	TokenNotFound,
	/// The login token was already redeemed.
	#[error("Login token has already been used.")]
	TokenAlreadyUsed,
	/// The login token outlived its expiry instant.
	#[error("Login token has expired.")]
	TokenExpired,
	/// The caller exhausted its request budget for this resource.
	#[error("Rate limit exceeded; retry in {retry_after}.")]
	QuotaExceeded {
		/// Time until the next permit becomes available.
		retry_after: Duration,
	},
	/// A required setting is absent.
	#[error("The {setting} setting is not configured.")]
	Unconfigured {
		/// Name of the missing setting.
		setting: &'static str,
	},
	/// Email address failed validation.
	#[error("Email address is invalid.")]
	InvalidEmail(#[from] crate::auth::IdentifierError),
	/// Feedback content was empty.
	#[error("Feedback content is required.")]
	InvalidFeedback,
	/// The same subject submitted identical feedback inside the duplicate window.
	#[error("Duplicate feedback submission prevented.")]
	DuplicateFeedback,
	/// Internal failure hidden behind a generic message; the source keeps the detail for logs.
	#[error("The request could not be processed.")]
	Unavailable {
		/// Underlying failure.
		#[source]
		source: BoxError,
	},
}
impl Error {
	/// Wraps an internal failure so its message never reaches callers.
	pub fn unavailable(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Unavailable { source: Box::new(src) }
	}

	/// Returns the caller-visible category of the error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::TokenNotFound => ErrorKind::Invalid,
			Error::TokenAlreadyUsed => ErrorKind::AlreadyUsed,
			Error::TokenExpired => ErrorKind::Expired,
			Error::QuotaExceeded { .. } => ErrorKind::Throttled,
			Error::Unconfigured { .. } | Error::Config(_) => ErrorKind::Unconfigured,
			Error::DuplicateFeedback => ErrorKind::Conflict,
			Error::InvalidEmail(_) | Error::InvalidFeedback => ErrorKind::BadRequest,
			Error::Transport(_) => ErrorKind::Transport,
			Error::Storage(_) | Error::Unavailable { .. } => ErrorKind::Unavailable,
		}
	}
}

/// Stable categories the binding layer maps onto responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Unknown or malformed token.
	Invalid,
	/// Token redeemed before.
	AlreadyUsed,
	/// Token past its expiry.
	Expired,
	/// Rate limit hit.
	Throttled,
	/// Missing or invalid configuration.
	Unconfigured,
	/// Conflicting submission.
	Conflict,
	/// Malformed caller input.
	BadRequest,
	/// Outbound delivery failed.
	Transport,
	/// Internal failure.
	Unavailable,
}
impl ErrorKind {
	/// Returns a stable label suitable for logs or response bodies.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Invalid => "invalid",
			ErrorKind::AlreadyUsed => "already_used",
			ErrorKind::Expired => "expired",
			ErrorKind::Throttled => "throttled",
			ErrorKind::Unconfigured => "unconfigured",
			ErrorKind::Conflict => "conflict",
			ErrorKind::BadRequest => "bad_request",
			ErrorKind::Transport => "transport",
			ErrorKind::Unavailable => "unavailable",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A numeric variable could not be parsed.
	#[error("{key} must be an integer, got `{value}`.")]
	InvalidNumber {
		/// Environment variable name.
		key: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// A URL variable could not be parsed.
	#[error("{key} is not a valid URL.")]
	InvalidUrl {
		/// Environment variable name.
		key: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A base URL cannot carry path segments (e.g. `mailto:`).
	#[error("{key} cannot be used as a base URL.")]
	CannotBeABase {
		/// Environment variable or setting name.
		key: &'static str,
	},
	/// The JWT signing secret is empty.
	#[error("JWT_SECRET must be set.")]
	MissingJwtSecret,
	/// The default JWT secret was kept in production.
	#[error("JWT_SECRET must be set to a non-default value in production.")]
	DefaultJwtSecretInProduction,
	/// A duration setting was zero or negative.
	#[error("{key} must be greater than zero.")]
	NonPositive {
		/// Environment variable or setting name.
		key: &'static str,
	},
	/// A numeric setting exceeds its supported maximum.
	#[error("{key} must be at most {max}.")]
	TooLarge {
		/// Environment variable name.
		key: &'static str,
		/// Largest accepted value.
		max: i64,
	},
	/// Rate limiter parameters are inconsistent.
	#[error("Rate limiter configuration is invalid: {reason}.")]
	InvalidRateLimit {
		/// Human-readable reason.
		reason: &'static str,
	},
	/// The login template file could not be read.
	#[error("Login template {path} could not be read.")]
	TemplateRead {
		/// Template path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// The login template is malformed.
	#[error(transparent)]
	Template(#[from] crate::flows::TemplateError),
	/// The signing key was rejected.
	#[error(transparent)]
	Signer(#[from] crate::ext::SignerError),
}

/// Outbound delivery failures (email relay, chat webhook).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying client reported a network failure.
	#[error("Network error occurred while delivering a message.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The remote end refused the message.
	#[error("Message delivery was rejected: {message}.")]
	Rejected {
		/// Remote or adapter supplied reason.
		message: String,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while delivering a message.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn unavailable_hides_message_but_keeps_source() {
		let inner = StoreError::Backend { message: "connection reset by peer".into() };
		let err = Error::unavailable(inner);

		assert_eq!(err.to_string(), "The request could not be processed.");
		assert_eq!(err.kind(), ErrorKind::Unavailable);

		let source = StdError::source(&err).expect("Unavailable should expose its source.");

		assert!(source.to_string().contains("connection reset by peer"));
	}

	#[test]
	fn protocol_errors_map_to_distinct_kinds() {
		assert_eq!(Error::TokenNotFound.kind(), ErrorKind::Invalid);
		assert_eq!(Error::TokenAlreadyUsed.kind(), ErrorKind::AlreadyUsed);
		assert_eq!(Error::TokenExpired.kind(), ErrorKind::Expired);
		assert_eq!(
			Error::QuotaExceeded { retry_after: Duration::seconds(5) }.kind().as_str(),
			"throttled"
		);
	}
}
