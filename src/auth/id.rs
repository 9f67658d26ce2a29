//! Strongly typed identifiers enforced across the authentication domain.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

macro_rules! def_numeric_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub u64);
		impl $name {
			/// Returns the raw numeric value.
			pub const fn get(self) -> u64 {
				self.0
			}
		}
		impl From<u64> for $name {
			fn from(value: u64) -> Self {
				Self(value)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				Display::fmt(&self.0, f)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 256;
const EMAIL_MAX_LEN: usize = 254;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, resource, email).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (client, resource, email).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (client, resource, email).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// The email address does not have a `local@domain` shape.
	#[error("Email identifier is malformed.")]
	MalformedEmail,
}

def_id! { ClientIdentity, "Network identity of a caller (typically its IP address).", "Client" }
def_id! { ResourcePath, "Endpoint path a rate limit applies to.", "Resource" }

def_numeric_id! { SubjectId, "Identity a login token authenticates.", "Subject" }
def_numeric_id! { TokenId, "Storage identifier of a login token.", "Token" }
def_numeric_id! { FeedbackId, "Storage identifier of a feedback entry.", "Feedback" }

/// Normalized email address used to find or create subjects.
///
/// Addresses are lowercased so lookups behave the same regardless of how the caller typed
/// them.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);
impl EmailAddress {
	/// Validates and normalizes an address.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_email(view)?;

		Ok(Self(view.to_ascii_lowercase()))
	}

	/// Returns the normalized address.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for EmailAddress {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<EmailAddress> for String {
	fn from(value: EmailAddress) -> Self {
		value.0
	}
}
impl TryFrom<String> for EmailAddress {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for EmailAddress {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Email({})", self.0)
	}
}
impl Display for EmailAddress {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for EmailAddress {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

fn validate_email(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Email";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind: KIND });
	}
	if view.len() > EMAIL_MAX_LEN {
		return Err(IdentifierError::TooLong { kind: KIND, max: EMAIL_MAX_LEN });
	}

	let (local, domain) = view.split_once('@').ok_or(IdentifierError::MalformedEmail)?;

	if local.is_empty()
		|| domain.is_empty()
		|| domain.contains('@')
		|| domain.starts_with('.')
		|| domain.ends_with('.')
		|| domain.contains("..")
	{
		return Err(IdentifierError::MalformedEmail);
	}

	Ok(())
}
