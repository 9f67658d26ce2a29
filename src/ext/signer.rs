//! Session credential contract and the HS256 JWT implementation.
//!
//! [`Hs256Signer`] produces compact JWS tokens carrying `sub`, `user_id`, `iat`, and `exp`
//! claims. [`Hs256Signer::verify`] is the counterpart an auth middleware calls: it checks the
//! MAC in constant time, rejects any algorithm other than HS256, and treats `exp` as the
//! first invalid second.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{
	_prelude::*,
	auth::{Secret, SubjectId},
};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Errors raised while minting or verifying session credentials.
#[derive(Debug, ThisError)]
pub enum SignerError {
	/// The signing key is empty.
	#[error("Signing key must not be empty.")]
	EmptyKey,
	/// The token is not a three-part compact JWS.
	#[error("Session token is malformed.")]
	Malformed,
	/// The header names an algorithm other than HS256.
	#[error("Session token algorithm `{0}` is not accepted.")]
	UnsupportedAlgorithm(String),
	/// The MAC does not match.
	#[error("Session token signature is invalid.")]
	BadSignature,
	/// The token is past its `exp` claim.
	#[error("Session token has expired.")]
	Expired,
	/// The lifetime pushes `exp` outside the supported date range.
	#[error("Session lifetime is outside the supported date range.")]
	ExpiryOutOfRange,
	/// Claims could not be encoded or decoded.
	#[error("Session token claims are invalid.")]
	Claims(#[from] serde_json::Error),
}

/// Signed session credential handed back after a successful token exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCredential {
	/// Encoded credential (a JWT for [`Hs256Signer`]).
	pub token: Secret,
	/// Subject the credential authenticates.
	pub subject_id: SubjectId,
	/// Issue instant.
	pub issued_at: OffsetDateTime,
	/// Instant after which the credential is rejected.
	pub expires_at: OffsetDateTime,
}

/// Capability that mints session credentials.
pub trait CredentialSigner
where
	Self: Send + Sync,
{
	/// Signs a credential for `subject`, valid for `ttl` from `issued_at`.
	fn sign(
		&self,
		subject: SubjectId,
		issued_at: OffsetDateTime,
		ttl: Duration,
	) -> Result<SessionCredential, SignerError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
	alg: String,
	typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
	sub: String,
	user_id: u64,
	iat: i64,
	exp: i64,
}

/// HMAC-SHA256 JWT signer.
#[derive(Clone, Debug)]
pub struct Hs256Signer {
	key: Secret,
}
impl Hs256Signer {
	/// Creates a signer from a shared secret.
	pub fn new(key: impl Into<String>) -> Result<Self, SignerError> {
		let key = Secret::new(key);

		if key.is_empty() {
			return Err(SignerError::EmptyKey);
		}

		Ok(Self { key })
	}

	/// Verifies `token` at `now` and returns the subject it authenticates.
	pub fn verify(&self, token: &str, now: OffsetDateTime) -> Result<SubjectId, SignerError> {
		let mut parts = token.split('.');
		let (Some(header_segment), Some(payload_segment), Some(signature_segment), None) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Err(SignerError::Malformed);
		};
		let header: Header = serde_json::from_slice(&decode_segment(header_segment)?)?;

		if header.alg != ALGORITHM {
			return Err(SignerError::UnsupportedAlgorithm(header.alg));
		}

		let signature = decode_segment(signature_segment)?;
		let mut mac = self.mac()?;

		mac.update(header_segment.as_bytes());
		mac.update(b".");
		mac.update(payload_segment.as_bytes());
		mac.verify_slice(&signature).map_err(|_| SignerError::BadSignature)?;

		let claims: Claims = serde_json::from_slice(&decode_segment(payload_segment)?)?;

		if now.unix_timestamp() >= claims.exp {
			return Err(SignerError::Expired);
		}

		Ok(SubjectId(claims.user_id))
	}

	fn mac(&self) -> Result<HmacSha256, SignerError> {
		HmacSha256::new_from_slice(self.key.expose().as_bytes()).map_err(|_| SignerError::EmptyKey)
	}
}
impl CredentialSigner for Hs256Signer {
	fn sign(
		&self,
		subject: SubjectId,
		issued_at: OffsetDateTime,
		ttl: Duration,
	) -> Result<SessionCredential, SignerError> {
		let expires_at = issued_at.checked_add(ttl).ok_or(SignerError::ExpiryOutOfRange)?;
		let header = Header { alg: ALGORITHM.into(), typ: "JWT".into() };
		let claims = Claims {
			sub: subject.to_string(),
			user_id: subject.get(),
			iat: issued_at.unix_timestamp(),
			exp: expires_at.unix_timestamp(),
		};
		let signing_input = format!(
			"{}.{}",
			URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
			URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
		);
		let mut mac = self.mac()?;

		mac.update(signing_input.as_bytes());

		let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

		Ok(SessionCredential {
			token: Secret::new(format!("{signing_input}.{signature}")),
			subject_id: subject,
			issued_at,
			expires_at,
		})
	}
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, SignerError> {
	URL_SAFE_NO_PAD.decode(segment).map_err(|_| SignerError::Malformed)
}
