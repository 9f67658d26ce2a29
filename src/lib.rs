//! Passwordless magic-link authentication built around a single-use token redemption protocol,
//! a per-client token-bucket rate limiter, and a small feedback intake with best-effort chat
//! notifications.

#![deny(clippy::all)]
#![warn(missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod ext;
pub mod flows;
pub mod limiter;
pub mod obs;
pub mod redemption;
pub mod store;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixtures shared by unit and integration tests.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		clock::Clock,
		error::TransportError,
		ext::{CredentialSigner, Hs256Signer, MailFuture, MailMessage, Mailer, NotifyFuture, Notifier},
		flows::{FlowSettings, Orchestrator},
		store::{AppStore, MemoryStore},
	};

	/// Signing key used by every test orchestrator.
	pub const TEST_SIGNING_KEY: &str = "test-signing-key-with-enough-entropy";

	/// Clock whose current instant only moves when a test advances it.
	#[derive(Debug)]
	pub struct ManualClock(Mutex<OffsetDateTime>);
	impl ManualClock {
		/// Creates a clock frozen at `start`.
		pub fn new(start: OffsetDateTime) -> Self {
			Self(Mutex::new(start))
		}

		/// Moves the clock forward (or backward for negative durations).
		pub fn advance(&self, delta: Duration) {
			*self.0.lock() += delta;
		}

		/// Pins the clock to an absolute instant.
		pub fn set(&self, instant: OffsetDateTime) {
			*self.0.lock() = instant;
		}
	}
	impl Clock for ManualClock {
		fn now(&self) -> OffsetDateTime {
			*self.0.lock()
		}
	}

	/// Mailer that keeps every message in memory.
	#[derive(Debug, Default)]
	pub struct RecordingMailer(Mutex<Vec<MailMessage>>);
	impl RecordingMailer {
		/// Returns a snapshot of the delivered messages.
		pub fn sent(&self) -> Vec<MailMessage> {
			self.0.lock().clone()
		}
	}
	impl Mailer for RecordingMailer {
		fn send<'a>(&'a self, message: &'a MailMessage) -> MailFuture<'a> {
			self.0.lock().push(message.clone());

			Box::pin(async { Ok(()) })
		}
	}

	/// Mailer that rejects every message with a transport failure.
	#[derive(Debug, Default)]
	pub struct FailingMailer;
	impl Mailer for FailingMailer {
		fn send<'a>(&'a self, _message: &'a MailMessage) -> MailFuture<'a> {
			Box::pin(async {
				Err(TransportError::Rejected { message: "relay refused the recipient".into() })
			})
		}
	}

	/// Notifier that records `(channel, message)` pairs.
	#[derive(Debug, Default)]
	pub struct RecordingNotifier(Mutex<Vec<(String, String)>>);
	impl RecordingNotifier {
		/// Returns a snapshot of the posted messages.
		pub fn posts(&self) -> Vec<(String, String)> {
			self.0.lock().clone()
		}
	}
	impl Notifier for RecordingNotifier {
		fn post<'a>(&'a self, channel: &'a str, message: &'a str) -> NotifyFuture<'a> {
			self.0.lock().push((channel.to_owned(), message.to_owned()));

			Box::pin(async { Ok(()) })
		}
	}

	/// Notifier that always fails and counts how often it was called.
	#[derive(Debug, Default)]
	pub struct FailingNotifier(AtomicUsize);
	impl FailingNotifier {
		/// Number of post attempts observed.
		pub fn attempts(&self) -> usize {
			self.0.load(Ordering::SeqCst)
		}
	}
	impl Notifier for FailingNotifier {
		fn post<'a>(&'a self, _channel: &'a str, _message: &'a str) -> NotifyFuture<'a> {
			self.0.fetch_add(1, Ordering::SeqCst);

			Box::pin(async {
				Err(TransportError::Rejected { message: "chat webhook unavailable".into() })
			})
		}
	}

	/// Fixed instant used as the starting point of test clocks.
	pub fn test_epoch() -> OffsetDateTime {
		time::macros::datetime!(2025-06-01 12:00 UTC)
	}

	/// Flow settings pointing at local test URLs.
	pub fn test_flow_settings() -> FlowSettings {
		FlowSettings::new(
			Url::parse("https://feedback.test").expect("Test app URL should parse."),
		)
		.with_deep_link(
			Url::parse("exp://127.0.0.1:8081/--/auth/callback")
				.expect("Test deep link URL should parse."),
		)
	}

	/// Pieces of a test orchestrator that tests commonly inspect.
	#[derive(Debug)]
	pub struct TestHarness {
		/// Orchestrator under test.
		pub orchestrator: Orchestrator,
		/// Backing in-memory store.
		pub store: Arc<MemoryStore>,
		/// Captured outbound email.
		pub mailer: Arc<RecordingMailer>,
		/// Captured chat notifications.
		pub notifier: Arc<RecordingNotifier>,
		/// Controllable clock shared by every component.
		pub clock: Arc<ManualClock>,
		/// Signer used to mint and verify session credentials.
		pub signer: Arc<Hs256Signer>,
	}

	/// Builds an orchestrator backed by an in-memory store, recording collaborators, and a
	/// manual clock starting at [`test_epoch`].
	pub fn build_test_orchestrator(settings: FlowSettings) -> TestHarness {
		let store = Arc::new(MemoryStore::default());
		let mailer = Arc::new(RecordingMailer::default());
		let notifier = Arc::new(RecordingNotifier::default());
		let clock = Arc::new(ManualClock::new(test_epoch()));
		let signer = Arc::new(
			Hs256Signer::new(TEST_SIGNING_KEY).expect("Test signing key should be accepted."),
		);
		let orchestrator = Orchestrator::new(
			store.clone() as Arc<dyn AppStore>,
			mailer.clone() as Arc<dyn Mailer>,
			signer.clone() as Arc<dyn CredentialSigner>,
			notifier.clone() as Arc<dyn Notifier>,
			settings,
		)
		.with_clock(clock.clone() as Arc<dyn Clock>);

		TestHarness { orchestrator, store, mailer, notifier, clock, signer }
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, testcontainers as _, tracing_subscriber as _};
