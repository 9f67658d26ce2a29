// self
use linkauth::{
	_preludet::*,
	auth::{ClientIdentity, EmailAddress, ResourcePath},
	clock::Clock,
	error::{ErrorKind, TransportError},
	ext::{CredentialSigner, Hs256Signer, Mailer, Notifier},
	flows::Orchestrator,
	limiter::{RateLimitConfig, RateLimiter},
	store::{AppStore, MemoryStore},
};

fn token_from_body(body: &str) -> String {
	let start = body.find("token=").expect("Login email should contain the token parameter.") + 6;

	body[start..]
		.chars()
		.take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
		.collect()
}

async fn request_and_capture(harness: &TestHarness, email: &str) -> String {
	harness.orchestrator.request_login(email).await.expect("Login request should succeed.");

	let sent = harness.mailer.sent();
	let message = sent.last().expect("A login email should have been sent.");

	token_from_body(&message.html_body)
}

#[tokio::test]
async fn request_login_emails_a_verification_link() {
	let harness = build_test_orchestrator(test_flow_settings());

	harness
		.orchestrator
		.request_login("Reader@Example.com")
		.await
		.expect("Login request should succeed.");

	let sent = harness.mailer.sent();

	assert_eq!(sent.len(), 1);

	let message = &sent[0];

	assert_eq!(message.to.as_str(), "reader@example.com");
	assert_eq!(message.subject, "Login to Feedback App");
	assert_eq!(message.from, "noreply@feedback.app");
	assert!(message.html_body.contains("https://feedback.test/auth/verify?token="));
	assert!(message.html_body.contains("15 minutes"));

	let value = token_from_body(&message.html_body);
	let stored = harness.store.token(&value).expect("Issued token should be stored.");

	assert_eq!(value.len(), 43);
	assert!(!stored.used);
	assert_eq!(stored.expires_at, test_epoch() + Duration::minutes(15));
}

#[tokio::test]
async fn repeated_requests_reuse_the_same_subject() {
	let harness = build_test_orchestrator(test_flow_settings());
	let first = request_and_capture(&harness, "repeat@example.com").await;
	let second = request_and_capture(&harness, "REPEAT@example.com").await;

	assert_ne!(first, second);
	assert_eq!(harness.store.token_count(), 2);

	let user = harness
		.store
		.find_user_by_email(
			&EmailAddress::new("repeat@example.com").expect("Email fixture should be valid."),
		)
		.await
		.expect("User lookup should succeed.")
		.expect("User should have been created on first request.");
	let first_token = harness.store.token(&first).expect("First token should be stored.");
	let second_token = harness.store.token(&second).expect("Second token should be stored.");

	assert_eq!(first_token.subject_id, user.id);
	assert_eq!(second_token.subject_id, user.id);
}

#[tokio::test]
async fn malformed_email_is_rejected_before_any_side_effect() {
	let harness = build_test_orchestrator(test_flow_settings());

	for email in ["", "no-at-sign", "two words@example.com"] {
		let err = harness
			.orchestrator
			.request_login(email)
			.await
			.expect_err("Malformed email should be rejected.");

		assert_eq!(err.kind(), ErrorKind::BadRequest);
	}

	assert!(harness.mailer.sent().is_empty());
	assert_eq!(harness.store.token_count(), 0);
}

#[tokio::test]
async fn mail_failure_surfaces_as_transport_error() {
	let store = Arc::new(MemoryStore::default());
	let signer =
		Arc::new(Hs256Signer::new(TEST_SIGNING_KEY).expect("Test signing key should be accepted."));
	let orchestrator = Orchestrator::new(
		store.clone() as Arc<dyn AppStore>,
		Arc::new(FailingMailer) as Arc<dyn Mailer>,
		signer as Arc<dyn CredentialSigner>,
		Arc::new(RecordingNotifier::default()) as Arc<dyn Notifier>,
		test_flow_settings(),
	);
	let err = orchestrator
		.request_login("bounce@example.com")
		.await
		.expect_err("Delivery failure should be reported.");

	assert!(matches!(
		&err,
		Error::Transport(TransportError::Rejected { message }) if message == "login email could not be delivered"
	));
	assert!(!err.to_string().contains("relay refused"));
	// The token was issued before delivery failed and simply expires unused.
	assert_eq!(store.token_count(), 1);
}

#[tokio::test]
async fn rate_limited_requests_are_throttled_per_client() {
	let harness = build_test_orchestrator(test_flow_settings());
	let limiter = RateLimiter::new(RateLimitConfig::new(1, Duration::seconds(5)))
		.expect("Limiter config should be valid.")
		.with_clock(harness.clock.clone() as Arc<dyn Clock>);
	let orchestrator = harness.orchestrator.clone().with_rate_limiter(Arc::new(limiter));
	let path = ResourcePath::new("/auth/login").expect("Path fixture should be valid.");
	let client = ClientIdentity::new("203.0.113.50").expect("Client fixture should be valid.");
	let other = ClientIdentity::new("203.0.113.51").expect("Client fixture should be valid.");

	orchestrator
		.request_login_from(&client, &path, "limited@example.com")
		.await
		.expect("First request should pass the limiter.");

	let err = orchestrator
		.request_login_from(&client, &path, "limited@example.com")
		.await
		.expect_err("Second request inside the interval should be throttled.");

	assert!(
		matches!(err, Error::QuotaExceeded { retry_after } if retry_after == Duration::seconds(5))
	);

	orchestrator
		.request_login_from(&other, &path, "limited@example.com")
		.await
		.expect("A different client has its own budget.");

	harness.clock.advance(Duration::seconds(5));

	orchestrator
		.request_login_from(&client, &path, "limited@example.com")
		.await
		.expect("The budget should refill after the interval.");

	assert_eq!(harness.mailer.sent().len(), 3);
}

#[tokio::test]
async fn exchange_token_issues_a_verifiable_session() {
	let harness = build_test_orchestrator(test_flow_settings());
	let value = request_and_capture(&harness, "session@example.com").await;

	harness.clock.advance(Duration::minutes(3));

	let credential =
		harness.orchestrator.exchange_token(&value).await.expect("Exchange should succeed.");
	let issued = harness.store.token(&value).expect("Redeemed token should remain stored.");

	assert!(issued.used);
	assert_eq!(credential.subject_id, issued.subject_id);
	assert_eq!(credential.issued_at, harness.clock.now());
	assert_eq!(credential.expires_at, harness.clock.now() + Duration::minutes(120));
	assert_eq!(
		harness
			.signer
			.verify(credential.token.expose(), harness.clock.now())
			.expect("Session credential should verify."),
		issued.subject_id
	);

	let err = harness
		.orchestrator
		.exchange_token(&value)
		.await
		.expect_err("A token must not be redeemed twice.");

	assert_eq!(err.kind(), ErrorKind::AlreadyUsed);
}

#[tokio::test]
async fn exchange_token_rejects_expired_and_unknown_values() {
	let harness = build_test_orchestrator(test_flow_settings());
	let value = request_and_capture(&harness, "late@example.com").await;

	harness.clock.advance(Duration::minutes(16));

	let expired = harness
		.orchestrator
		.exchange_token(&value)
		.await
		.expect_err("An expired token should be rejected.");
	let unknown = harness
		.orchestrator
		.exchange_token("nonexistent-token")
		.await
		.expect_err("An unknown token should be rejected.");

	assert!(matches!(expired, Error::TokenExpired));
	assert!(matches!(unknown, Error::TokenNotFound));
}

#[tokio::test]
async fn redirect_points_at_the_deep_link() {
	let harness = build_test_orchestrator(test_flow_settings());
	let url = harness
		.orchestrator
		.build_redirect_url("abc123")
		.expect("Redirect should build with a deep link configured.");

	assert_eq!(url.as_str(), "exp://127.0.0.1:8081/--/auth/callback?token=abc123");
	// Building the redirect never consumes anything.
	assert_eq!(harness.store.token_count(), 0);
}

#[tokio::test]
async fn unrepresentable_lifetimes_fail_without_panicking() {
	let harness = build_test_orchestrator(
		test_flow_settings().with_login_link_ttl(Duration::minutes(1_000_000_000_000)),
	);
	let err = harness
		.orchestrator
		.request_login("far@example.com")
		.await
		.expect_err("A login link that never expires cannot be issued.");

	assert_eq!(err.kind(), ErrorKind::Unavailable);
	assert!(harness.mailer.sent().is_empty());

	let harness =
		build_test_orchestrator(test_flow_settings().with_session_ttl(Duration::MAX));
	let value = request_and_capture(&harness, "forever@example.com").await;
	let err = harness
		.orchestrator
		.exchange_token(&value)
		.await
		.expect_err("A session that never expires cannot be signed.");

	assert_eq!(err.kind(), ErrorKind::Unavailable);
}
