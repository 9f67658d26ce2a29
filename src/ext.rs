//! Collaborator contracts the flows depend on (email, chat notifications, credential signing)
//! together with the adapters shipped by the crate.
//!
//! Each contract is a small object-safe trait so services can bring their own mail relay,
//! chat integration, or session format. The bundled adapters cover local development
//! ([`LogMailer`], [`LogNotifier`]), an HTTP chat webhook ([`WebhookNotifier`], behind the
//! default `reqwest` feature), and HS256 JWT session credentials ([`Hs256Signer`]).

pub mod mailer;
pub mod notifier;
pub mod signer;

pub use mailer::*;
pub use notifier::*;
pub use signer::*;
