//! Login token records and the secret wrapper that carries their values.

pub mod record;
pub mod secret;
