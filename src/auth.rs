//! Auth-domain identifiers, subjects, and login token models.

pub mod id;
pub mod subject;
pub mod token;

pub use id::*;
pub use subject::*;
pub use token::{record::*, secret::*};
