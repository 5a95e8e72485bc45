//! Credential-domain identifiers, redacted secrets, and the in-memory token state.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{secret::*, state::*};
