//! Token secrets and the single credential record owned by the manager.

pub mod secret;
pub mod state;
