//! Identity-provider facing pieces: where to send the refresh grant (descriptor), how to read
//! its failures (strategy), and the client that performs the exchange.
//!
//! `descriptor` exposes the validated token endpoint. `strategy` defines
//! [`ProviderStrategy`], an HTTP-client-agnostic hook used to augment the outgoing grant body
//! and map failed responses into the crate error taxonomy. `client` defines the
//! [`AuthProvider`] seam the lifecycle manager talks to, plus its reqwest realization.

pub mod client;
pub mod descriptor;
pub mod strategy;

pub use client::*;
pub use descriptor::*;
pub use strategy::*;
