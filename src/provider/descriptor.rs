//! Validated identity-provider endpoint metadata.

// std
use std::net::IpAddr;
// self
use crate::{_prelude::*, error::ConfigError};

/// Refresh-grant endpoint used when none is configured.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.workos.com/user_management/authenticate";

/// Immutable provider descriptor consumed by
/// [`HttpAuthProvider`](crate::provider::HttpAuthProvider).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Endpoint that accepts `grant_type=refresh_token` exchanges.
	pub token_endpoint: Url,
}
impl ProviderDescriptor {
	/// Validates and wraps the token endpoint.
	///
	/// HTTPS is mandatory because the request body carries the refresh token; plain HTTP is
	/// accepted only for loopback hosts.
	pub fn new(token_endpoint: Url) -> Result<Self, ConfigError> {
		validate_endpoint("token", &token_endpoint)?;

		Ok(Self { token_endpoint })
	}

	/// Parses and validates the token endpoint.
	pub fn parse(token_endpoint: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(token_endpoint)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;

		Self::new(url)
	}
}

/// Rejects non-HTTPS endpoints unless they point at the local machine.
pub(crate) fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.is_ok_and(|ip| ip.is_loopback()),
		None => false,
	}
}
