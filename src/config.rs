//! Validated configuration for building a [`TokenManager`](crate::TokenManager).
//!
//! Values are captured once at construction. [`ManagerConfig::from_env`] reads the process
//! environment; [`ManagerConfig::from_lookup`] accepts any key lookup so callers (and tests) can
//! feed values from elsewhere.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::header::HeaderValue;
// self
use crate::{
	_prelude::*,
	auth::{ClientId, EnvironmentId, ServiceId, TokenSecret, VariableName},
	error::ConfigError,
	http,
	provider::{DEFAULT_TOKEN_ENDPOINT, descriptor},
	store::RemoteStoreConfig,
};

/// Baseline refresh token.
pub const ENV_REFRESH_TOKEN: &str = "UPSTREAM_REFRESH_TOKEN";
/// Provider client identifier.
pub const ENV_CLIENT_ID: &str = "UPSTREAM_CLIENT_ID";
/// Refresh-grant endpoint override.
pub const ENV_TOKEN_ENDPOINT: &str = "UPSTREAM_TOKEN_ENDPOINT";
/// `User-Agent` presented to the upstream document API.
pub const ENV_USER_AGENT: &str = "UPSTREAM_USER_AGENT";
/// `X-Client-Version` presented to the upstream document API.
pub const ENV_CLIENT_VERSION: &str = "UPSTREAM_CLIENT_VERSION";
/// Request timeout in whole seconds.
pub const ENV_HTTP_TIMEOUT_SECS: &str = "AUTH_HTTP_TIMEOUT_SECS";
/// Path of the local state file; enables file persistence.
pub const ENV_STATE_FILE: &str = "TOKEN_STATE_FILE";
/// Platform API bearer credential.
pub const ENV_PLATFORM_API_TOKEN: &str = "PLATFORM_API_TOKEN";
/// Platform environment identifier.
pub const ENV_PLATFORM_ENVIRONMENT_ID: &str = "PLATFORM_ENVIRONMENT_ID";
/// Platform service identifier.
pub const ENV_PLATFORM_SERVICE_ID: &str = "PLATFORM_SERVICE_ID";
/// Platform GraphQL endpoint override.
pub const ENV_PLATFORM_API_URL: &str = "PLATFORM_API_URL";
/// Name of the platform variable that receives rotated refresh tokens.
pub const ENV_PLATFORM_VARIABLE: &str = "PLATFORM_REFRESH_TOKEN_VARIABLE";

/// Header name carrying the client version.
pub const CLIENT_VERSION_HEADER: &str = "x-client-version";

/// Credentials the manager is seeded from and falls back to on reset.
///
/// Either value may be absent; the manager then stays unusable until a reset supplies them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BaselineConfig {
	/// Refresh token issued out of band by the operator.
	pub refresh_token: Option<TokenSecret>,
	/// Client identifier registered with the provider.
	pub client_id: Option<ClientId>,
}
impl BaselineConfig {
	/// Creates a complete baseline.
	pub fn new(refresh_token: TokenSecret, client_id: ClientId) -> Self {
		Self { refresh_token: Some(refresh_token), client_id: Some(client_id) }
	}

	/// Builds a baseline from raw values, treating blank strings as absent.
	pub fn from_values(
		refresh_token: Option<&str>,
		client_id: Option<&str>,
	) -> Result<Self, ConfigError> {
		let refresh_token = refresh_token.and_then(TokenSecret::non_empty);
		let client_id = client_id
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.map(ClientId::new)
			.transpose()?;

		Ok(Self { refresh_token, client_id })
	}

	/// Returns `true` when both values are present.
	pub fn is_complete(&self) -> bool {
		self.refresh_token.is_some() && self.client_id.is_some()
	}
}

/// Identity headers attached to every upstream request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientProfile {
	user_agent: Option<HeaderValue>,
	client_version: Option<HeaderValue>,
}
impl ClientProfile {
	/// Creates an empty profile.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the `User-Agent` value.
	pub fn with_user_agent(mut self, value: &str) -> Result<Self, ConfigError> {
		self.user_agent = Some(
			HeaderValue::from_str(value)
				.map_err(|source| ConfigError::InvalidHeader { name: "User-Agent", source })?,
		);

		Ok(self)
	}

	/// Sets the `X-Client-Version` value.
	pub fn with_client_version(mut self, value: &str) -> Result<Self, ConfigError> {
		self.client_version = Some(
			HeaderValue::from_str(value)
				.map_err(|source| ConfigError::InvalidHeader { name: "X-Client-Version", source })?,
		);

		Ok(self)
	}

	/// Configured `User-Agent`, if any.
	pub fn user_agent(&self) -> Option<&HeaderValue> {
		self.user_agent.as_ref()
	}

	/// Configured `X-Client-Version`, if any.
	pub fn client_version(&self) -> Option<&HeaderValue> {
		self.client_version.as_ref()
	}
}

/// Which durable backend keeps the rotated refresh token.
#[derive(Clone, Debug, Default)]
pub enum PersistenceConfig {
	/// No persistence; rotations are lost on restart.
	#[default]
	Disabled,
	/// Local JSON file.
	File {
		/// Path of the state file.
		path: PathBuf,
	},
	/// Platform configuration variable.
	Remote(RemoteStoreConfig),
}

/// Everything needed to build a [`TokenManager`](crate::TokenManager).
#[derive(Clone, Debug)]
pub struct ManagerConfig {
	/// Seed credentials.
	pub baseline: BaselineConfig,
	/// Refresh-grant endpoint.
	pub token_endpoint: Url,
	/// Timeout applied to every outbound request.
	pub http_timeout: StdDuration,
	/// Selected persistence backend.
	pub persistence: PersistenceConfig,
	/// Identity headers for the upstream API.
	pub client_profile: ClientProfile,
}
impl ManagerConfig {
	/// Creates a config with defaults for everything but the baseline.
	pub fn new(baseline: BaselineConfig) -> Result<Self, ConfigError> {
		let token_endpoint = Url::parse(DEFAULT_TOKEN_ENDPOINT)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;

		Ok(Self {
			baseline,
			token_endpoint,
			http_timeout: http::DEFAULT_TIMEOUT,
			persistence: PersistenceConfig::Disabled,
			client_profile: ClientProfile::default(),
		})
	}

	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads the configuration through `lookup`; blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| {
			lookup(key).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
		};
		let baseline = BaselineConfig::from_values(
			get(ENV_REFRESH_TOKEN).as_deref(),
			get(ENV_CLIENT_ID).as_deref(),
		)?;
		let mut config = Self::new(baseline)?;

		if let Some(endpoint) = get(ENV_TOKEN_ENDPOINT) {
			config.token_endpoint = parse_endpoint("token", &endpoint)?;
		}
		if let Some(raw) = get(ENV_HTTP_TIMEOUT_SECS) {
			config.http_timeout = parse_timeout(&raw)?;
		}
		if let Some(user_agent) = get(ENV_USER_AGENT) {
			config.client_profile = config.client_profile.with_user_agent(&user_agent)?;
		}
		if let Some(version) = get(ENV_CLIENT_VERSION) {
			config.client_profile = config.client_profile.with_client_version(&version)?;
		}

		let file = get(ENV_STATE_FILE).map(PathBuf::from);
		let remote = match (
			get(ENV_PLATFORM_API_TOKEN),
			get(ENV_PLATFORM_ENVIRONMENT_ID),
			get(ENV_PLATFORM_SERVICE_ID),
		) {
			(Some(api_token), Some(environment_id), Some(service_id)) => {
				let variable =
					get(ENV_PLATFORM_VARIABLE).unwrap_or_else(|| ENV_REFRESH_TOKEN.into());
				let mut remote = RemoteStoreConfig::new(
					TokenSecret::new(api_token),
					EnvironmentId::new(environment_id)?,
					ServiceId::new(service_id)?,
					VariableName::new(variable)?,
				)?;

				if let Some(api_url) = get(ENV_PLATFORM_API_URL) {
					remote = remote.with_api_url(parse_endpoint("platform API", &api_url)?);
				}

				Some(remote)
			},
			(None, None, None) => None,
			_ => {
				tracing::warn!(
					"Platform credentials are incomplete; remote persistence stays off."
				);

				None
			},
		};

		config.persistence = match (file, remote) {
			(Some(_), Some(_)) => return Err(ConfigError::ConflictingPersistence),
			(Some(path), None) => PersistenceConfig::File { path },
			(None, Some(remote)) => PersistenceConfig::Remote(remote),
			(None, None) => PersistenceConfig::Disabled,
		};

		Ok(config)
	}

	/// Overrides the token endpoint.
	pub fn with_token_endpoint(mut self, token_endpoint: Url) -> Self {
		self.token_endpoint = token_endpoint;

		self
	}

	/// Overrides the request timeout.
	pub fn with_http_timeout(mut self, timeout: StdDuration) -> Self {
		self.http_timeout = timeout;

		self
	}

	/// Overrides the persistence backend.
	pub fn with_persistence(mut self, persistence: PersistenceConfig) -> Self {
		self.persistence = persistence;

		self
	}

	/// Overrides the client identity headers.
	pub fn with_client_profile(mut self, client_profile: ClientProfile) -> Self {
		self.client_profile = client_profile;

		self
	}
}

fn parse_endpoint(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw)
		.map_err(|source| ConfigError::InvalidEndpoint { endpoint: name, source })?;

	descriptor::validate_endpoint(name, &url)?;

	Ok(url)
}

fn parse_timeout(raw: &str) -> Result<StdDuration, ConfigError> {
	match raw.parse::<u64>() {
		Ok(secs) if secs > 0 => Ok(StdDuration::from_secs(secs)),
		_ => Err(ConfigError::InvalidNumber { key: ENV_HTTP_TIMEOUT_SECS, value: raw.to_owned() }),
	}
}
