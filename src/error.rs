//! Credential-core error types shared across the provider client, stores, and manager.
//!
//! Internally every failure keeps enough structure to be logged and classified
//! (see [`FailureKind`]). At the public manager boundary they all collapse into
//! [`AuthError::Unavailable`] because none of them are actionable by a request
//! handler; recovery goes through the administrative reset path instead.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical internal error raised by provider clients, stores, and configuration.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the next call retries.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Provider rejected the refresh token (consumed, revoked, or rotated out of band).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or client-supplied reason string.
		reason: String,
	},
	/// Provider rejected the client identifier.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or client-supplied reason string.
		reason: String,
	},
	/// Token endpoint answered 2xx but the payload is unusable.
	#[error("Token endpoint returned a malformed response: {reason}.")]
	MalformedResponse {
		/// What was wrong with the payload.
		reason: String,
	},
}
impl Error {
	/// Classifies the error into the operator-facing failure taxonomy.
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::Storage(_) => FailureKind::Persistence,
			Self::Config(_) => FailureKind::Configuration,
			Self::Transient(_) | Self::Transport(_) => FailureKind::Transient,
			Self::InvalidGrant { .. }
			| Self::InvalidClient { .. }
			| Self::MalformedResponse { .. } => FailureKind::Rejection,
		}
	}
}

/// Operator-facing failure categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// Baseline credentials or local settings are missing or invalid.
	Configuration,
	/// Network failure, timeout, or provider-side outage.
	Transient,
	/// Provider refused the exchange; needs an operator reset.
	Rejection,
	/// Durable write of the rotated state failed.
	Persistence,
}
impl FailureKind {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FailureKind::Configuration => "configuration",
			FailureKind::Transient => "transient",
			FailureKind::Rejection => "rejection",
			FailureKind::Persistence => "persistence",
		}
	}
}
impl Display for FailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// The only error surfaced by [`TokenManager`](crate::TokenManager) operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// No usable upstream credential could be produced.
	#[error("Unable to obtain an upstream access token.")]
	Unavailable,
}
impl From<Error> for AuthError {
	fn from(_: Error) -> Self {
		Self::Unavailable
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// An endpoint URL could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// A header value contains characters HTTP does not allow.
	#[error("The {name} header value is invalid.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
		/// Underlying validation failure.
		#[source]
		source: reqwest::header::InvalidHeaderValue,
	},
	/// A numeric setting could not be parsed.
	#[error("The {key} setting must be a positive integer, got `{value}`.")]
	InvalidNumber {
		/// Setting key.
		key: &'static str,
		/// Raw value supplied.
		value: String,
	},
	/// Both persistence strategies were configured at once.
	#[error("File and remote persistence are mutually exclusive; configure only one.")]
	ConflictingPersistence,
	/// No refresh token is available for the exchange.
	#[error("No refresh token is configured.")]
	MissingRefreshToken,
	/// No client identifier is available for the exchange.
	#[error("No client identifier is configured.")]
	MissingClientId,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry on the next call).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider answered with a retryable failure (429, 5xx, `temporarily_unavailable`).
	#[error("Token endpoint returned a retryable failure: {message}.")]
	TokenEndpoint {
		/// Provider- or client-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// The request did not complete within the configured timeout.
	#[error("Request to the token endpoint timed out.")]
	Timeout,
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
