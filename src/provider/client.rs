//! Refresh-grant exchange against the identity provider.
//!
//! [`AuthProvider`] is the seam the lifecycle manager depends on; [`HttpAuthProvider`] is the
//! reqwest realization that speaks the provider's JSON grant protocol.

// crates.io
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata},
	provider::{
		DefaultProviderStrategy, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

/// Boxed future returned by [`AuthProvider`] operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::hours(1);

/// Parsed result of a successful refresh exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the provider returned one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of `access_token` relative to the moment the response arrived.
	pub expires_in: Duration,
}

/// Identity-provider client able to exchange a refresh token.
pub trait AuthProvider
where
	Self: Send + Sync,
{
	/// Exchanges `refresh_token` for a new access token.
	///
	/// Errors keep their internal classification so the caller can log and record them.
	fn exchange_refresh<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
		client_id: &'a ClientId,
	) -> ProviderFuture<'a, RefreshGrant>;
}

#[derive(Deserialize)]
struct GrantResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

#[derive(Default, Deserialize)]
struct ErrorResponse {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

/// [`AuthProvider`] that POSTs a JSON refresh grant to the descriptor's token endpoint.
#[derive(Clone)]
pub struct HttpAuthProvider {
	descriptor: ProviderDescriptor,
	http_client: ReqwestHttpClient,
	strategy: Arc<dyn ProviderStrategy>,
}
impl HttpAuthProvider {
	/// Creates a provider client with [`DefaultProviderStrategy`].
	pub fn new(descriptor: ProviderDescriptor, http_client: ReqwestHttpClient) -> Self {
		Self { descriptor, http_client, strategy: Arc::new(DefaultProviderStrategy) }
	}

	/// Swaps the error-classification and request-decoration strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Descriptor the client targets.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	fn grant_body(
		&self,
		refresh_token: &TokenSecret,
		client_id: &ClientId,
	) -> BTreeMap<String, String> {
		let mut body = BTreeMap::new();

		body.insert("client_id".into(), client_id.to_string());
		body.insert("grant_type".into(), "refresh_token".into());
		body.insert("refresh_token".into(), refresh_token.expose().to_owned());
		self.strategy.augment_refresh_request(&mut body);

		body
	}

	async fn exchange(
		&self,
		refresh_token: &TokenSecret,
		client_id: &ClientId,
	) -> Result<RefreshGrant> {
		let fingerprint = refresh_token.fingerprint();
		let response = self
			.http_client
			.post(self.descriptor.token_endpoint.clone())
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.json(&self.grant_body(refresh_token, client_id))
			.send()
			.await
			.map_err(|e| {
				tracing::warn!(
					refresh_token = %fingerprint,
					error = %e,
					"Token endpoint could not be reached."
				);

				map_send_error(e)
			})?;
		let status = response.status();
		let meta = ResponseMetadata::capture(status, response.headers());
		let bytes = response.bytes().await.map_err(|e| {
			tracing::warn!(
				refresh_token = %fingerprint,
				status = status.as_u16(),
				error = %e,
				"Token endpoint response body could not be read."
			);

			map_send_error(e)
		})?;

		if !status.is_success() {
			return Err(self.map_failure(&bytes, &meta, &fingerprint));
		}

		parse_grant(&bytes).inspect_err(|e| {
			tracing::error!(
				refresh_token = %fingerprint,
				status = status.as_u16(),
				error = %e,
				"Token endpoint returned an unusable grant."
			);
		})
	}

	fn map_failure(&self, body: &[u8], meta: &ResponseMetadata, fingerprint: &str) -> Error {
		let parsed = serde_json::from_slice::<ErrorResponse>(body).unwrap_or_default();
		let mut ctx = ProviderErrorContext::new().with_body_preview(body);

		if let Some(status) = meta.status {
			ctx = ctx.with_http_status(status);
		}
		if let Some(error) = parsed.error.as_deref() {
			ctx = ctx.with_oauth_error(error);
		}
		if let Some(description) = parsed.error_description.as_deref() {
			ctx = ctx.with_error_description(description);
		}

		let preview = ctx.body_preview.clone().unwrap_or_default();
		let message = match (&parsed.error, &parsed.error_description) {
			(_, Some(description)) =>
				format!("token endpoint returned an OAuth error: {description}"),
			(Some(error), None) => format!("token endpoint returned an OAuth error: {error}"),
			(None, None) =>
				format!("token endpoint returned HTTP {}", meta.status.unwrap_or_default()),
		};

		match self.strategy.classify_token_error(&ctx) {
			ProviderErrorKind::InvalidGrant => {
				tracing::error!(
					refresh_token = %fingerprint,
					status = meta.status,
					body = %preview,
					"Provider rejected the refresh token; an operator reset is required."
				);

				Error::InvalidGrant { reason: message }
			},
			ProviderErrorKind::InvalidClient => {
				tracing::error!(
					refresh_token = %fingerprint,
					status = meta.status,
					body = %preview,
					"Provider rejected the client identifier; check the configured client id."
				);

				Error::InvalidClient { reason: message }
			},
			ProviderErrorKind::Transient => {
				tracing::warn!(
					refresh_token = %fingerprint,
					status = meta.status,
					body = %preview,
					"Token endpoint failed temporarily."
				);

				TransientError::TokenEndpoint {
					message,
					status: meta.status,
					retry_after: meta.retry_after,
				}
				.into()
			},
		}
	}
}
impl Debug for HttpAuthProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpAuthProvider")
			.field("descriptor", &self.descriptor)
			.field("http_client", &self.http_client)
			.finish_non_exhaustive()
	}
}
impl AuthProvider for HttpAuthProvider {
	fn exchange_refresh<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
		client_id: &'a ClientId,
	) -> ProviderFuture<'a, RefreshGrant> {
		Box::pin(self.exchange(refresh_token, client_id))
	}
}

fn map_send_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Timeout.into();
	}

	TransportError::from(err).into()
}

fn parse_grant(body: &[u8]) -> Result<RefreshGrant> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let parsed: GrantResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| Error::MalformedResponse { reason: format!("invalid grant payload: {e}") })?;
	let access_token = parsed
		.access_token
		.and_then(TokenSecret::non_empty)
		.ok_or_else(|| Error::MalformedResponse { reason: "missing access_token".into() })?;
	let expires_in = match parsed.expires_in {
		None => DEFAULT_EXPIRES_IN,
		Some(secs) if secs > 0 => Duration::seconds(secs),
		Some(secs) =>
			return Err(Error::MalformedResponse {
				reason: format!("expires_in must be positive, got {secs}"),
			}),
	};

	Ok(RefreshGrant {
		access_token,
		refresh_token: parsed.refresh_token.and_then(TokenSecret::non_empty),
		expires_in,
	})
}
