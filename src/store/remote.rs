//! [`TokenStore`] that writes the rotated refresh token into a platform-managed variable.
//!
//! The platform injects its variables into the process environment at start, so the
//! value written here becomes the next run's baseline refresh token. Reading it back
//! mid-process is never needed, which is why [`TokenStore::load`] always yields `None`.

// self
use crate::{
	_prelude::*,
	auth::{EnvironmentId, ServiceId, TokenSecret, VariableName},
	error::ConfigError,
	http::{self, ReqwestHttpClient},
	store::{Durability, PersistedState, StoreError, StoreFuture, StoreKind, TokenStore},
};

/// Default GraphQL endpoint of the platform configuration API.
pub const DEFAULT_PLATFORM_API_URL: &str = "https://backboard.railway.app/graphql/v2";

const VARIABLE_UPSERT: &str =
	"mutation($input: VariableUpsertInput!) { variableUpsert(input: $input) }";

/// Credentials and coordinates for the platform configuration API.
///
/// These are independent of the identity provider's credentials.
#[derive(Clone, Debug)]
pub struct RemoteStoreConfig {
	/// GraphQL endpoint.
	pub api_url: Url,
	/// Bearer credential for the platform API.
	pub api_token: TokenSecret,
	/// Environment that owns the variable.
	pub environment_id: EnvironmentId,
	/// Service that owns the variable.
	pub service_id: ServiceId,
	/// Variable overwritten with each rotated refresh token.
	pub variable: VariableName,
}
impl RemoteStoreConfig {
	/// Builds a config that targets [`DEFAULT_PLATFORM_API_URL`].
	pub fn new(
		api_token: TokenSecret,
		environment_id: EnvironmentId,
		service_id: ServiceId,
		variable: VariableName,
	) -> Result<Self, ConfigError> {
		let api_url = Url::parse(DEFAULT_PLATFORM_API_URL)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "platform API", source })?;

		Ok(Self { api_url, api_token, environment_id, service_id, variable })
	}

	/// Overrides the GraphQL endpoint.
	pub fn with_api_url(mut self, api_url: Url) -> Self {
		self.api_url = api_url;

		self
	}
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
	query: &'static str,
	variables: UpsertVariables<'a>,
}

#[derive(Serialize)]
struct UpsertVariables<'a> {
	input: UpsertInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertInput<'a> {
	environment_id: &'a str,
	service_id: &'a str,
	name: &'a str,
	value: &'a str,
}

#[derive(Deserialize)]
struct GraphQlReply {
	#[serde(default)]
	errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
	#[serde(default)]
	message: String,
}

/// Pushes rotated refresh tokens to the platform configuration API.
#[derive(Clone, Debug)]
pub struct RemoteStore {
	http_client: ReqwestHttpClient,
	config: RemoteStoreConfig,
}
impl RemoteStore {
	/// Creates a store that issues mutations through `http_client`.
	pub fn new(config: RemoteStoreConfig, http_client: ReqwestHttpClient) -> Self {
		Self { http_client, config }
	}

	/// Target coordinates.
	pub fn config(&self) -> &RemoteStoreConfig {
		&self.config
	}

	fn request_body<'a>(&'a self, refresh_token: &'a TokenSecret) -> UpsertRequest<'a> {
		UpsertRequest {
			query: VARIABLE_UPSERT,
			variables: UpsertVariables {
				input: UpsertInput {
					environment_id: &self.config.environment_id,
					service_id: &self.config.service_id,
					name: &self.config.variable,
					value: refresh_token.expose(),
				},
			},
		}
	}

	async fn upsert(&self, refresh_token: &TokenSecret) -> Result<(), StoreError> {
		let response = self
			.http_client
			.post(self.config.api_url.clone())
			.bearer_auth(self.config.api_token.expose())
			.json(&self.request_body(refresh_token))
			.send()
			.await
			.map_err(|e| StoreError::Backend {
				message: format!("Platform API request failed: {e}"),
			})?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(|e| StoreError::Backend {
			message: format!("Platform API response could not be read: {e}"),
		})?;

		if !status.is_success() {
			return Err(StoreError::Backend {
				message: format!(
					"Platform API returned HTTP {}: {}",
					status.as_u16(),
					http::body_preview(&bytes)
				),
			});
		}

		let reply: GraphQlReply =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Platform API response is not valid JSON: {e}"),
			})?;

		if let Some(errors) = reply.errors.filter(|errors| !errors.is_empty()) {
			let joined =
				errors.iter().map(|error| error.message.as_str()).collect::<Vec<_>>().join("; ");

			return Err(StoreError::Backend {
				message: format!("Platform API rejected the variable update: {joined}"),
			});
		}

		tracing::info!(
			variable = %self.config.variable,
			refresh_token = %refresh_token.fingerprint(),
			"Persisted rotated refresh token to platform configuration."
		);

		Ok(())
	}
}
impl TokenStore for RemoteStore {
	fn kind(&self) -> StoreKind {
		StoreKind::Remote
	}

	fn durability(&self) -> Durability {
		Durability::RefreshTokenOnly
	}

	fn load(&self) -> StoreFuture<'_, Option<PersistedState>> {
		Box::pin(async { Ok(None) })
	}

	fn save<'a>(&'a self, state: &'a PersistedState) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.upsert(&state.refresh_token).await })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			tracing::debug!(
				variable = %self.config.variable,
				"Platform variable doubles as baseline; nothing to clear."
			);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn store() -> RemoteStore {
		let config = RemoteStoreConfig::new(
			TokenSecret::new("platform-token"),
			EnvironmentId::new("env-1").expect("Environment fixture should be valid."),
			ServiceId::new("svc-1").expect("Service fixture should be valid."),
			VariableName::new("UPSTREAM_REFRESH_TOKEN").expect("Variable fixture should be valid."),
		)
		.expect("Default platform URL should parse.");
		let http_client =
			ReqwestHttpClient::new().expect("Default HTTP client should build in tests.");

		RemoteStore::new(config, http_client)
	}

	#[test]
	fn upsert_body_matches_the_platform_schema() {
		let store = store();
		let secret = TokenSecret::new("rt-new");
		let body = serde_json::to_value(store.request_body(&secret))
			.expect("Upsert request should serialize.");

		assert_eq!(
			body,
			serde_json::json!({
				"query": VARIABLE_UPSERT,
				"variables": {
					"input": {
						"environmentId": "env-1",
						"serviceId": "svc-1",
						"name": "UPSTREAM_REFRESH_TOKEN",
						"value": "rt-new",
					}
				}
			})
		);
	}

	#[test]
	fn remote_store_keeps_only_the_refresh_token() {
		let store = store();

		assert_eq!(store.kind(), StoreKind::Remote);
		assert_eq!(store.durability(), Durability::RefreshTokenOnly);
		assert_eq!(store.config().api_url.as_str(), DEFAULT_PLATFORM_API_URL);
	}
}
