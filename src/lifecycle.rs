//! Token lifecycle manager: expiry checks, single-flight refresh, rotation capture, and
//! delegated persistence for the single upstream service credential.
//!
//! Valid tokens are served from a read lock without touching the refresh lock. When the token
//! is missing or inside the expiry buffer, callers queue on one async lock; whoever gets it first
//! runs the exchange, and everyone who observed the same refresh generation adopts that flight's
//! outcome instead of spending the (single-use) refresh token again.

mod headers;
mod metrics;
mod refresh;
mod reset;
mod status;

pub use self::metrics::RefreshMetrics;
pub use status::{FailureNote, TokenHealth};

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenState},
	config::{BaselineConfig, ClientProfile, ManagerConfig, PersistenceConfig},
	error::AuthError,
	http::ReqwestHttpClient,
	provider::{AuthProvider, HttpAuthProvider, ProviderDescriptor},
	store::{FileStore, RemoteStore, StoreKind, TokenStore},
};

/// Owns the credential state for one upstream service account.
///
/// Share it behind an [`Arc`]; every operation takes `&self`.
pub struct TokenManager {
	provider: Arc<dyn AuthProvider>,
	store: Option<Arc<dyn TokenStore>>,
	profile: ClientProfile,
	baseline: RwLock<BaselineConfig>,
	state: RwLock<TokenState>,
	refresh_guard: AsyncMutex<()>,
	generation: AtomicU64,
	notes: Mutex<status::HealthNotes>,
	metrics: Arc<RefreshMetrics>,
}
impl TokenManager {
	/// Starts building a manager around `provider` and the seed credentials.
	pub fn builder(
		provider: Arc<dyn AuthProvider>,
		baseline: BaselineConfig,
	) -> TokenManagerBuilder {
		TokenManagerBuilder { provider, baseline, store: None, profile: ClientProfile::default() }
	}

	/// Wires the reqwest provider client, the selected store, and the baseline together.
	pub async fn from_config(config: ManagerConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.http_timeout)?;
		let descriptor = ProviderDescriptor::new(config.token_endpoint)?;
		let provider = Arc::new(HttpAuthProvider::new(descriptor, http_client.clone()));
		let store: Option<Arc<dyn TokenStore>> = match config.persistence {
			PersistenceConfig::Disabled => None,
			PersistenceConfig::File { path } => Some(Arc::new(FileStore::new(path))),
			PersistenceConfig::Remote(remote) =>
				Some(Arc::new(RemoteStore::new(remote, http_client))),
		};
		let mut builder =
			Self::builder(provider, config.baseline).with_client_profile(config.client_profile);

		if let Some(store) = store {
			builder = builder.with_store(store);
		}

		Ok(builder.build().await)
	}

	/// Returns an access token that stays valid beyond the expiry buffer, refreshing if needed.
	pub async fn get_valid_token(&self) -> Result<TokenSecret, AuthError> {
		let observed = self.generation.load(Ordering::Acquire);

		if let Some(token) = self.current_token() {
			return Ok(token);
		}

		self.refresh_flight(observed, "get_valid_token").await?;

		self.current_token().ok_or(AuthError::Unavailable)
	}

	/// Returns `true` when there is no access token or it is within the expiry buffer.
	pub fn is_expired(&self) -> bool {
		self.state.read().is_expired_at(OffsetDateTime::now_utc())
	}

	/// Snapshot of the current credential state.
	pub fn state(&self) -> TokenState {
		self.state.read().clone()
	}

	/// Baseline the manager falls back to on reset.
	pub fn baseline(&self) -> BaselineConfig {
		self.baseline.read().clone()
	}

	/// Active persistence backend, if any.
	pub fn persistence_kind(&self) -> Option<StoreKind> {
		self.store.as_ref().map(|store| store.kind())
	}

	/// Shared refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	fn current_token(&self) -> Option<TokenSecret> {
		self.state.read().valid_access_token_at(OffsetDateTime::now_utc()).cloned()
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("state", &*self.state.read())
			.field("persistence", &self.persistence_kind())
			.field("generation", &self.generation.load(Ordering::Relaxed))
			.finish_non_exhaustive()
	}
}

/// Collects the collaborators of a [`TokenManager`] before it loads persisted state.
pub struct TokenManagerBuilder {
	provider: Arc<dyn AuthProvider>,
	baseline: BaselineConfig,
	store: Option<Arc<dyn TokenStore>>,
	profile: ClientProfile,
}
impl TokenManagerBuilder {
	/// Persists rotated credentials through `store`.
	pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Attaches identity headers to [`TokenManager::headers`].
	pub fn with_client_profile(mut self, profile: ClientProfile) -> Self {
		self.profile = profile;

		self
	}

	/// Seeds state from the baseline, then overlays whatever the store still holds.
	///
	/// A store that fails to load is logged and ignored; the manager then starts from baseline.
	pub async fn build(self) -> TokenManager {
		let Self { provider, baseline, store, profile } = self;
		let now = OffsetDateTime::now_utc();
		let mut state = TokenState::seeded(&baseline);

		if let Some(store) = &store {
			match store.load().await {
				Ok(Some(record)) => {
					state = state.restore(&record, now);

					tracing::info!(
						store = %store.kind(),
						refresh_token = %record.refresh_token.fingerprint(),
						access_restored = state.access().is_some(),
						"Restored persisted token state."
					);
				},
				Ok(None) => {
					tracing::info!(
						store = %store.kind(),
						"No persisted token state; using baseline."
					);
				},
				Err(e) => {
					tracing::warn!(
						store = %store.kind(),
						error = %e,
						"Failed to load persisted token state; using baseline."
					);
				},
			}
		}

		if state.is_configured() {
			let fingerprint =
				state.refresh_token().map(TokenSecret::fingerprint).unwrap_or_default();

			tracing::info!(refresh_token = %fingerprint, "Token manager initialized.");
		} else {
			tracing::warn!(
				"Refresh token or client id is missing; upstream calls fail until an operator reset."
			);
		}

		TokenManager {
			provider,
			store,
			profile,
			baseline: RwLock::new(baseline),
			state: RwLock::new(state),
			refresh_guard: AsyncMutex::new(()),
			generation: AtomicU64::new(0),
			notes: Mutex::new(status::HealthNotes::default()),
			metrics: Arc::new(RefreshMetrics::default()),
		}
	}
}
impl Debug for TokenManagerBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManagerBuilder")
			.field("baseline", &self.baseline)
			.field("persistence", &self.store.as_ref().map(|store| store.kind()))
			.finish_non_exhaustive()
	}
}
