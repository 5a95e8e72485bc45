#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	env,
	path::PathBuf,
	process,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use docproxy_auth::{
	auth::{ClientId, TokenSecret},
	config::BaselineConfig,
	error::{Error, TransientError},
	provider::{AuthProvider, ProviderFuture, RefreshGrant},
	store::{Durability, PersistedState, StoreError, StoreFuture, StoreKind, TokenStore},
};

pub const CLIENT_ID: &str = "client_docproxy";

/// One scripted provider reply.
pub enum Step {
	Grant { access: &'static str, refresh: Option<&'static str>, expires_in: Duration },
	Reject,
	Transient,
}
impl Step {
	pub fn rotate(access: &'static str, refresh: &'static str) -> Self {
		Self::Grant { access, refresh: Some(refresh), expires_in: Duration::hours(1) }
	}

	pub fn keep(access: &'static str) -> Self {
		Self::Grant { access, refresh: None, expires_in: Duration::hours(1) }
	}
}

/// Provider double that replays [`Step`]s in order and records what it was sent.
pub struct ScriptedProvider {
	steps: Mutex<VecDeque<Step>>,
	calls: AtomicUsize,
	seen: Mutex<Vec<String>>,
	delay: StdDuration,
}
impl ScriptedProvider {
	pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
		Self::with_delay(steps, StdDuration::ZERO)
	}

	pub fn with_delay(steps: impl IntoIterator<Item = Step>, delay: StdDuration) -> Arc<Self> {
		Arc::new(Self {
			steps: Mutex::new(steps.into_iter().collect()),
			calls: AtomicUsize::new(0),
			seen: Mutex::new(Vec::new()),
			delay,
		})
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn seen_refresh_tokens(&self) -> Vec<String> {
		self.seen.lock().clone()
	}
}
impl AuthProvider for ScriptedProvider {
	fn exchange_refresh<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
		_client_id: &'a ClientId,
	) -> ProviderFuture<'a, RefreshGrant> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.seen.lock().push(refresh_token.expose().to_owned());

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}

			let step = self.steps.lock().pop_front();

			match step {
				Some(Step::Grant { access, refresh, expires_in }) => Ok(RefreshGrant {
					access_token: TokenSecret::new(access),
					refresh_token: refresh.map(TokenSecret::new),
					expires_in,
				}),
				Some(Step::Reject) => Err(Error::InvalidGrant { reason: "invalid_grant".into() }),
				Some(Step::Transient) | None => Err(TransientError::Timeout.into()),
			}
		})
	}
}

/// Store double whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore {
	pub saves: AtomicUsize,
}
impl TokenStore for FailingStore {
	fn kind(&self) -> StoreKind {
		StoreKind::File
	}

	fn durability(&self) -> Durability {
		Durability::FullState
	}

	fn load(&self) -> StoreFuture<'_, Option<PersistedState>> {
		Box::pin(async { Ok(None) })
	}

	fn save<'a>(&'a self, _state: &'a PersistedState) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.saves.fetch_add(1, Ordering::SeqCst);

			Err(StoreError::Backend { message: "read-only file system".into() })
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}

pub fn client_id() -> ClientId {
	ClientId::new(CLIENT_ID).expect("Client fixture should be valid.")
}

pub fn baseline(refresh_token: &str) -> BaselineConfig {
	BaselineConfig::new(TokenSecret::new(refresh_token), client_id())
}

pub fn persisted(refresh_token: &str) -> PersistedState {
	PersistedState {
		refresh_token: TokenSecret::new(refresh_token),
		access_token: None,
		token_expiry: None,
		updated_at: OffsetDateTime::now_utc(),
	}
}

pub fn temp_path(label: &str) -> PathBuf {
	let unique = format!(
		"docproxy_auth_it_{label}_{}_{}",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	);

	env::temp_dir().join(unique).join("token_state.json")
}
