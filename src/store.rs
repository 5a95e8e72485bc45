//! Persistence contract and the built-in durability backends for the rotated credential.
//!
//! Exactly one backend is active per process. [`FileStore`] keeps the full record on a
//! local volume; [`RemoteStore`] pushes only the refresh token into a platform-managed
//! configuration variable that the platform re-injects as baseline on the next start.

pub mod file;
pub mod memory;
pub mod remote;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use remote::{RemoteStore, RemoteStoreConfig};

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenState},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by credential stores.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Identifies the backend for logs and health output.
	fn kind(&self) -> StoreKind;

	/// Describes how much of the state the backend keeps.
	fn durability(&self) -> Durability;

	/// Reads the last saved record, if the backend can and one exists.
	fn load(&self) -> StoreFuture<'_, Option<PersistedState>>;

	/// Durably replaces the saved record.
	fn save<'a>(&'a self, state: &'a PersistedState) -> StoreFuture<'a, ()>;

	/// Discards any saved record.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Built-in backend labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
	/// Local JSON file.
	File,
	/// Platform configuration API.
	Remote,
	/// Process memory (tests and local development).
	Memory,
}
impl StoreKind {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StoreKind::File => "file",
			StoreKind::Remote => "remote",
			StoreKind::Memory => "memory",
		}
	}
}
impl Display for StoreKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How much of the credential state a backend retains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Durability {
	/// Refresh token, access token, and expiry; saved after every refresh.
	FullState,
	/// Only the refresh token; saved only when it rotates.
	RefreshTokenOnly,
}

/// Record written to durable storage after a successful refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
	/// Most recent refresh token.
	pub refresh_token: TokenSecret,
	/// Access token issued alongside it, if any.
	#[serde(default)]
	pub access_token: Option<TokenSecret>,
	/// Expiry of `access_token`.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub token_expiry: Option<OffsetDateTime>,
	/// When the record was written.
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
impl PersistedState {
	/// Snapshots the manager state, or `None` when there is no refresh token to keep.
	pub fn capture(state: &TokenState, now: OffsetDateTime) -> Option<Self> {
		let refresh_token = state.refresh_token()?.clone();

		Some(Self {
			refresh_token,
			access_token: state.access_token().cloned(),
			token_expiry: state.token_expiry(),
			updated_at: now,
		})
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
