//! File-backed [`TokenStore`] for deployments with a persistent volume.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::{ErrorKind, Write},
};
// self
use crate::{
	_prelude::*,
	store::{Durability, PersistedState, StoreError, StoreFuture, StoreKind, TokenStore},
};

/// Persists the full credential record to a JSON file, replacing it atomically on save.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	write_lock: Mutex<()>,
}
impl FileStore {
	/// Creates a store rooted at `path`; nothing touches the disk until the first call.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), write_lock: Mutex::new(()) }
	}

	/// Location of the JSON record.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_record(&self) -> Option<PersistedState> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return None,
			Err(e) => {
				tracing::warn!(
					path = %self.path.display(),
					error = %e,
					"Persisted token state is unreadable; ignoring it."
				);

				return None;
			},
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return None;
		}

		match serde_json::from_slice::<PersistedState>(&bytes) {
			Ok(record) if record.refresh_token.is_empty() => {
				tracing::warn!(
					path = %self.path.display(),
					"Persisted token state has an empty refresh token; ignoring it."
				);

				None
			},
			Ok(record) => Some(record),
			Err(e) => {
				tracing::warn!(
					path = %self.path.display(),
					error = %e,
					"Persisted token state is corrupt; ignoring it."
				);

				None
			},
		}
	}

	fn ensure_parent_exists(&self) -> Result<(), StoreError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn tmp_path(&self) -> PathBuf {
		let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

		name.push(".tmp");

		self.path.with_file_name(name)
	}

	fn write_record(&self, record: &PersistedState) -> Result<(), StoreError> {
		let _guard = self.write_lock.lock();

		self.ensure_parent_exists()?;

		let serialized =
			serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize token state: {e}"),
			})?;
		let tmp_path = self.tmp_path();

		{
			let mut file = create_private(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| {
			let _ = fs::remove_file(&tmp_path);

			StoreError::Backend {
				message: format!("Failed to replace {}: {e}", self.path.display()),
			}
		})
	}

	fn remove_record(&self) -> Result<(), StoreError> {
		let _guard = self.write_lock.lock();

		match fs::remove_file(&self.path) {
			Ok(()) => {
				tracing::info!(path = %self.path.display(), "Deleted persisted token state.");

				Ok(())
			},
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to delete {}: {e}", self.path.display()),
			}),
		}
	}
}
impl TokenStore for FileStore {
	fn kind(&self) -> StoreKind {
		StoreKind::File
	}

	fn durability(&self) -> Durability {
		Durability::FullState
	}

	fn load(&self) -> StoreFuture<'_, Option<PersistedState>> {
		Box::pin(async move { Ok(self.read_record()) })
	}

	fn save<'a>(&'a self, state: &'a PersistedState) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.write_record(state) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.remove_record() })
	}
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
	// std
	use std::os::unix::fs::OpenOptionsExt;

	OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
	OpenOptions::new().write(true).create(true).truncate(true).open(path)
}
