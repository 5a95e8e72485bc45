//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	store::{Durability, PersistedState, StoreError, StoreFuture, StoreKind, TokenStore},
};

/// Storage backend that keeps the record in-process and counts writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
	record: RwLock<Option<PersistedState>>,
	saves: AtomicUsize,
}
impl MemoryStore {
	/// Creates a store that already holds `record`, as if written by a previous process.
	pub fn seeded(record: PersistedState) -> Self {
		Self { record: RwLock::new(Some(record)), saves: AtomicUsize::new(0) }
	}

	/// Returns a copy of the current record.
	pub fn snapshot(&self) -> Option<PersistedState> {
		self.record.read().clone()
	}

	/// Number of successful [`TokenStore::save`] calls.
	pub fn save_count(&self) -> usize {
		self.saves.load(Ordering::Relaxed)
	}

	fn save_now(&self, state: &PersistedState) -> Result<(), StoreError> {
		*self.record.write() = Some(state.clone());

		self.saves.fetch_add(1, Ordering::Relaxed);

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn kind(&self) -> StoreKind {
		StoreKind::Memory
	}

	fn durability(&self) -> Durability {
		Durability::FullState
	}

	fn load(&self) -> StoreFuture<'_, Option<PersistedState>> {
		let record = self.snapshot();

		Box::pin(async move { Ok(record) })
	}

	fn save<'a>(&'a self, state: &'a PersistedState) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.save_now(state) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.record.write().take();

			Ok(())
		})
	}
}
