//! Thread-safe in-memory [`KeyValueStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreError, StoreFuture},
};

type SlotMap = Arc<RwLock<HashMap<String, String>>>;

/// Thread-safe storage backend that keeps slots in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SlotMap);
impl MemoryStore {
	/// Returns a snapshot of every stored key, primarily for test assertions.
	pub fn keys(&self) -> Vec<String> {
		self.0.read().keys().cloned().collect()
	}

	fn get_now(map: SlotMap, key: String) -> Option<String> {
		map.read().get(&key).cloned()
	}

	fn set_now(map: SlotMap, key: String, value: String) -> Result<(), StoreError> {
		map.write().insert(key, value);

		Ok(())
	}

	fn remove_now(map: SlotMap, key: String) -> Result<(), StoreError> {
		map.write().remove(&key);

		Ok(())
	}
}
impl KeyValueStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();
		let value = value.to_owned();

		Box::pin(async move { Self::set_now(map, key, value) })
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Self::remove_now(map, key) })
	}
}
