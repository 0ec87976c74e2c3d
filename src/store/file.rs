//! Simple file-backed [`KeyValueStore`] for desktop and CLI clients.

// std
use std::{
	collections::BTreeMap,
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreError, StoreFuture},
};

/// Persists credential slots to a JSON file after each mutation.
///
/// Writes go through a temporary sibling file followed by a rename so a crash
/// mid-write never leaves a truncated snapshot behind.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<BTreeMap<String, String>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { BTreeMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(BTreeMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &BTreeMap<String, String>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn set_now(&self, key: String, value: String) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.insert(key, value);
		self.persist_locked(&guard)
	}

	fn remove_now(&self, key: &str) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		if guard.remove(key).is_none() {
			return Ok(());
		}

		self.persist_locked(&guard)
	}
}
impl KeyValueStore for FileStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.set_now(key.to_owned(), value.to_owned()) })
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.remove_now(key) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::env;
	// self
	use super::*;

	fn temp_store_path(name: &str) -> PathBuf {
		env::temp_dir().join(format!("auth-gateway-store-{name}-{}.json", std::process::id()))
	}

	#[tokio::test]
	async fn survives_reopen() {
		let path = temp_store_path("reopen");
		let _ = fs::remove_file(&path);

		{
			let store = FileStore::open(&path).expect("Store should open.");

			store.set("access_token", "A1").await.expect("Set should succeed.");
			store.set("refresh_token", "R1").await.expect("Set should succeed.");
		}

		let reopened = FileStore::open(&path).expect("Store should reopen.");

		assert_eq!(
			reopened.get("access_token").await.expect("Get should succeed."),
			Some("A1".into())
		);
		assert_eq!(
			reopened.get("refresh_token").await.expect("Get should succeed."),
			Some("R1".into())
		);

		let _ = fs::remove_file(&path);
	}

	#[tokio::test]
	async fn remove_persists_to_disk() {
		let path = temp_store_path("remove");
		let _ = fs::remove_file(&path);

		{
			let store = FileStore::open(&path).expect("Store should open.");

			store.set("access_token", "A1").await.expect("Set should succeed.");
			store.remove("access_token").await.expect("Remove should succeed.");
		}

		let reopened = FileStore::open(&path).expect("Store should reopen.");

		assert_eq!(reopened.get("access_token").await.expect("Get should succeed."), None);

		let _ = fs::remove_file(&path);
	}

	#[test]
	fn rejects_malformed_snapshots() {
		let path = temp_store_path("malformed");

		fs::write(&path, b"not json").expect("Fixture write should succeed.");

		let err = FileStore::open(&path).expect_err("Malformed snapshots should be rejected.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		let _ = fs::remove_file(&path);
	}
}
