//! Credential vault: well-known storage slots plus the legacy fallback read path.

// self
use crate::{
	_prelude::*,
	session::{CredentialPair, LegacyUserRecord, TokenSecret},
	store::{KeyValueStore, StoreError},
};

/// Storage slot holding the current access token.
pub const ACCESS_TOKEN_SLOT: &str = "access_token";
/// Storage slot holding the current refresh token.
pub const REFRESH_TOKEN_SLOT: &str = "refresh_token";
/// Storage slot holding the legacy embedded user record.
pub const LEGACY_USER_SLOT: &str = "user";

/// Ordered lookup strategies consulted when reading the refresh token.
///
/// The legacy strategy exists because older clients embedded the refresh token
/// inside the stored `user` record instead of a dedicated slot. It is an
/// explicit secondary lookup, not duck-typed field access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshTokenSource {
	/// Dedicated `refresh_token` slot written by current clients.
	DedicatedSlot,
	/// `refresh_token` field embedded in the legacy `user` record.
	LegacyUserRecord,
}
impl RefreshTokenSource {
	/// Lookup order: the dedicated slot always wins over the legacy record.
	pub const LOOKUP_ORDER: [Self; 2] = [Self::DedicatedSlot, Self::LegacyUserRecord];
}

/// Read/write surface over the three credential slots.
///
/// The vault is the single source the request phase reads, so persisting a new
/// pair after a refresh is what updates the bearer attached to all future
/// requests.
#[derive(Clone)]
pub struct TokenVault {
	store: Arc<dyn KeyValueStore>,
}
impl TokenVault {
	/// Wraps the provided storage backend.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	/// Returns the current access token, if one is stored. No side effects.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.store.get(ACCESS_TOKEN_SLOT).await?.map(TokenSecret::new))
	}

	/// Returns the current refresh token, consulting every lookup strategy in
	/// [`RefreshTokenSource::LOOKUP_ORDER`].
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		for source in RefreshTokenSource::LOOKUP_ORDER {
			if let Some(token) = self.refresh_token_from(source).await? {
				return Ok(Some(TokenSecret::new(token)));
			}
		}

		Ok(None)
	}

	async fn refresh_token_from(
		&self,
		source: RefreshTokenSource,
	) -> Result<Option<String>, StoreError> {
		match source {
			RefreshTokenSource::DedicatedSlot => self.store.get(REFRESH_TOKEN_SLOT).await,
			RefreshTokenSource::LegacyUserRecord => {
				let Some(raw) = self.store.get(LEGACY_USER_SLOT).await? else {
					return Ok(None);
				};
				let mut deserializer = serde_json::Deserializer::from_str(&raw);
				let record: LegacyUserRecord =
					serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
						StoreError::Serialization {
							message: format!(
								"Failed to parse the legacy user record at `{}`: {}",
								e.path(),
								e.inner()
							),
						}
					})?;

				Ok(record.refresh_token)
			},
		}
	}

	/// Overwrites the access token; overwrites the refresh token only when a new
	/// one is supplied (refresh tokens are not always rotated).
	pub async fn store_tokens(
		&self,
		access: &str,
		refresh: Option<&str>,
	) -> Result<(), StoreError> {
		self.store.set(ACCESS_TOKEN_SLOT, access).await?;

		if let Some(refresh) = refresh {
			self.store.set(REFRESH_TOKEN_SLOT, refresh).await?;
		}

		Ok(())
	}

	/// Persists a freshly issued [`CredentialPair`].
	pub async fn store_pair(&self, pair: &CredentialPair) -> Result<(), StoreError> {
		self.store_tokens(pair.access.expose(), pair.refresh.as_ref().map(TokenSecret::expose))
			.await
	}

	/// Removes every auth-related slot, including the legacy user record.
	pub async fn clear(&self) -> Result<(), StoreError> {
		self.store.remove(ACCESS_TOKEN_SLOT).await?;
		self.store.remove(REFRESH_TOKEN_SLOT).await?;
		self.store.remove(LEGACY_USER_SLOT).await?;

		Ok(())
	}

	/// Returns `true` when an access token is stored. UI-gating probe.
	pub async fn is_authenticated(&self) -> Result<bool, StoreError> {
		Ok(self.access_token().await?.is_some())
	}
}
impl Debug for TokenVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenVault").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn vault() -> (TokenVault, MemoryStore) {
		let store = MemoryStore::default();

		(TokenVault::new(Arc::new(store.clone())), store)
	}

	#[tokio::test]
	async fn round_trip_and_partial_update() {
		let (vault, _) = vault();

		vault.store_tokens("A1", Some("R1")).await.expect("Initial store should succeed.");

		assert_eq!(
			vault.access_token().await.expect("Read should succeed.").map(|t| t.into_inner()),
			Some("A1".into())
		);
		assert_eq!(
			vault.refresh_token().await.expect("Read should succeed.").map(|t| t.into_inner()),
			Some("R1".into())
		);

		// Access-only update leaves the refresh token untouched.
		vault.store_tokens("A2", None).await.expect("Partial store should succeed.");

		assert_eq!(
			vault.access_token().await.expect("Read should succeed.").map(|t| t.into_inner()),
			Some("A2".into())
		);
		assert_eq!(
			vault.refresh_token().await.expect("Read should succeed.").map(|t| t.into_inner()),
			Some("R1".into())
		);
	}

	#[tokio::test]
	async fn legacy_record_is_a_fallback_only() {
		let (vault, store) = vault();

		store
			.set(LEGACY_USER_SLOT, "{\"id\":1,\"refresh_token\":\"legacy-r\"}")
			.await
			.expect("Seeding the legacy record should succeed.");

		assert_eq!(
			vault.refresh_token().await.expect("Read should succeed.").map(|t| t.into_inner()),
			Some("legacy-r".into())
		);

		// The dedicated slot wins once present.
		store
			.set(REFRESH_TOKEN_SLOT, "dedicated-r")
			.await
			.expect("Seeding the dedicated slot should succeed.");

		assert_eq!(
			vault.refresh_token().await.expect("Read should succeed.").map(|t| t.into_inner()),
			Some("dedicated-r".into())
		);
	}

	#[tokio::test]
	async fn malformed_legacy_record_surfaces_a_serialization_error() {
		let (vault, store) = vault();

		store
			.set(LEGACY_USER_SLOT, "{\"refresh_token\":42}")
			.await
			.expect("Seeding the malformed record should succeed.");

		let err = vault
			.refresh_token()
			.await
			.expect_err("A malformed legacy record should not be silently ignored.");

		assert!(matches!(err, StoreError::Serialization { .. }));
		assert!(err.to_string().contains("refresh_token"));
	}

	#[tokio::test]
	async fn clear_is_total() {
		let (vault, store) = vault();

		vault.store_tokens("A1", Some("R1")).await.expect("Store should succeed.");
		store
			.set(LEGACY_USER_SLOT, "{\"refresh_token\":\"legacy-r\"}")
			.await
			.expect("Seeding the legacy record should succeed.");

		vault.clear().await.expect("Clear should succeed.");

		assert_eq!(vault.access_token().await.expect("Read should succeed."), None);
		assert_eq!(vault.refresh_token().await.expect("Read should succeed."), None);
		assert!(!vault.is_authenticated().await.expect("Probe should succeed."));
		assert!(store.keys().is_empty());
	}
}
