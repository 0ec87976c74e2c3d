//! Stored credential pair and the legacy embedded user record.

// self
use crate::{_prelude::*, session::TokenSecret};

/// Credential pair persisted by the vault.
///
/// Storage holds either no tokens at all or at least an access token; a refresh
/// token never exists without an access token. Refresh tokens are optional
/// because providers do not always rotate them; an absent refresh token on a
/// freshly issued pair means the previously stored one stays in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived credential attached to every outgoing request.
	pub access: TokenSecret,
	/// Longer-lived credential exchanged for a new access token, when rotated.
	pub refresh: Option<TokenSecret>,
}
impl CredentialPair {
	/// Creates a pair carrying both tokens.
	pub fn new(access: impl Into<TokenSecret>, refresh: impl Into<TokenSecret>) -> Self {
		Self { access: access.into(), refresh: Some(refresh.into()) }
	}

	/// Creates a pair carrying only a fresh access token (refresh not rotated).
	pub fn access_only(access: impl Into<TokenSecret>) -> Self {
		Self { access: access.into(), refresh: None }
	}

	/// Returns `true` when the pair carries a rotated refresh token.
	pub fn has_refresh(&self) -> bool {
		self.refresh.is_some()
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access", &"<redacted>")
			.field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Legacy embedded user record kept in storage by older clients.
///
/// Only the `refresh_token` field matters to the gateway; it is the
/// backward-compatibility read path consulted when the dedicated refresh slot
/// is empty. Every other field of the original record is ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LegacyUserRecord {
	/// Refresh token embedded in the user record, if the legacy client stored one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
}
