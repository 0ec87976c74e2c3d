//! Outbound refresh transport: exchanging a refresh token for a new pair.

// self
use crate::{
	_prelude::*,
	coordinator::RefreshError,
	error::ConfigError,
	http::{HttpTransport, Method, PreparedRequest, RequestBody, join_endpoint},
	session::CredentialPair,
};

/// Path of the refresh endpoint, relative to the gateway base URL.
pub const REFRESH_ENDPOINT_PATH: &str = "auth/refresh-token";

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<CredentialPair, RefreshError>> + 'a + Send>>;

/// Exchanges a refresh token for a freshly issued [`CredentialPair`].
///
/// The coordinator holds exactly one implementation and calls it at most once
/// per refresh cycle; implementations need no single-flight logic of their own.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Performs one exchange with the authentication endpoint.
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// [`TokenRefresher`] that POSTs `{"refreshToken": ...}` to
/// `<base>/auth/refresh-token` and expects `{"accessToken", "refreshToken"?}`
/// back. An omitted `refreshToken` in the response means the provider did not
/// rotate it and the stored one remains valid.
pub struct HttpRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	endpoint: Url,
}
impl<T> HttpRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Builds a refresher targeting `<base>/auth/refresh-token`.
	pub fn new(transport: Arc<T>, base_url: &Url) -> Result<Self, ConfigError> {
		let endpoint = join_endpoint(base_url, REFRESH_ENDPOINT_PATH)?;

		Ok(Self { transport, endpoint })
	}

	/// Returns the resolved refresh endpoint URL.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
impl<T> TokenRefresher for HttpRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a> {
		Box::pin(async move {
			let payload =
				serde_json::to_value(RefreshRequest { refresh_token }).map_err(|e| {
					RefreshError::Transport {
						message: format!("Failed to encode the refresh payload: {e}"),
					}
				})?;
			let request = PreparedRequest {
				method: Method::Post,
				url: self.endpoint.clone(),
				headers: Vec::new(),
				body: RequestBody::Json(payload),
			};
			let response = self.transport.execute(request).await?;

			if !response.is_success() {
				return Err(RefreshError::Rejected {
					status: Some(response.status),
					message: format!(
						"refresh endpoint returned status {}",
						response.status
					),
				});
			}

			let parsed: RefreshResponse = response.json().map_err(|e| RefreshError::Rejected {
				status: Some(response.status),
				message: e.to_string(),
			})?;

			Ok(match parsed.refresh_token {
				Some(refresh) => CredentialPair::new(parsed.access_token, refresh),
				None => CredentialPair::access_only(parsed.access_token),
			})
		})
	}
}
impl<T> Debug for HttpRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRefresher").field("endpoint", &self.endpoint.as_str()).finish()
	}
}
