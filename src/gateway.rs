//! The authenticated gateway: bearer attachment, failure classification, transparent retry.

// self
use crate::{
	_prelude::*,
	classify::{ErrorClassifier, FailureContext},
	coordinator::{
		Enlistment, HttpRefresher, REFRESH_ENDPOINT_PATH, RefreshCoordinator, RefreshError,
		TokenRefresher,
	},
	http::{ApiRequest, ApiResponse, HttpTransport, PreparedRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::TokenSecret,
	store::KeyValueStore,
	vault::TokenVault,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Path of the login endpoint, relative to the gateway base URL. Failures on
/// this path never trigger a refresh.
pub const LOGIN_ENDPOINT_PATH: &str = "auth/login";
/// Response header by which the server explicitly signals session termination.
pub const SESSION_TERMINATED_HEADER: &str = "x-session-terminated";

const AUTHORIZATION_HEADER: &str = "authorization";

/// Hook invoked after the gateway's logout side effect.
///
/// In a browser-hosted client this is the full redirect to the root/login
/// route; server-side hosts typically install a handle that tears down the
/// local session instead.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Forces navigation to the root/login route.
	fn redirect_to_root(&self);
}

/// Default hook that performs no navigation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;
impl Navigator for NoopNavigator {
	fn redirect_to_root(&self) {}
}

/// Request-sending surface that behaves like a plain HTTP client call but
/// transparently retries once on token expiry.
///
/// The gateway owns the vault, coordinator, refresher, classifier, and
/// navigation hook so the retry pipeline has no module-level state; construct
/// one gateway per base URL (or per test) and share it behind an `Arc`.
pub struct Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	vault: TokenVault,
	coordinator: Arc<RefreshCoordinator>,
	refresher: Arc<dyn TokenRefresher>,
	classifier: ErrorClassifier,
	navigator: Arc<dyn Navigator>,
	base_url: Url,
}
impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gateway that reuses the caller-provided transport.
	pub fn with_transport(
		store: Arc<dyn KeyValueStore>,
		base_url: Url,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		let transport = transport.into();
		let refresher = HttpRefresher::new(transport.clone(), &base_url)?;

		Ok(Self {
			transport,
			vault: TokenVault::new(store),
			coordinator: Arc::new(RefreshCoordinator::new()),
			refresher: Arc::new(refresher),
			classifier: ErrorClassifier::default(),
			navigator: Arc::new(NoopNavigator),
			base_url,
		})
	}

	/// Replaces the status table used to classify failures.
	pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
		self.classifier = classifier;

		self
	}

	/// Installs the navigation hook invoked on unrecoverable auth failures.
	pub fn with_navigator(mut self, navigator: impl 'static + Navigator) -> Self {
		self.navigator = Arc::new(navigator);

		self
	}

	/// Replaces the refresher; mainly for tests and nonstandard auth endpoints.
	pub fn with_refresher(mut self, refresher: impl 'static + TokenRefresher) -> Self {
		self.refresher = Arc::new(refresher);

		self
	}

	/// Shares a coordinator handle, e.g. across gateways hitting the same session.
	pub fn with_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
		self.coordinator = coordinator;

		self
	}

	/// Returns the credential vault this gateway reads and writes.
	pub fn vault(&self) -> &TokenVault {
		&self.vault
	}

	/// Returns the refresh coordinator handle.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		&self.coordinator
	}

	/// Returns the base URL requests are joined onto.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Returns the current access token, if one is stored. UI-gating probe.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.vault.access_token().await?)
	}

	/// Returns `true` when an access token is stored. UI-gating probe.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.vault.is_authenticated().await?)
	}

	/// Sends an authenticated request, transparently retrying once on token expiry.
	///
	/// Transport failures and non-auth HTTP error statuses behave exactly like a
	/// plain client call: the former propagate unchanged, the latter come back
	/// as `Ok` responses for the caller to inspect. Only auth-classified
	/// failures make the gateway intervene.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send_inner(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn send_inner(&self, request: ApiRequest) -> Result<ApiResponse> {
		let prepared = self.prepare(&request).await?;
		let response = self.transport.execute(prepared).await?;

		if response.is_success() {
			return Ok(response);
		}

		let disposition =
			self.classifier.classify(&self.failure_context(&request, &response, false));

		if disposition.should_logout {
			self.logout().await;

			return Err(Error::SessionRevoked {
				reason: format!("upstream rejected the session with status {}", response.status),
			});
		}
		if !disposition.should_retry {
			return Ok(response);
		}

		// From here on the request counts as retried; at most one resubmission
		// follows, whatever the refresh produces.
		let token = match self.coordinator.enlist() {
			Enlistment::Waiter(receiver) => {
				let outcome = receiver.await.map_err(|_| RefreshError::Transport {
					message: "refresh leader dropped before settling the queue".into(),
				})?;

				outcome?
			},
			Enlistment::Leader =>
				match self.coordinator.run(&self.vault, self.refresher.as_ref()).await {
					Ok(token) => token,
					Err(error) => {
						// Waiters were already rejected by the coordinator; clear
						// the session and surface the failure to this caller.
						self.logout().await;

						return Err(self.map_refresh_failure(error));
					},
				},
		};
		let resubmission = self.prepare_resubmission(&request, &token)?;
		let response = self.transport.execute(resubmission).await?;

		if response.is_success() {
			return Ok(response);
		}

		let retry_disposition =
			self.classifier.classify(&self.failure_context(&request, &response, true));

		if retry_disposition.should_logout {
			self.logout().await;

			return Err(Error::SessionRevoked {
				reason: format!(
					"upstream rejected the resubmitted request with status {}",
					response.status
				),
			});
		}
		if self.classifier.is_unauthorized(response.status) {
			// A request is retried at most once; the second unauthorized
			// response surfaces to the caller.
			return Err(Error::Unauthorized { status: response.status });
		}

		Ok(response)
	}

	fn failure_context(
		&self,
		request: &ApiRequest,
		response: &ApiResponse,
		retried: bool,
	) -> FailureContext {
		FailureContext {
			status: Some(response.status),
			auth_endpoint: is_auth_endpoint(&request.path),
			retried,
			session_terminated: response.header(SESSION_TERMINATED_HEADER).is_some(),
		}
	}

	async fn prepare(&self, request: &ApiRequest) -> Result<PreparedRequest> {
		let bearer = if request.has_header(AUTHORIZATION_HEADER) {
			None
		} else {
			self.vault.access_token().await?
		};

		self.prepare_inner(request, bearer.as_ref())
	}

	fn prepare_resubmission(
		&self,
		request: &ApiRequest,
		token: &TokenSecret,
	) -> Result<PreparedRequest> {
		let mut prepared = self.prepare_inner(request, None)?;

		// The resubmission must carry the fresh token even when the original
		// request supplied its own authorization header.
		prepared.headers.retain(|(name, _)| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
		prepared
			.headers
			.push((AUTHORIZATION_HEADER.to_owned(), format!("Bearer {}", token.expose())));

		Ok(prepared)
	}

	fn prepare_inner(
		&self,
		request: &ApiRequest,
		bearer: Option<&TokenSecret>,
	) -> Result<PreparedRequest> {
		let mut url = crate::http::join_endpoint(&self.base_url, &request.path)?;

		if !request.query.is_empty() {
			url.query_pairs_mut()
				.extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
		}

		let mut headers = request.headers.clone();

		if let Some(token) = bearer {
			headers
				.push((AUTHORIZATION_HEADER.to_owned(), format!("Bearer {}", token.expose())));
		}

		Ok(PreparedRequest { method: request.method, url, headers, body: request.body.clone() })
	}

	fn map_refresh_failure(&self, error: RefreshError) -> Error {
		if let RefreshError::Rejected { status: Some(status), .. } = &error {
			let ctx = FailureContext {
				status: Some(*status),
				auth_endpoint: true,
				retried: false,
				session_terminated: false,
			};

			if self.classifier.classify(&ctx).should_logout {
				return Error::SessionRevoked { reason: error.to_string() };
			}
		}

		error.into()
	}

	// Shared logout side effect: clear stored credentials, then hand control to
	// the navigation hook. Storage failures must not block the redirect.
	async fn logout(&self) {
		if let Err(error) = self.vault.clear().await {
			#[cfg(feature = "tracing")]
			tracing::warn!(error = %error, "Failed to clear stored credentials during logout.");
			#[cfg(not(feature = "tracing"))]
			let _ = error;
		}

		self.navigator.redirect_to_root();
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway backed by a default reqwest transport.
	///
	/// Use [`Gateway::with_transport`] with [`ReqwestTransport::with_client`] to
	/// supply a client carrying custom TLS, proxy, or timeout configuration.
	pub fn new(store: Arc<dyn KeyValueStore>, base_url: Url) -> Result<Self> {
		Self::with_transport(store, base_url, ReqwestTransport::default())
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base_url", &self.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish_non_exhaustive()
	}
}

fn is_auth_endpoint(path: &str) -> bool {
	let trimmed = path.trim_start_matches('/');

	trimmed == REFRESH_ENDPOINT_PATH || trimmed == LOGIN_ENDPOINT_PATH
}
