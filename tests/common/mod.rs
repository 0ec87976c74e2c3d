#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};
// self
use auth_gateway::{
	coordinator::REFRESH_ENDPOINT_PATH,
	gateway::Navigator,
	http::{ApiResponse, HttpTransport, PreparedRequest, TransportFuture},
};

/// Navigation hook that counts redirects instead of performing them.
#[derive(Clone, Default)]
pub struct RecordingNavigator(Arc<AtomicU64>);
impl RecordingNavigator {
	pub fn redirects(&self) -> u64 {
		self.0.load(Ordering::Relaxed)
	}
}
impl Navigator for RecordingNavigator {
	fn redirect_to_root(&self) {
		self.0.fetch_add(1, Ordering::Relaxed);
	}
}

/// What the fake refresh endpoint does when called.
pub enum RefreshBehavior {
	/// Issue a new pair (and start accepting the new access token).
	Rotate {
		access: String,
		refresh: Option<String>,
	},
	/// Issue a token the resource endpoints will still refuse.
	IssueStale {
		access: String,
	},
	/// Reject the exchange with the given status.
	Reject {
		status: u16,
	},
}

/// Deterministic in-process API double.
///
/// Resource endpoints return 200 only for the currently valid bearer and 401
/// otherwise; the refresh endpoint follows the configured [`RefreshBehavior`].
/// An optional delay on the refresh call widens the in-flight window so
/// concurrent tests can park waiters reliably.
pub struct FakeApi {
	valid_token: Mutex<String>,
	refresh_behavior: Mutex<RefreshBehavior>,
	refresh_delay: Option<Duration>,
	refresh_calls: AtomicU64,
	resource_calls: AtomicU64,
}
impl FakeApi {
	pub fn new(valid_token: &str, refresh_behavior: RefreshBehavior) -> Self {
		Self {
			valid_token: Mutex::new(valid_token.to_owned()),
			refresh_behavior: Mutex::new(refresh_behavior),
			refresh_delay: None,
			refresh_calls: AtomicU64::new(0),
			resource_calls: AtomicU64::new(0),
		}
	}

	pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
		self.refresh_delay = Some(delay);

		self
	}

	pub fn refresh_calls(&self) -> u64 {
		self.refresh_calls.load(Ordering::Relaxed)
	}

	pub fn resource_calls(&self) -> u64 {
		self.resource_calls.load(Ordering::Relaxed)
	}

	fn refresh_response(&self) -> ApiResponse {
		match &*self.refresh_behavior.lock().unwrap() {
			RefreshBehavior::Rotate { access, refresh } => {
				*self.valid_token.lock().unwrap() = access.clone();

				let body = serde_body(access, refresh.as_deref());

				ApiResponse {
					status: 200,
					headers: vec![("content-type".into(), "application/json".into())],
					body,
				}
			},
			RefreshBehavior::IssueStale { access } => {
				let body = serde_body(access, None);

				ApiResponse {
					status: 200,
					headers: vec![("content-type".into(), "application/json".into())],
					body,
				}
			},
			RefreshBehavior::Reject { status } => {
				ApiResponse { status: *status, headers: Vec::new(), body: Vec::new() }
			},
		}
	}

	fn resource_response(&self, request: &PreparedRequest) -> ApiResponse {
		let expected = format!("Bearer {}", self.valid_token.lock().unwrap());
		let authorized = request
			.headers
			.iter()
			.any(|(name, value)| name.eq_ignore_ascii_case("authorization") && *value == expected);

		if authorized {
			ApiResponse {
				status: 200,
				headers: vec![("content-type".into(), "application/json".into())],
				body: b"{\"ok\":true}".to_vec(),
			}
		} else {
			ApiResponse { status: 401, headers: Vec::new(), body: Vec::new() }
		}
	}
}
impl HttpTransport for FakeApi {
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_, ApiResponse> {
		Box::pin(async move {
			if request.url.path().ends_with(REFRESH_ENDPOINT_PATH) {
				self.refresh_calls.fetch_add(1, Ordering::Relaxed);

				if let Some(delay) = self.refresh_delay {
					tokio::time::sleep(delay).await;
				}

				Ok(self.refresh_response())
			} else {
				self.resource_calls.fetch_add(1, Ordering::Relaxed);

				Ok(self.resource_response(&request))
			}
		})
	}
}

fn serde_body(access: &str, refresh: Option<&str>) -> Vec<u8> {
	let mut payload = serde_json::Map::new();

	payload.insert("accessToken".into(), access.into());

	if let Some(refresh) = refresh {
		payload.insert("refreshToken".into(), refresh.into());
	}

	serde_json::Value::Object(payload).to_string().into_bytes()
}
