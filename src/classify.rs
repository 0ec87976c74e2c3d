//! Pure classification of failed responses into retry/logout dispositions.

/// Decision produced by [`ErrorClassifier::classify`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Disposition {
	/// The request should be retried once after a token refresh.
	pub should_retry: bool,
	/// The session is unrecoverable; the gateway must perform its logout side effect.
	pub should_logout: bool,
}
impl Disposition {
	/// Disposition that forces the logout path.
	pub const LOGOUT: Self = Self { should_retry: false, should_logout: true };
	/// Disposition that leaves the response untouched.
	pub const PASS_THROUGH: Self = Self { should_retry: false, should_logout: false };
	/// Disposition that triggers the retry-after-refresh path.
	pub const RETRY: Self = Self { should_retry: true, should_logout: false };
}

/// Facts about a failed response, gathered by the gateway before classification.
#[derive(Clone, Copy, Debug)]
pub struct FailureContext {
	/// HTTP status of the failed response, when one was obtained.
	pub status: Option<u16>,
	/// The failing request targeted the refresh or login endpoint itself.
	pub auth_endpoint: bool,
	/// The request has already been retried once after a refresh.
	pub retried: bool,
	/// The server explicitly signaled session termination.
	pub session_terminated: bool,
}

/// Configurable status table mapping failures to dispositions.
///
/// The exact code table is deliberately configuration, not hard-coded policy:
/// deployments differ in which statuses mean "token expired, refresh and retry"
/// versus "session revoked, log out". The defaults follow the conventional
/// mapping (401 retry-once, 403 logout, refresh-endpoint 401 logout).
#[derive(Clone, Debug)]
pub struct ErrorClassifier {
	unauthorized_statuses: Vec<u16>,
	revoked_statuses: Vec<u16>,
}
impl ErrorClassifier {
	/// Creates a classifier with a custom status table.
	pub fn new(
		unauthorized_statuses: impl Into<Vec<u16>>,
		revoked_statuses: impl Into<Vec<u16>>,
	) -> Self {
		Self {
			unauthorized_statuses: unauthorized_statuses.into(),
			revoked_statuses: revoked_statuses.into(),
		}
	}

	/// Returns `true` when `status` is in the unauthorized ("token expired") set.
	pub fn is_unauthorized(&self, status: u16) -> bool {
		self.unauthorized_statuses.contains(&status)
	}

	/// Returns `true` when `status` is in the revoked ("session dead") set.
	pub fn is_revoked(&self, status: u16) -> bool {
		self.revoked_statuses.contains(&status)
	}

	/// Classifies a failed response. Pure; no side effects.
	///
	/// Unauthorized responses from the refresh/login endpoint itself always map
	/// to logout; refreshing the refresh call would loop forever.
	pub fn classify(&self, ctx: &FailureContext) -> Disposition {
		let Some(status) = ctx.status else {
			return Disposition::PASS_THROUGH;
		};

		if ctx.session_terminated
			|| self.is_revoked(status)
			|| (ctx.auth_endpoint && self.is_unauthorized(status))
		{
			return Disposition::LOGOUT;
		}
		if self.is_unauthorized(status) && !ctx.retried {
			return Disposition::RETRY;
		}

		Disposition::PASS_THROUGH
	}
}
impl Default for ErrorClassifier {
	fn default() -> Self {
		Self::new([401], [403])
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn ctx(status: u16) -> FailureContext {
		FailureContext {
			status: Some(status),
			auth_endpoint: false,
			retried: false,
			session_terminated: false,
		}
	}

	#[test]
	fn unauthorized_maps_to_retry_once() {
		let classifier = ErrorClassifier::default();

		assert_eq!(classifier.classify(&ctx(401)), Disposition::RETRY);
		assert_eq!(
			classifier.classify(&FailureContext { retried: true, ..ctx(401) }),
			Disposition::PASS_THROUGH
		);
	}

	#[test]
	fn refresh_endpoint_unauthorized_maps_to_logout() {
		let classifier = ErrorClassifier::default();

		assert_eq!(
			classifier.classify(&FailureContext { auth_endpoint: true, ..ctx(401) }),
			Disposition::LOGOUT
		);
	}

	#[test]
	fn revoked_and_terminated_sessions_map_to_logout() {
		let classifier = ErrorClassifier::default();

		assert_eq!(classifier.classify(&ctx(403)), Disposition::LOGOUT);
		assert_eq!(
			classifier.classify(&FailureContext { session_terminated: true, ..ctx(500) }),
			Disposition::LOGOUT
		);
	}

	#[test]
	fn other_statuses_pass_through() {
		let classifier = ErrorClassifier::default();

		for status in [400, 404, 409, 500, 503] {
			assert_eq!(classifier.classify(&ctx(status)), Disposition::PASS_THROUGH);
		}

		assert_eq!(
			classifier.classify(&FailureContext { status: None, ..ctx(0) }),
			Disposition::PASS_THROUGH
		);
	}

	#[test]
	fn status_table_is_configurable() {
		let classifier = ErrorClassifier::new([401, 419], [403, 440]);

		assert_eq!(classifier.classify(&ctx(419)), Disposition::RETRY);
		assert_eq!(classifier.classify(&ctx(440)), Disposition::LOGOUT);
	}
}
