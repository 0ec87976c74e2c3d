//! Single-flight refresh coordination: one in-flight refresh, queued waiters, shared outcome.
//!
//! [`RefreshCoordinator`] owns the state the gateway consults when a request
//! fails as unauthorized: a `refreshing` flag plus an ordered waiter queue.
//! The first failing request becomes the leader and performs the one outbound
//! refresh call; every request that fails while that call is in flight parks on
//! a one-shot channel instead of issuing its own. Settling the refresh drains
//! the entire queue with the shared outcome before the flag is observable as
//! clear again, so N concurrent failures cost exactly one refresh call.

mod metrics;
mod refresher;

pub use metrics::{RefreshMetrics, RefreshStats};
pub use refresher::{HttpRefresher, REFRESH_ENDPOINT_PATH, RefreshFuture, TokenRefresher};

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::TokenSecret,
	store::StoreError,
	vault::TokenVault,
};

/// Outcome broadcast to the leader and every waiter of one refresh attempt.
pub type RefreshOutcome = Result<TokenSecret, RefreshError>;

type Waiter = oneshot::Sender<RefreshOutcome>;

/// Refresh pipeline failure.
///
/// Cloneable by design: one refresh produces one outcome, and that single value
/// fans out to every queued waiter.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// `begin` was invoked while a refresh was already running; a coordination
	/// bug in the caller, not an expected runtime condition.
	#[error("A token refresh is already in progress.")]
	InFlight,
	/// No refresh token is available in the vault.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// The refresh endpoint rejected the exchange.
	#[error("Refresh endpoint rejected the exchange: {message}")]
	Rejected {
		/// HTTP status returned by the refresh endpoint, when available.
		status: Option<u16>,
		/// Human-readable summary of the rejection.
		message: String,
	},
	/// Transport failure while calling the refresh endpoint.
	#[error("Transport failure during token refresh: {message}")]
	Transport {
		/// Human-readable summary of the transport failure.
		message: String,
	},
	/// Storage failure while reading or persisting credentials.
	#[error("Storage failure during token refresh: {message}")]
	Storage {
		/// Human-readable summary of the storage failure.
		message: String,
	},
}
impl From<StoreError> for RefreshError {
	fn from(e: StoreError) -> Self {
		Self::Storage { message: e.to_string() }
	}
}
impl From<crate::error::TransportError> for RefreshError {
	fn from(e: crate::error::TransportError) -> Self {
		Self::Transport { message: e.to_string() }
	}
}

/// Role assigned to a request entering the refresh path.
#[derive(Debug)]
pub enum Enlistment {
	/// No refresh was running; the caller must now perform it (or settle the
	/// queue with a failure if it cannot).
	Leader,
	/// A refresh is already in flight; await the shared outcome.
	Waiter(oneshot::Receiver<RefreshOutcome>),
}

#[derive(Default)]
struct CoordinatorState {
	refreshing: bool,
	waiters: Vec<Waiter>,
}

/// Owned, injectable coordinator guaranteeing single-flight refresh semantics.
///
/// Construct one per gateway (or per test) rather than sharing module-level
/// state. The flag and queue live behind one mutex so check-and-set is atomic
/// under true parallelism, not just under a single-threaded event loop.
#[derive(Default)]
pub struct RefreshCoordinator {
	state: Mutex<CoordinatorState>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Creates a coordinator with no refresh in flight and an empty queue.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the shared refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Read-only probe: is a refresh currently in flight?
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refreshing
	}

	/// Number of currently parked waiters. Probe for tests and diagnostics.
	pub fn waiter_count(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Claims the leader role, failing with [`RefreshError::InFlight`] when a
	/// refresh is already running. Callers are expected to consult
	/// [`Self::is_refreshing`] (or use [`Self::enlist`]) first.
	pub fn begin(&self) -> Result<(), RefreshError> {
		let mut state = self.state.lock();

		if state.refreshing {
			return Err(RefreshError::InFlight);
		}

		state.refreshing = true;

		Ok(())
	}

	/// Atomic begin-or-enqueue: becomes the leader when no refresh is running,
	/// otherwise parks a waiter. Closes the probe-then-enqueue race a separate
	/// `is_refreshing` check would leave open.
	pub fn enlist(&self) -> Enlistment {
		let mut state = self.state.lock();

		if state.refreshing {
			let (sender, receiver) = oneshot::channel();

			state.waiters.push(sender);

			Enlistment::Waiter(receiver)
		} else {
			state.refreshing = true;

			Enlistment::Leader
		}
	}

	/// Parks a waiter for the outcome of the in-flight refresh.
	pub fn enqueue(&self) -> oneshot::Receiver<RefreshOutcome> {
		let (sender, receiver) = oneshot::channel();

		self.state.lock().waiters.push(sender);

		receiver
	}

	/// Resolves every waiter with the freshly issued access token.
	pub fn settle_success(&self, token: TokenSecret) {
		self.settle(Ok(token));
	}

	/// Rejects every waiter with the shared failure.
	pub fn settle_failure(&self, error: RefreshError) {
		self.settle(Err(error));
	}

	// The flag clears and the queue drains under one lock acquisition, so no
	// observer can see `refreshing == false` while waiters are still parked.
	fn settle(&self, outcome: RefreshOutcome) {
		let waiters = {
			let mut state = self.state.lock();

			state.refreshing = false;

			std::mem::take(&mut state.waiters)
		};

		for waiter in waiters {
			// A waiter whose request future was dropped is not an error.
			let _ = waiter.send(outcome.clone());
		}
	}

	/// Leader path: reads the refresh token from the vault, performs exactly one
	/// exchange via `refresher`, persists the new pair, and settles the queue
	/// with the result. Precondition: this caller holds the leader role (via
	/// [`Self::begin`] or [`Self::enlist`]). Postcondition: the queue is empty
	/// and `is_refreshing` is `false`, on success and failure alike.
	pub async fn run<R>(&self, vault: &TokenVault, refresher: &R) -> RefreshOutcome
	where
		R: ?Sized + TokenRefresher,
	{
		const KIND: FlowKind = FlowKind::Refresh;

		debug_assert!(self.is_refreshing(), "run() requires the leader role");

		let span = FlowSpan::new(KIND, "run");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let outcome = span.instrument(Self::exchange(vault, refresher)).await;

		match &outcome {
			Ok(token) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				self.metrics.record_success();
				self.settle_success(token.clone());
			},
			Err(error) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				self.metrics.record_failure();
				self.settle_failure(error.clone());
			},
		}

		outcome
	}

	/// The full start operation: claims the leader role, then [`Self::run`]s.
	/// Fails with [`RefreshError::InFlight`] when called concurrently.
	pub async fn start_refresh<R>(&self, vault: &TokenVault, refresher: &R) -> RefreshOutcome
	where
		R: ?Sized + TokenRefresher,
	{
		self.begin()?;

		self.run(vault, refresher).await
	}

	async fn exchange<R>(vault: &TokenVault, refresher: &R) -> RefreshOutcome
	where
		R: ?Sized + TokenRefresher,
	{
		let refresh = vault
			.refresh_token()
			.await?
			.ok_or(RefreshError::MissingRefreshToken)?;
		let pair = refresher.refresh(refresh.expose()).await?;

		vault.store_pair(&pair).await?;

		Ok(pair.access)
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &self.is_refreshing())
			.field("waiters", &self.waiter_count())
			.finish()
	}
}
