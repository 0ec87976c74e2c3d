// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the refresh counters, cheap to compare in assertions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
	/// Refresh cycles started by a leader.
	pub attempts: u64,
	/// Cycles that produced and persisted a new access token.
	pub successes: u64,
	/// Cycles settled with an error.
	pub failures: u64,
}
impl RefreshStats {
	/// Cycles started but not yet settled.
	pub fn in_flight(&self) -> u64 {
		self.attempts.saturating_sub(self.successes + self.failures)
	}
}

/// Lock-free counters covering the lifetime of every refresh cycle.
///
/// Counters only grow: `attempts` increments when a leader starts the exchange,
/// and exactly one of `successes`/`failures` follows when the queue settles.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Total number of refresh cycles started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Number of cycles that issued a new access token.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Number of cycles that settled with an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Copies all three counters into a [`RefreshStats`] value.
	pub fn snapshot(&self) -> RefreshStats {
		RefreshStats {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
