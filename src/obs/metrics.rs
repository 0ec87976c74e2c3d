// self
use crate::obs::{FlowKind, FlowOutcome};

/// Name of the counter incremented once per flow attempt and once per outcome.
///
/// Dashboards can derive a success ratio from the `outcome` label without any
/// extra series.
pub const FLOW_COUNTER: &str = "auth_gateway_flow_total";

/// Increments [`FLOW_COUNTER`] with `flow` and `outcome` labels.
///
/// Compiles to a no-op unless the `metrics` feature is enabled; installing a
/// recorder is the host application's job.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}
