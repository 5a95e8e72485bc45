// self
use crate::obs::{LifecycleOp, LifecycleOutcome};

/// Records a lifecycle outcome via the global metrics recorder (when enabled).
pub fn record_lifecycle_outcome(op: LifecycleOp, outcome: LifecycleOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"docproxy_auth_lifecycle_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_lifecycle_outcome_without_recorder() {
		record_lifecycle_outcome(LifecycleOp::Persist, LifecycleOutcome::Failure);
	}
}
