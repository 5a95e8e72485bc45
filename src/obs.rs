//! Observability helpers for lifecycle operations.
//!
//! - Every refresh and reset runs inside a `docproxy_auth.lifecycle` span carrying the `op` and
//!   `trigger` fields.
//! - Enable `metrics` to increment the `docproxy_auth_lifecycle_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Lifecycle operations observed by the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleOp {
	/// Refresh-grant exchange.
	Refresh,
	/// Administrative reset back to baseline.
	Reset,
	/// Durable write of the rotated state.
	Persist,
}
impl LifecycleOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LifecycleOp::Refresh => "refresh",
			LifecycleOp::Reset => "reset",
			LifecycleOp::Persist => "persist",
		}
	}
}
impl Display for LifecycleOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller (or swallowed, for persistence).
	Failure,
	/// A concurrent caller adopted another flight's result instead of running its own.
	Coalesced,
}
impl LifecycleOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LifecycleOutcome::Attempt => "attempt",
			LifecycleOutcome::Success => "success",
			LifecycleOutcome::Failure => "failure",
			LifecycleOutcome::Coalesced => "coalesced",
		}
	}
}
impl Display for LifecycleOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
