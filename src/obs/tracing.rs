// crates.io
use tracing::instrument::Instrumented;
// self
use crate::{_prelude::*, obs::LifecycleOp};

/// Span wrapper used by lifecycle operations.
#[derive(Clone, Debug)]
pub struct LifecycleSpan {
	span: tracing::Span,
}
impl LifecycleSpan {
	/// Creates a new span tagged with the operation and what triggered it.
	pub fn new(op: LifecycleOp, trigger: &'static str) -> Self {
		let span = tracing::info_span!("docproxy_auth.lifecycle", op = op.as_str(), trigger);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		tracing::Instrument::instrument(fut, self.span.clone())
	}
}
