// self
use crate::{_prelude::*, obs::Stage, session::TerminationReason, store::StoreError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used by pipeline stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage + call site.
	pub fn new(stage: Stage, op: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("chemiki_client.pipeline", stage = stage.as_str(), op);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, op);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a warning that the session was terminated.
pub fn note_termination(reason: TerminationReason) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(reason = reason.as_str(), "session terminated");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = reason;
	}
}

/// Emits a warning that clearing persisted state failed during termination.
pub fn note_storage_failure(err: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(error = %err, "failed to clear persisted session state");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = err;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn notes_noop_without_tracing() {
		note_termination(TerminationReason::Unauthorized);
		note_storage_failure(&StoreError::Backend { message: "gone".into() });
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = StageSpan::new(Stage::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
