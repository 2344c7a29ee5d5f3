// self
use crate::{
	obs::{Stage, StageOutcome},
	session::TerminationReason,
};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_outcome(stage: Stage, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"chemiki_client_pipeline_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Records a session termination, counting it and emitting a warning event (when enabled).
pub fn record_termination(reason: TerminationReason) {
	record_outcome(Stage::Termination, StageOutcome::Attempt);

	#[cfg(feature = "metrics")]
	{
		metrics::counter!("chemiki_client_session_terminated_total", "reason" => reason.as_str())
			.increment(1);
	}

	crate::obs::note_termination(reason);
}
