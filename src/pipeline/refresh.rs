//! Single-flight access-token renewal.
//!
//! The first caller that needs a new access token becomes the leader and performs the renewal
//! call; every caller that arrives while it is in flight parks on a oneshot channel and receives
//! the leader's outcome verbatim. The check-and-set on the renewal state happens under a
//! synchronous lock with no `.await` in between, so two callers can never both become leaders.
//! Settlement always returns the state to idle, including when the leader's future is dropped.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use http::{
	HeaderValue, Method,
	header::{ACCEPT, CONTENT_TYPE},
};
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{RenewalGrant, TokenSecret},
	error::{ConfigError, RequestError},
	obs::{self, Stage, StageOutcome, StageSpan},
	pipeline::ApiClient,
	session::TerminationReason,
	transport::{self, ApiRequest, ApiTransport},
};

type Outcome = Result<TokenSecret>;

/// Observable state of the renewal state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No renewal is in flight.
	Idle,
	/// A renewal is in flight.
	Refreshing {
		/// Callers parked until it settles.
		queued: usize,
	},
}

#[derive(Debug, Default)]
pub(crate) struct RefreshCoordinator {
	state: Mutex<RefreshState>,
}
impl RefreshCoordinator {
	/// Joins the renewal state machine.
	///
	/// Returns a lease when the caller must perform the renewal, or a receiver for the outcome
	/// of the renewal already in flight.
	pub(crate) fn enter(&self) -> Ticket<'_> {
		let mut state = self.state.lock();

		match &mut *state {
			RefreshState::Idle => {
				*state = RefreshState::Refreshing { waiters: Vec::new() };

				Ticket::Leader(RefreshLease { coordinator: self, settled: false })
			},
			RefreshState::Refreshing { waiters } => {
				let (tx, rx) = oneshot::channel();

				waiters.push(tx);

				Ticket::Follower(rx)
			},
		}
	}

	pub(crate) fn phase(&self) -> RefreshPhase {
		match &*self.state.lock() {
			RefreshState::Idle => RefreshPhase::Idle,
			RefreshState::Refreshing { waiters } =>
				RefreshPhase::Refreshing { queued: waiters.len() },
		}
	}

	/// Hands `outcome` to every parked caller and returns to idle.
	fn settle(&self, outcome: &Outcome) {
		let mut state = self.state.lock();

		if let RefreshState::Refreshing { waiters } = &mut *state {
			for waiter in waiters.drain(..) {
				// A receiver that is gone belongs to a caller that was cancelled.
				let _ = waiter.send(outcome.clone());
			}
		}

		*state = RefreshState::Idle;
	}
}

#[derive(Debug, Default)]
enum RefreshState {
	#[default]
	Idle,
	Refreshing {
		waiters: Vec<oneshot::Sender<Outcome>>,
	},
}

pub(crate) enum Ticket<'a> {
	Leader(RefreshLease<'a>),
	Follower(oneshot::Receiver<Outcome>),
}

/// Proof that the holder owns the in-flight renewal. Dropping it unsettled rejects every parked
/// caller with [`RequestError::Abandoned`].
pub(crate) struct RefreshLease<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl RefreshLease<'_> {
	pub(crate) fn settle(mut self, outcome: &Outcome) {
		self.settled = true;
		self.coordinator.settle(outcome);
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.settle(&Err(abandoned()));
		}
	}
}

/// Body posted to the renewal endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewalRequest<'a> {
	refresh_token: &'a str,
}

/// A failed renewal, plus the termination it calls for.
#[derive(Debug)]
struct RenewalFailure {
	error: Error,
	terminate: Option<TerminationReason>,
}
impl RenewalFailure {
	fn terminal(error: Error, reason: TerminationReason) -> Self {
		Self { error, terminate: Some(reason) }
	}
}
impl From<Error> for RenewalFailure {
	fn from(error: Error) -> Self {
		Self { error, terminate: None }
	}
}
impl From<ConfigError> for RenewalFailure {
	fn from(e: ConfigError) -> Self {
		Error::from(e).into()
	}
}

impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Returns a freshly renewed access token, performing the renewal only if no other caller
	/// already is.
	pub(crate) async fn renewed_access_token(&self) -> Result<TokenSecret> {
		const STAGE: Stage = Stage::Refresh;

		let lease = match self.refresh.enter() {
			Ticket::Leader(lease) => lease,
			Ticket::Follower(rx) => {
				self.refresh_metrics.record_queued();
				obs::record_outcome(STAGE, StageOutcome::Queued);

				return rx.await.unwrap_or_else(|_| Err(abandoned()));
			},
		};
		let span = StageSpan::new(STAGE, "renewed_access_token");

		obs::record_outcome(STAGE, StageOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let (outcome, terminate) = match span.instrument(self.try_renew()).await {
			Ok(access) => (Ok(access), None),
			Err(RenewalFailure { error, terminate }) => (Err(error), terminate),
		};

		match &outcome {
			Ok(_) => {
				self.refresh_metrics.record_success();
				obs::record_outcome(STAGE, StageOutcome::Success);
			},
			Err(_) => {
				self.refresh_metrics.record_failure();
				obs::record_outcome(STAGE, StageOutcome::Failure);
			},
		}

		lease.settle(&outcome);

		if let Some(reason) = terminate {
			self.terminate(reason).await;
		}

		outcome
	}

	async fn try_renew(&self) -> Result<TokenSecret, RenewalFailure> {
		let session = match self.vault.load().await {
			Ok(session) => session,
			Err(err @ Error::InvalidSessionFormat { .. }) =>
				return Err(RenewalFailure::terminal(err, TerminationReason::InvalidSessionFormat)),
			Err(err) => return Err(err.into()),
		};
		let Some(refresh) = session.as_ref().and_then(|tokens| tokens.refresh()).cloned() else {
			return Err(RenewalFailure::terminal(
				Error::NoRefreshToken,
				TerminationReason::NoRefreshToken,
			));
		};
		let response = self
			.transport
			.send(renewal_request(&self.config.refresh_url, &refresh)?)
			.await
			.map_err(|e| Error::RefreshFailed { source: RequestError::transport(e) })?;
		let status = response.status();

		if !status.is_success() {
			let error = Error::RefreshFailed { source: transport::status_error(response) };

			return Err(if status == http::StatusCode::UNAUTHORIZED {
				RenewalFailure::terminal(error, TerminationReason::RefreshRejected)
			} else {
				error.into()
			});
		}

		let grant = RenewalGrant::decode(status.as_u16(), response.body())
			.map_err(|source| Error::RefreshFailed { source })?;
		let access = grant.access_token.clone();

		self.vault.save(&grant.into_session(refresh)).await?;
		self.set_default_authorization(&access)?;

		Ok(access)
	}
}

fn renewal_request(url: &Url, refresh: &TokenSecret) -> Result<ApiRequest, ConfigError> {
	let body = serde_json::to_vec(&RenewalRequest { refresh_token: refresh.expose() })?;

	Ok(http::Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
		.header(ACCEPT, HeaderValue::from_static("application/json"))
		.body(body)?)
}

fn abandoned() -> Error {
	Error::RefreshFailed { source: RequestError::Abandoned }
}
