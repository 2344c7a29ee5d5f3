//! Session termination: clearing persisted credentials and sending the user agent to login.

// self
use crate::{
	_prelude::*,
	obs::{self, Stage, StageOutcome},
	store::SessionVault,
};

/// Why a session was terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TerminationReason {
	/// A request was answered with HTTP 401.
	Unauthorized,
	/// The persisted session record could not be parsed.
	InvalidSessionFormat,
	/// A renewal was required but no refresh token was stored.
	NoRefreshToken,
	/// The renewal endpoint rejected the refresh token with HTTP 401.
	RefreshRejected,
	/// The user signed out explicitly.
	SignedOut,
}
impl TerminationReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TerminationReason::Unauthorized => "unauthorized",
			TerminationReason::InvalidSessionFormat => "invalid_session_format",
			TerminationReason::NoRefreshToken => "no_refresh_token",
			TerminationReason::RefreshRejected => "refresh_rejected",
			TerminationReason::SignedOut => "signed_out",
		}
	}
}
impl Display for TerminationReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Moves the user agent to the login entry point after a session ends.
///
/// Browser shells perform a full navigation; headless embeddings may simply record the event.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Navigates to `login_url`. Called once per termination, after storage is cleared.
	fn to_login(&self, login_url: &Url, reason: TerminationReason);
}

/// Navigator that does nothing, for embeddings without a user agent.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;
impl Navigator for NoopNavigator {
	fn to_login(&self, _login_url: &Url, _reason: TerminationReason) {}
}

/// Adapts a closure into a [`Navigator`].
pub struct FnNavigator<F>(pub F);
impl<F> Navigator for FnNavigator<F>
where
	F: Send + Sync + Fn(&Url, TerminationReason),
{
	fn to_login(&self, login_url: &Url, reason: TerminationReason) {
		(self.0)(login_url, reason)
	}
}
impl<F> Debug for FnNavigator<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FnNavigator(..)")
	}
}

/// Clears the persisted session and cached profile, then navigates to login.
#[derive(Clone)]
pub struct SessionTerminator {
	vault: SessionVault,
	navigator: Arc<dyn Navigator>,
	login_url: Url,
}
impl SessionTerminator {
	/// Creates a terminator over `vault` that redirects to `login_url`.
	pub fn new(vault: SessionVault, navigator: Arc<dyn Navigator>, login_url: Url) -> Self {
		Self { vault, navigator, login_url }
	}

	/// Ends the session. One-way: storage failures are recorded but navigation still happens,
	/// and the caller keeps propagating whatever error triggered termination.
	pub async fn terminate(&self, reason: TerminationReason) {
		obs::record_termination(reason);

		if let Err(e) = self.vault.clear().await {
			obs::record_outcome(Stage::Termination, StageOutcome::Failure);
			obs::note_storage_failure(&e);
		}

		self.navigator.to_login(&self.login_url, reason);
	}
}
impl Debug for SessionTerminator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTerminator")
			.field("vault", &self.vault)
			.field("login_url", &self.login_url.as_str())
			.finish()
	}
}
