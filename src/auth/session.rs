//! Persisted session pair and renewal payload decoding.
//!
//! The session record lives under a single key as `{"accessToken": ..., "refreshToken": ...}`.
//! Renewal responses arrive either wrapped as `{"data": {...}}` or as the bare pair; the nested
//! shape is probed first.

// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, auth::TokenSecret, error::RequestError};

/// Access/refresh credential pair persisted between requests.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
	/// Short-lived bearer credential.
	#[serde(default)]
	pub access_token: Option<TokenSecret>,
	/// Long-lived credential used only to renew the access token.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}
impl SessionTokens {
	/// Creates a pair carrying both credentials.
	pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
		Self {
			access_token: Some(TokenSecret::new(access)),
			refresh_token: Some(TokenSecret::new(refresh)),
		}
	}

	/// Parses a raw persisted record, rejecting anything that is not a JSON object of the
	/// expected shape.
	pub fn parse(raw: &str) -> Result<Self, SessionFormatError> {
		let value: Value = serde_json::from_str(raw)
			.map_err(|e| SessionFormatError { reason: format!("invalid JSON: {e}") })?;

		if !value.is_object() {
			return Err(SessionFormatError { reason: "expected a JSON object".into() });
		}

		serde_path_to_error::deserialize(&value).map_err(|e| SessionFormatError {
			reason: format!("field `{}`: {}", e.path(), e.inner()),
		})
	}

	/// Returns the access token when present and non-empty.
	pub fn access(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref().filter(|secret| !secret.is_empty())
	}

	/// Returns the refresh token when present and non-empty.
	pub fn refresh(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|secret| !secret.is_empty())
	}
}
impl Debug for SessionTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTokens")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Raised when a persisted session record cannot be interpreted.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{reason}")]
pub struct SessionFormatError {
	/// Human-readable description of the defect.
	pub reason: String,
}
impl From<SessionFormatError> for Error {
	fn from(e: SessionFormatError) -> Self {
		Error::InvalidSessionFormat { reason: e.reason }
	}
}

/// Credentials returned by the renewal endpoint.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalGrant {
	/// Fresh access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the server issued one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}
impl RenewalGrant {
	/// Decodes a renewal response body of HTTP status `status`.
	pub fn decode(status: u16, body: &[u8]) -> Result<Self, RequestError> {
		let value: Value =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(body))
				.map_err(|e| RequestError::decode(status, e))?;
		let payload = value
			.get("data")
			.filter(|nested| nested.get("accessToken").is_some())
			.unwrap_or(&value);
		let grant: Self =
			serde_path_to_error::deserialize(payload).map_err(|e| RequestError::decode(status, e))?;

		if grant.access_token.is_empty() {
			return Err(RequestError::Decode {
				status,
				path: "accessToken".into(),
				message: "access token is empty".into(),
			});
		}

		Ok(grant)
	}

	/// Builds the pair to persist, keeping `previous_refresh` when no rotation happened.
	pub fn into_session(self, previous_refresh: TokenSecret) -> SessionTokens {
		let refresh =
			self.refresh_token.filter(|secret| !secret.is_empty()).unwrap_or(previous_refresh);

		SessionTokens { access_token: Some(self.access_token), refresh_token: Some(refresh) }
	}
}
impl Debug for RenewalGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RenewalGrant")
			.field("access_token", &"<redacted>")
			.field("refresh_token_rotated", &self.refresh_token.is_some())
			.finish()
	}
}
