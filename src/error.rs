//! Client-level error types shared across the pipeline, stores, and transports.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reference-counted error so one failure can be fanned out to every queued caller.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// Session termination is a side effect attached to specific variants, never a separate error
/// path: callers always receive the error that triggered it.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Persisted session record is not valid JSON or lacks the expected shape.
	///
	/// The session has been terminated and the request was never dispatched.
	#[error("Persisted session record is malformed: {reason}.")]
	InvalidSessionFormat {
		/// Parser-supplied reason string.
		reason: String,
	},
	/// Server rejected the request with HTTP 401; the session has been terminated.
	#[error("Server rejected the request as unauthorized.")]
	Unauthorized(#[source] RequestError),
	/// A renewal was required but no refresh token was stored; the session has been terminated.
	#[error("No refresh token is available to renew the session.")]
	NoRefreshToken,
	/// The renewal call itself failed.
	///
	/// The session is terminated only when the renewal endpoint answered HTTP 401.
	#[error("Access token renewal failed.")]
	RefreshFailed {
		/// Failure reported by the renewal call.
		#[source]
		source: RequestError,
	},
	/// Any other transport or HTTP failure, passed through without touching the session.
	#[error(transparent)]
	RequestFailed(#[from] RequestError),
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// HTTP status attached to the failure, when the server produced one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unauthorized(source)
			| Self::RefreshFailed { source }
			| Self::RequestFailed(source) => source.status(),
			_ => None,
		}
	}
}

/// Failures observed while exchanging a single request with the remote API.
#[derive(Clone, Debug, ThisError)]
pub enum RequestError {
	/// Server answered with a non-success status.
	#[error("Server responded with HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body decoded lossily as UTF-8.
		body: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Underlying transport reported a network failure (DNS, TCP, TLS, ...).
	#[error("Network error occurred while calling the API.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Response body could not be decoded into the requested type.
	#[error("Response body could not be decoded at `{path}`: {message}.")]
	Decode {
		/// HTTP status of the response that failed to decode.
		status: u16,
		/// JSON path at which decoding failed.
		path: String,
		/// Parser message.
		message: String,
	},
	/// The renewal this request was waiting on was dropped before it settled.
	#[error("Session renewal was abandoned before it settled.")]
	Abandoned,
}
impl RequestError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Transport { source: Arc::new(src) }
	}

	/// Builds a decode failure from a path-aware JSON error.
	pub fn decode(status: u16, err: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Decode { status, path: err.path().to_string(), message: err.inner().to_string() }
	}

	/// HTTP status attached to the failure, when available.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } | Self::Decode { status, .. } => Some(*status),
			Self::Transport { .. } | Self::Abandoned => None,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for RequestError {
	fn from(e: ReqwestError) -> Self {
		Self::transport(e)
	}
}

/// Configuration and request-construction failures raised by the client.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: SharedError,
	},
	/// Base URL cannot carry relative paths.
	#[error("Base URL `{url}` cannot be used as a base.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// A relative path could not be joined onto the base URL.
	#[error("Path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A storage key was empty.
	#[error("The {which} storage key cannot be empty.")]
	EmptyStorageKey {
		/// Which key failed validation.
		which: &'static str,
	},
	/// A header value could not be rendered.
	#[error("Header `{name}` received a value that cannot be sent.")]
	InvalidHeaderValue {
		/// Header name.
		name: String,
	},
	/// Request body could not be serialized as JSON.
	#[error("Request body could not be serialized: {message}.")]
	BodySerialization {
		/// Serializer message.
		message: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<http::Error> for ConfigError {
	fn from(e: http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
impl From<serde_json::Error> for ConfigError {
	fn from(e: serde_json::Error) -> Self {
		Self::BodySerialization { message: e.to_string() }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_is_exposed_through_every_request_variant() {
		let rejected = RequestError::Status { status: 401, body: String::new(), retry_after: None };

		assert_eq!(Error::Unauthorized(rejected.clone()).status(), Some(401));
		assert_eq!(Error::RefreshFailed { source: rejected.clone() }.status(), Some(401));
		assert_eq!(Error::RequestFailed(rejected).status(), Some(401));
		assert_eq!(Error::NoRefreshToken.status(), None);
		assert_eq!(Error::RequestFailed(RequestError::Abandoned).status(), None);
	}

	#[test]
	fn refresh_failure_exposes_cause() {
		let err = Error::RefreshFailed {
			source: RequestError::Status { status: 500, body: "boom".into(), retry_after: None },
		};
		let source = StdError::source(&err).expect("Renewal failures should carry their cause.");

		assert_eq!(source.to_string(), "Server responded with HTTP 500.");
	}

	#[test]
	fn decode_errors_name_the_failing_path() {
		let de = &mut serde_json::Deserializer::from_str("{\"count\":\"x\"}");
		let err = serde_path_to_error::deserialize::<_, HashMap<String, u32>>(de)
			.expect_err("A string is not a u32.");
		let decoded = RequestError::decode(200, err);

		assert!(matches!(&decoded, RequestError::Decode { path, .. } if path == "count"));
		assert_eq!(decoded.status(), Some(200));
	}
}
