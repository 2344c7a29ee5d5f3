//! Transport primitives for API calls.
//!
//! The pipeline speaks plain [`http`] types so downstream crates can plug in any HTTP stack by
//! implementing [`ApiTransport`]. The default reqwest-backed [`ReqwestTransport`] ships behind
//! the `reqwest` feature.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use http::{HeaderMap, header::RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, RequestError},
};

/// Outbound request as seen by a transport.
pub type ApiRequest = http::Request<Vec<u8>>;
/// Raw response handed back by a transport; the pipeline unwraps it before callers see it.
pub type ApiResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing API requests.
///
/// The trait is the client's only dependency on an HTTP implementation. Transports must return
/// every HTTP response, including non-2xx statuses, as `Ok`; `Err` is reserved for failures
/// where no response exists (DNS, TCP, TLS, malformed requests). Implementations must be
/// `Send + Sync + 'static` so one transport can be shared by clones of the pipeline.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes `request` exactly once.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a transport from a configured reqwest builder (timeouts, proxies, TLS roots).
	pub fn from_builder(builder: reqwest::ClientBuilder) -> Result<Self, ConfigError> {
		builder.build().map(Self).map_err(ConfigError::http_client_build)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	type TransportError = ReqwestError;

	fn send(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = ApiResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok::<_, ReqwestError>(response_new)
		})
	}
}

/// Converts a non-success response into [`RequestError::Status`], keeping the body text and any
/// `Retry-After` hint.
pub fn status_error(response: ApiResponse) -> RequestError {
	let status = response.status().as_u16();
	let retry_after = parse_retry_after(response.headers());
	let body = String::from_utf8_lossy(response.body()).into_owned();

	RequestError::Status { status, body, retry_after }
}

/// Reads a `Retry-After` header given either as delta-seconds or as an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::HeaderValue;
	// self
	use super::*;

	fn headers(value: &str) -> HeaderMap {
		let mut map = HeaderMap::new();

		map.insert(RETRY_AFTER, HeaderValue::from_str(value).expect("Header fixture is valid."));

		map
	}

	#[test]
	fn retry_after_accepts_seconds() {
		assert_eq!(parse_retry_after(&headers("120")), Some(Duration::seconds(120)));
		assert_eq!(parse_retry_after(&headers(" 7 ")), Some(Duration::seconds(7)));
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
		assert_eq!(parse_retry_after(&headers("soon")), None);
	}

	#[test]
	fn retry_after_ignores_past_dates() {
		assert_eq!(parse_retry_after(&headers("Wed, 21 Oct 2015 07:28:00 GMT")), None);
	}

	#[test]
	fn status_error_keeps_body_and_hint() {
		let mut response = ApiResponse::new(b"{\"message\":\"down\"}".to_vec());

		*response.status_mut() = http::StatusCode::SERVICE_UNAVAILABLE;
		*response.headers_mut() = headers("30");

		match status_error(response) {
			RequestError::Status { status, body, retry_after } => {
				assert_eq!(status, 503);
				assert_eq!(body, "{\"message\":\"down\"}");
				assert_eq!(retry_after, Some(Duration::seconds(30)));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}
}
