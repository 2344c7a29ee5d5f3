//! The authenticated request pipeline.
//!
//! Every call made through [`ApiClient`] runs the same stages:
//!
//! 1. Outbound interception reads the persisted session, attaches `Authorization: Bearer ...` when
//!    an access token exists, and stamps `X-Request-Time`. A corrupt record terminates the session
//!    and fails with [`Error::InvalidSessionFormat`] before anything is sent.
//! 2. The transport dispatches the request.
//! 3. Inbound interception unwraps 2xx bodies, terminates the session on 401, and on the first 403
//!    joins (or leads) the single-flight renewal before retrying the request exactly once.

mod options;
mod refresh;

pub use options::RequestOptions;
pub use refresh::{RefreshMetrics, RefreshPhase};

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{SessionTokens, TokenSecret},
	config::ClientConfig,
	error::{ConfigError, RequestError},
	obs::{self, Stage, StageOutcome, StageSpan},
	pipeline::refresh::RefreshCoordinator,
	session::{Navigator, SessionTerminator, TerminationReason},
	store::{KeyValueStore, SessionVault},
	transport::{self, ApiRequest, ApiResponse, ApiTransport},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

/// Header carrying the moment a request left the process, for server-side correlation.
pub const REQUEST_TIME_HEADER: HeaderName = HeaderName::from_static("x-request-time");

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Mediates every outbound call to the remote API.
///
/// Renewal state (the in-flight flag and the queue of parked callers) belongs to the instance,
/// so independently constructed clients never share it. Clones share it, along with the
/// transport, store, and default headers.
pub struct ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// HTTP transport used for every outbound request, including renewals.
	pub transport: Arc<T>,
	/// Validated endpoint and storage configuration.
	pub config: ClientConfig,
	/// Shared counters for renewal outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	vault: SessionVault,
	terminator: SessionTerminator,
	default_headers: Arc<RwLock<HeaderMap>>,
	refresh: Arc<RefreshCoordinator>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a client over the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn KeyValueStore>,
		navigator: Arc<dyn Navigator>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let vault = SessionVault::new(store, &config);
		let terminator = SessionTerminator::new(vault.clone(), navigator, config.login_url.clone());
		let mut default_headers = HeaderMap::new();

		default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		Self {
			transport: transport.into(),
			config,
			refresh_metrics: Default::default(),
			vault,
			terminator,
			default_headers: Arc::new(RwLock::new(default_headers)),
			refresh: Default::default(),
		}
	}

	/// Issues a `GET` and decodes the response body.
	pub async fn get<R>(&self, path: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.request(Method::GET, path, None, options).await
	}

	/// Issues a `DELETE` and decodes the response body.
	pub async fn delete<R>(&self, path: &str, options: RequestOptions) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.request(Method::DELETE, path, None, options).await
	}

	/// Issues a `POST` with a JSON body and decodes the response body.
	pub async fn post<B, R>(&self, path: &str, body: &B, options: RequestOptions) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.request(Method::POST, path, Some(encode_body(body)?), options).await
	}

	/// Issues a `PUT` with a JSON body and decodes the response body.
	pub async fn put<B, R>(&self, path: &str, body: &B, options: RequestOptions) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.request(Method::PUT, path, Some(encode_body(body)?), options).await
	}

	/// Issues a `PATCH` with a JSON body and decodes the response body.
	pub async fn patch<B, R>(&self, path: &str, body: &B, options: RequestOptions) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.request(Method::PATCH, path, Some(encode_body(body)?), options).await
	}

	/// Runs `method` against `path` through the full pipeline.
	///
	/// `body` must already be JSON-encoded. The decoded payload is returned; transport metadata
	/// never reaches the caller. An empty body decodes from JSON `null`, so `()` and
	/// `Option<_>` accept `204 No Content`.
	pub async fn request<R>(
		&self,
		method: Method,
		path: &str,
		body: Option<Vec<u8>>,
		options: RequestOptions,
	) -> Result<R>
	where
		R: DeserializeOwned,
	{
		const STAGE: Stage = Stage::Request;

		let span = StageSpan::new(STAGE, "request");

		obs::record_outcome(STAGE, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut url = self.config.endpoint(path)?;

				if !options.query.is_empty() {
					url.query_pairs_mut().extend_pairs(&options.query);
				}

				let mut request = PreparedRequest::new(method, url, options.headers, body);

				self.intercept_outbound(&mut request).await?;

				let (status, payload) = self.execute(request).await?;

				decode_payload(status, &payload)
			})
			.await;

		match &result {
			Ok(_) => obs::record_outcome(STAGE, StageOutcome::Success),
			Err(_) => obs::record_outcome(STAGE, StageOutcome::Failure),
		}

		result
	}

	/// Persists a freshly issued pair (e.g. after sign-in) and makes it the default credential.
	pub async fn establish_session(&self, tokens: SessionTokens) -> Result<()> {
		self.vault.save(&tokens).await?;

		match tokens.access() {
			Some(access) => self.set_default_authorization(access)?,
			None => {
				self.default_headers.write().remove(AUTHORIZATION);
			},
		}

		Ok(())
	}

	/// Ends the session on the user's behalf: clears storage and navigates to login.
	pub async fn sign_out(&self) {
		self.terminate(TerminationReason::SignedOut).await;
	}

	/// Snapshot of the renewal state machine.
	pub fn refresh_phase(&self) -> RefreshPhase {
		self.refresh.phase()
	}

	async fn intercept_outbound(&self, request: &mut PreparedRequest) -> Result<()> {
		let session = match self.vault.load().await {
			Ok(session) => session,
			Err(err @ Error::InvalidSessionFormat { .. }) => {
				self.terminate(TerminationReason::InvalidSessionFormat).await;

				return Err(err);
			},
			Err(err) => return Err(err),
		};

		{
			let defaults = self.default_headers.read();

			for (name, value) in defaults.iter() {
				request.headers.entry(name).or_insert_with(|| value.clone());
			}
		}

		if let Some(access) = session.as_ref().and_then(SessionTokens::access) {
			request.authorize(access)?;
		}

		request.stamp()?;

		Ok(())
	}

	/// Dispatches `request`, retrying it at most once after a renewal.
	async fn execute(&self, mut request: PreparedRequest) -> Result<(u16, Vec<u8>)> {
		loop {
			let response = self.dispatch(&request).await?;
			let status = response.status();

			if status.is_success() {
				return Ok((status.as_u16(), response.into_body()));
			}

			let failure = transport::status_error(response);

			match status {
				StatusCode::UNAUTHORIZED => {
					self.terminate(TerminationReason::Unauthorized).await;

					return Err(Error::Unauthorized(failure));
				},
				StatusCode::FORBIDDEN if !request.retried => {
					request.retried = true;

					let access = self.renewed_access_token().await?;

					request.authorize(&access)?;
					request.stamp()?;
				},
				_ => return Err(Error::RequestFailed(failure)),
			}
		}
	}

	async fn dispatch(&self, request: &PreparedRequest) -> Result<ApiResponse> {
		self.send_raw(request.to_http()?).await
	}

	/// Sends straight through the transport, bypassing interception.
	async fn send_raw(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.transport
			.send(request)
			.await
			.map_err(|e| Error::RequestFailed(RequestError::transport(e)))
	}

	async fn terminate(&self, reason: TerminationReason) {
		self.default_headers.write().remove(AUTHORIZATION);
		self.terminator.terminate(reason).await;
	}

	fn set_default_authorization(&self, access: &TokenSecret) -> Result<()> {
		let value = access
			.bearer_header()
			.map_err(|_| ConfigError::InvalidHeaderValue { name: AUTHORIZATION.to_string() })?;

		self.default_headers.write().insert(AUTHORIZATION, value);

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client that provisions its own reqwest-backed transport.
	pub fn new(
		config: ClientConfig,
		store: Arc<dyn KeyValueStore>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		Self::with_transport(config, store, navigator, ReqwestTransport::default())
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			vault: self.vault.clone(),
			terminator: self.terminator.clone(),
			default_headers: self.default_headers.clone(),
			refresh: self.refresh.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("refresh_phase", &self.refresh.phase())
			.finish()
	}
}

/// A request frozen after outbound interception so it can be re-dispatched verbatim.
#[derive(Clone, Debug)]
struct PreparedRequest {
	method: Method,
	url: Url,
	headers: HeaderMap,
	body: Vec<u8>,
	retried: bool,
}
impl PreparedRequest {
	fn new(method: Method, url: Url, mut headers: HeaderMap, body: Option<Vec<u8>>) -> Self {
		if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
			headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		}

		Self { method, url, headers, body: body.unwrap_or_default(), retried: false }
	}

	fn authorize(&mut self, access: &TokenSecret) -> Result<(), ConfigError> {
		let value = access
			.bearer_header()
			.map_err(|_| ConfigError::InvalidHeaderValue { name: AUTHORIZATION.to_string() })?;

		self.headers.insert(AUTHORIZATION, value);

		Ok(())
	}

	fn stamp(&mut self) -> Result<(), ConfigError> {
		let invalid = || ConfigError::InvalidHeaderValue { name: REQUEST_TIME_HEADER.to_string() };
		let now = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|_| invalid())?;
		let value = HeaderValue::try_from(now).map_err(|_| invalid())?;

		self.headers.insert(REQUEST_TIME_HEADER, value);

		Ok(())
	}

	fn to_http(&self) -> Result<ApiRequest, ConfigError> {
		let mut request = http::Request::builder()
			.method(self.method.clone())
			.uri(self.url.as_str())
			.body(self.body.clone())?;

		*request.headers_mut() = self.headers.clone();

		Ok(request)
	}
}

fn encode_body<B>(body: &B) -> Result<Vec<u8>>
where
	B: ?Sized + Serialize,
{
	serde_json::to_vec(body).map_err(|e| ConfigError::from(e).into())
}

fn decode_payload<R>(status: u16, payload: &[u8]) -> Result<R>
where
	R: DeserializeOwned,
{
	let decoded = if payload.iter().all(u8::is_ascii_whitespace) {
		serde_path_to_error::deserialize(serde_json::Value::Null)
	} else {
		serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(payload))
	};

	decoded.map_err(|e| RequestError::decode(status, e).into())
}
