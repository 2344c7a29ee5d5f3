//! Validated client configuration: API base URL, renewal endpoint, login entry point, and the
//! storage keys the session lives under.

// self
use crate::{_prelude::*, error::ConfigError};

/// Immutable configuration consumed by [`ApiClient`](crate::pipeline::ApiClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Root every relative request path is joined onto; always ends with `/`.
	pub base_url: Url,
	/// Absolute URL of the access-token renewal endpoint.
	pub refresh_url: Url,
	/// Login entry point the user agent is sent to when the session terminates.
	pub login_url: Url,
	/// Storage key holding the serialized session pair.
	pub session_key: String,
	/// Additional cached-profile keys removed alongside the session on termination.
	pub profile_keys: Vec<String>,
}
impl ClientConfig {
	/// Default storage key for the session pair.
	pub const DEFAULT_SESSION_KEY: &'static str = "chemiki-authToken";
	/// Default storage key for the cached user profile.
	pub const DEFAULT_PROFILE_KEY: &'static str = "chemiki-profile";
	/// Default renewal path, relative to the base URL.
	pub const DEFAULT_REFRESH_PATH: &'static str = "api/auth/refresh-token";
	/// Default login path, relative to the base URL.
	pub const DEFAULT_LOGIN_PATH: &'static str = "login";

	/// Creates a new builder rooted at `base_url`.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves a request path against the base URL.
	///
	/// Leading slashes are ignored so `"/posts"` and `"posts"` address the same resource
	/// underneath any base path prefix.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		join(&self.base_url, path)
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	refresh_path: String,
	login_url: Option<Url>,
	session_key: String,
	profile_keys: Vec<String>,
}
impl ClientConfigBuilder {
	fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: ClientConfig::DEFAULT_REFRESH_PATH.into(),
			login_url: None,
			session_key: ClientConfig::DEFAULT_SESSION_KEY.into(),
			profile_keys: vec![ClientConfig::DEFAULT_PROFILE_KEY.into()],
		}
	}

	/// Overrides the renewal path (relative to the base URL).
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the login entry point (defaults to `{base}/login`).
	pub fn login_url(mut self, url: Url) -> Self {
		self.login_url = Some(url);

		self
	}

	/// Overrides the session storage key.
	pub fn session_key(mut self, key: impl Into<String>) -> Self {
		self.session_key = key.into();

		self
	}

	/// Replaces the cached-profile keys cleared on termination.
	pub fn profile_keys<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.profile_keys = keys.into_iter().map(Into::into).collect();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}
		if self.session_key.trim().is_empty() {
			return Err(ConfigError::EmptyStorageKey { which: "session" });
		}
		if self.profile_keys.iter().any(|key| key.trim().is_empty()) {
			return Err(ConfigError::EmptyStorageKey { which: "profile" });
		}

		let mut base_url = self.base_url;

		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let refresh_url = join(&base_url, &self.refresh_path)?;
		let login_url = match self.login_url {
			Some(url) => url,
			None => join(&base_url, ClientConfig::DEFAULT_LOGIN_PATH)?,
		};

		Ok(ClientConfig {
			base_url,
			refresh_url,
			login_url,
			session_key: self.session_key,
			profile_keys: self.profile_keys,
		})
	}
}

fn join(base: &Url, path: &str) -> Result<Url, ConfigError> {
	base.join(path.trim_start_matches('/'))
		.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
}
