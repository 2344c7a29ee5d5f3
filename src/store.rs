//! Durable key-value storage contracts, built-in backends, and the typed session vault.
//!
//! [`KeyValueStore`] mirrors the durable string store a user agent offers: every value is an
//! opaque string under a string key. [`SessionVault`] layers the session-pair schema on top so
//! corrupt records surface as [`Error::InvalidSessionFormat`] instead of leaking into requests.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::SessionTokens, config::ClientConfig};

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for persisted client state.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Fetches the raw value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Persists or replaces the value stored under `key`.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Deletes `key`, returning the previous value if one existed.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Typed access to the session pair and the cached profile records that share its lifetime.
#[derive(Clone)]
pub struct SessionVault {
	store: Arc<dyn KeyValueStore>,
	session_key: String,
	profile_keys: Vec<String>,
}
impl SessionVault {
	/// Binds a vault to `store` using the keys declared by `config`.
	pub fn new(store: Arc<dyn KeyValueStore>, config: &ClientConfig) -> Self {
		Self {
			store,
			session_key: config.session_key.clone(),
			profile_keys: config.profile_keys.clone(),
		}
	}

	/// Reads the persisted pair.
	///
	/// Returns `Ok(None)` when nothing is stored and [`Error::InvalidSessionFormat`] when the
	/// record exists but cannot be parsed.
	pub async fn load(&self) -> Result<Option<SessionTokens>> {
		match self.store.get(&self.session_key).await? {
			Some(raw) => Ok(Some(SessionTokens::parse(&raw)?)),
			None => Ok(None),
		}
	}

	/// Overwrites the persisted pair wholesale.
	pub async fn save(&self, tokens: &SessionTokens) -> Result<()> {
		let raw = serde_json::to_string(tokens)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		self.store.set(&self.session_key, raw).await?;

		Ok(())
	}

	/// Removes the session pair and every cached profile record.
	///
	/// Every key is attempted even when an earlier removal fails; the first failure is returned.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let mut first_failure = None;

		for key in std::iter::once(&self.session_key).chain(self.profile_keys.iter()) {
			if let Err(e) = self.store.remove(key).await {
				first_failure.get_or_insert(e);
			}
		}

		match first_failure {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}
impl Debug for SessionVault {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionVault")
			.field("session_key", &self.session_key)
			.field("profile_keys", &self.profile_keys)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::auth::TokenSecret;

	fn vault() -> (SessionVault, Arc<MemoryStore>) {
		let backend = Arc::new(MemoryStore::default());
		let config = ClientConfig::builder(
			Url::parse("https://api.chemiki.example").expect("Fixture URL should parse."),
		)
		.build()
		.expect("Fixture configuration should validate.");

		(SessionVault::new(backend.clone(), &config), backend)
	}

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "quota exceeded".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("quota exceeded"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn save_then_load_round_trips() {
		let (vault, _) = vault();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for vault test.");

		rt.block_on(vault.save(&SessionTokens::new("a1", "r1")))
			.expect("Saving into memory should succeed.");

		let loaded = rt
			.block_on(vault.load())
			.expect("Loading a saved pair should succeed.")
			.expect("Saved pair should be present.");

		assert_eq!(loaded.access().map(TokenSecret::expose), Some("a1"));
	}

	#[test]
	fn corrupt_record_surfaces_invalid_format() {
		let (vault, backend) = vault();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for vault test.");

		rt.block_on(backend.set(ClientConfig::DEFAULT_SESSION_KEY, "{oops".into()))
			.expect("Raw writes should succeed.");

		let err = rt.block_on(vault.load()).expect_err("Corrupt records must not load.");

		assert!(matches!(err, Error::InvalidSessionFormat { .. }));
	}

	#[test]
	fn clear_removes_session_and_profile() {
		let (vault, backend) = vault();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for vault test.");

		rt.block_on(async {
			vault.save(&SessionTokens::new("a1", "r1")).await?;
			backend.set(ClientConfig::DEFAULT_PROFILE_KEY, "{\"name\":\"Ada\"}".into()).await?;
			backend.set("unrelated", "kept".into()).await?;
			vault.clear().await?;

			Ok::<_, Error>(())
		})
		.expect("Vault operations should succeed.");

		assert!(backend.snapshot().get(ClientConfig::DEFAULT_SESSION_KEY).is_none());
		assert!(backend.snapshot().get(ClientConfig::DEFAULT_PROFILE_KEY).is_none());
		assert_eq!(backend.snapshot().get("unrelated").map(String::as_str), Some("kept"));
	}
}
