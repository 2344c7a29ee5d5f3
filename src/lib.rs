//! Authenticated API client for the Chemiki community service: bearer sessions, single-flight
//! token renewal, and queued retries behind one typed request pipeline.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod obs;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::SessionTokens,
		config::ClientConfig,
		session::{Navigator, TerminationReason},
		store::{KeyValueStore, MemoryStore},
	};

	/// Navigator that records every login redirect instead of performing one.
	#[derive(Debug, Default)]
	pub struct RecordingNavigator(Mutex<Vec<Url>>);
	impl RecordingNavigator {
		/// Returns every login URL the pipeline navigated to, oldest first.
		pub fn redirects(&self) -> Vec<Url> {
			self.0.lock().clone()
		}

		/// Returns how many times the session was terminated.
		pub fn redirect_count(&self) -> usize {
			self.0.lock().len()
		}
	}
	impl Navigator for RecordingNavigator {
		fn to_login(&self, login_url: &Url, _reason: TerminationReason) {
			self.0.lock().push(login_url.clone());
		}
	}

	/// Builds a configuration rooted at `base_url` with default keys and paths.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder(Url::parse(base_url).expect("Test base URL should parse."))
			.build()
			.expect("Default test configuration should validate.")
	}

	/// Seeds a serialized session pair under the default session key.
	pub async fn seed_session(store: &MemoryStore, access: &str, refresh: &str) {
		let raw = serde_json::to_string(&SessionTokens::new(access, refresh))
			.expect("Session fixture should serialize.");

		store
			.set(ClientConfig::DEFAULT_SESSION_KEY, raw)
			.await
			.expect("Failed to seed the session record into the store.");
	}

	/// Reads back the session pair persisted under the default session key, if any.
	pub async fn stored_session(store: &MemoryStore) -> Option<SessionTokens> {
		store
			.get(ClientConfig::DEFAULT_SESSION_KEY)
			.await
			.expect("Memory store reads should not fail.")
			.map(|raw| {
				serde_json::from_str(&raw).expect("Persisted session record should be valid JSON.")
			})
	}

	#[cfg(feature = "reqwest")]
	/// Constructs a reqwest-backed client over an in-memory store and recording navigator.
	pub fn build_reqwest_test_client(
		base_url: &str,
	) -> (crate::pipeline::ReqwestApiClient, Arc<MemoryStore>, Arc<RecordingNavigator>) {
		let store = Arc::new(MemoryStore::default());
		let navigator = Arc::new(RecordingNavigator::default());
		let client = crate::pipeline::ApiClient::new(
			test_config(base_url),
			store.clone(),
			navigator.clone(),
		);

		(client, store, navigator)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
