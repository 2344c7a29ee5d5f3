// std
use std::{env, fs, process};
// self
use chemiki_client::{
	_preludet::*,
	auth::{SessionTokens, TokenSecret},
	config::ClientConfig,
	store::{FileStore, KeyValueStore, MemoryStore, SessionVault},
};

fn config() -> ClientConfig {
	ClientConfig::builder(
		Url::parse("https://api.chemiki.example").expect("Failed to parse fixture base URL."),
	)
	.session_key("auth")
	.profile_keys(["profile", "avatar"])
	.build()
	.expect("Fixture configuration should validate.")
}

#[tokio::test]
async fn vault_uses_configured_keys() {
	let backend = Arc::new(MemoryStore::default());
	let vault = SessionVault::new(backend.clone(), &config());

	vault.save(&SessionTokens::new("a1", "r1")).await.expect("Saving the pair should succeed.");

	let raw = backend
		.get("auth")
		.await
		.expect("Memory store reads should not fail.")
		.expect("Pair should be stored under the configured key.");
	let value: serde_json::Value =
		serde_json::from_str(&raw).expect("Persisted record should be valid JSON.");

	assert_eq!(value, serde_json::json!({ "accessToken": "a1", "refreshToken": "r1" }));
	assert!(backend.get(ClientConfig::DEFAULT_SESSION_KEY).await.expect("Read.").is_none());
}

#[tokio::test]
async fn vault_clear_drops_profile_records_only() {
	let backend = Arc::new(MemoryStore::default());
	let vault = SessionVault::new(backend.clone(), &config());

	vault.save(&SessionTokens::new("a1", "r1")).await.expect("Saving the pair should succeed.");

	for (key, value) in [("profile", "{}"), ("avatar", "ada.png"), ("theme", "dark")] {
		backend.set(key, value.into()).await.expect("Failed to seed fixture record.");
	}

	vault.clear().await.expect("Clearing should succeed.");

	let remaining = backend.snapshot();

	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining.get("theme").map(String::as_str), Some("dark"));
	assert!(vault.load().await.expect("Loading an empty vault should succeed.").is_none());
}

#[tokio::test]
async fn records_missing_fields_load_as_partial_pairs() {
	let backend = Arc::new(MemoryStore::default());
	let vault = SessionVault::new(backend.clone(), &config());

	backend.set("auth", "{\"accessToken\":\"\"}".into()).await.expect("Raw writes should succeed.");

	let tokens = vault
		.load()
		.await
		.expect("Records with missing fields should load.")
		.expect("Record should be present.");

	assert!(tokens.access().is_none());
	assert!(tokens.refresh().is_none());

	backend.set("auth", "[\"a1\",\"r1\"]".into()).await.expect("Raw writes should succeed.");

	let err = vault.load().await.expect_err("Arrays are not session records.");

	assert!(matches!(err, Error::InvalidSessionFormat { .. }));
}

#[tokio::test]
async fn file_store_backs_a_vault_across_reopen() {
	let path = env::temp_dir().join(format!(
		"chemiki_client_store_it_{}_{}/state.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	));
	let config = config();

	{
		let backend = Arc::new(FileStore::open(&path).expect("Failed to open file store."));
		let vault = SessionVault::new(backend, &config);

		vault
			.save(&SessionTokens::new("a1", "r1"))
			.await
			.expect("Saving through the file store should succeed.");
	}

	let reopened = Arc::new(FileStore::open(&path).expect("Failed to reopen file store."));
	let vault = SessionVault::new(reopened.clone(), &config);
	let tokens = vault
		.load()
		.await
		.expect("Loading after reopen should succeed.")
		.expect("Pair should survive a reopen.");

	assert_eq!(tokens.refresh().map(TokenSecret::expose), Some("r1"));
	assert_eq!(reopened.path(), path.as_path());

	if let Some(dir) = path.parent() {
		fs::remove_dir_all(dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}
}
