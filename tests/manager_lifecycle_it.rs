mod common;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use time::{Duration, OffsetDateTime};
// self
use common::{FailingStore, ScriptedProvider, Step};
use docproxy_auth::{
	TokenManager,
	auth::{TokenSecret, TokenState},
	config::{BaselineConfig, ClientProfile},
	error::{AuthError, FailureKind},
	store::{FileStore, MemoryStore, PersistedState, StoreKind, TokenStore},
};

fn refresh_of(state: &TokenState) -> Option<&str> {
	state.refresh_token().map(TokenSecret::expose)
}

#[tokio::test]
async fn valid_token_is_served_without_calling_the_provider() {
	let provider = ScriptedProvider::new([]);
	let store = Arc::new(MemoryStore::seeded(PersistedState {
		access_token: Some(TokenSecret::new("at-0")),
		token_expiry: Some(OffsetDateTime::now_utc() + Duration::hours(1)),
		..common::persisted("rt-old")
	}));
	let manager = TokenManager::builder(provider.clone(), common::baseline("rt-old"))
		.with_store(store)
		.build()
		.await;
	let token = manager.get_valid_token().await.expect("Restored token should be served.");

	assert_eq!(token.expose(), "at-0");
	assert!(!manager.is_expired());
	assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn missing_access_token_triggers_a_rotating_refresh() {
	let provider = ScriptedProvider::new([Step::rotate("at-1", "rt-new")]);
	let store = Arc::new(MemoryStore::default());
	let manager = TokenManager::builder(provider.clone(), common::baseline("rt-old"))
		.with_store(store.clone())
		.build()
		.await;
	let before = OffsetDateTime::now_utc();
	let token = manager.get_valid_token().await.expect("Refresh should succeed.");
	let after = OffsetDateTime::now_utc();
	let state = manager.state();
	let expiry = state.token_expiry().expect("Refreshed state should carry an expiry.");

	assert_eq!(token.expose(), "at-1");
	assert_eq!(provider.seen_refresh_tokens(), ["rt-old"]);
	assert_eq!(refresh_of(&state), Some("rt-new"));
	assert!(expiry >= before + Duration::hours(1) && expiry <= after + Duration::hours(1));

	let record = store.snapshot().expect("Rotation should be persisted.");

	assert_eq!(record.refresh_token.expose(), "rt-new");
	assert_eq!(record.access_token.as_ref().map(TokenSecret::expose), Some("at-1"));
}

#[tokio::test]
async fn unchanged_refresh_token_is_kept() {
	let provider = ScriptedProvider::new([Step::keep("at-1"), Step::rotate("at-2", "rt-old")]);
	let manager = TokenManager::builder(provider.clone(), common::baseline("rt-old")).build().await;

	manager.refresh().await.expect("Refresh without rotation should succeed.");

	assert_eq!(refresh_of(&manager.state()), Some("rt-old"));

	manager.refresh().await.expect("Refresh echoing the refresh token should succeed.");

	assert_eq!(refresh_of(&manager.state()), Some("rt-old"));
	assert_eq!(manager.state().access_token().map(TokenSecret::expose), Some("at-2"));
	assert_eq!(provider.seen_refresh_tokens(), ["rt-old", "rt-old"]);
}

#[tokio::test]
async fn rejected_refresh_leaves_state_untouched() {
	let provider = ScriptedProvider::new([Step::Reject, Step::Transient]);
	let manager = TokenManager::builder(provider.clone(), common::baseline("rt-old")).build().await;
	let before = manager.state();

	assert_eq!(manager.refresh().await, Err(AuthError::Unavailable));
	assert_eq!(manager.state(), before);

	let health = manager.status();
	let failure = health.last_failure.expect("Rejection should be recorded.");

	assert_eq!(failure.kind, FailureKind::Rejection);
	assert!(!failure.message.contains("rt-old"), "Failure messages must not leak secrets.");

	assert_eq!(manager.get_valid_token().await, Err(AuthError::Unavailable));
	assert_eq!(manager.state(), before);
	assert_eq!(
		manager.status().last_failure.map(|note| note.kind),
		Some(FailureKind::Transient)
	);
	assert_eq!(manager.refresh_metrics().failures(), 2);
}

#[tokio::test]
async fn persisted_refresh_token_wins_over_baseline() {
	let path = common::temp_path("persisted_wins");
	let store = Arc::new(FileStore::new(&path));

	store.save(&common::persisted("rt-persisted")).await.expect("Seeding the file should work.");

	let provider = ScriptedProvider::new([]);
	let manager = TokenManager::builder(provider, common::baseline("rt-baseline"))
		.with_store(store)
		.build()
		.await;

	assert_eq!(refresh_of(&manager.state()), Some("rt-persisted"));
	assert_eq!(manager.baseline(), common::baseline("rt-baseline"));
}

#[tokio::test]
async fn persistence_failure_does_not_fail_the_refresh() {
	let provider = ScriptedProvider::new([Step::rotate("at-1", "rt-new")]);
	let store = Arc::new(FailingStore::default());
	let manager = TokenManager::builder(provider, common::baseline("rt-old"))
		.with_store(store.clone())
		.build()
		.await;

	manager.refresh().await.expect("Refresh should succeed despite the failing store.");

	let token = manager.get_valid_token().await.expect("In-memory token should stay usable.");
	let health = manager.status();

	assert_eq!(token.expose(), "at-1");
	assert_eq!(refresh_of(&manager.state()), Some("rt-new"));
	assert!(health.token_valid);
	assert!(health.last_failure.is_none());
	assert!(
		health.last_persist_error.as_deref().is_some_and(|e| e.contains("read-only")),
		"Persistence failure should surface in health: {health:?}."
	);
	assert_eq!(health.persist_failures, 1);
}

#[tokio::test]
async fn concurrent_callers_share_one_successful_flight() {
	let provider = ScriptedProvider::with_delay(
		[Step::rotate("at-1", "rt-new")],
		StdDuration::from_millis(100),
	);
	let manager = Arc::new(
		TokenManager::builder(provider.clone(), common::baseline("rt-old")).build().await,
	);
	let handles = (0..8)
		.map(|_| {
			let manager = manager.clone();

			tokio::spawn(async move { manager.get_valid_token().await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let token = handle
			.await
			.expect("Caller task should not panic.")
			.expect("Every caller should receive the refreshed token.");

		assert_eq!(token.expose(), "at-1");
	}

	assert_eq!(provider.calls(), 1);
	assert_eq!(refresh_of(&manager.state()), Some("rt-new"));
	assert_eq!(manager.refresh_metrics().coalesced(), 7);
}

#[tokio::test]
async fn valid_token_is_served_while_a_refresh_is_in_flight() {
	let provider = ScriptedProvider::with_delay(
		[Step::rotate("at-1", "rt-new")],
		StdDuration::from_millis(500),
	);
	let store = Arc::new(MemoryStore::seeded(PersistedState {
		access_token: Some(TokenSecret::new("at-0")),
		token_expiry: Some(OffsetDateTime::now_utc() + Duration::hours(1)),
		..common::persisted("rt-old")
	}));
	let manager = Arc::new(
		TokenManager::builder(provider.clone(), common::baseline("rt-old"))
			.with_store(store)
			.build()
			.await,
	);
	let in_flight = {
		let manager = manager.clone();

		tokio::spawn(async move { manager.refresh().await })
	};

	tokio::time::sleep(StdDuration::from_millis(50)).await;

	assert_eq!(provider.calls(), 1, "The forced refresh should hold the single-flight lock.");

	let token = tokio::time::timeout(StdDuration::from_millis(50), manager.get_valid_token())
		.await
		.expect("A valid token must not wait for the refresh lock.")
		.expect("The current token should be served.");

	assert_eq!(token.expose(), "at-0");

	in_flight
		.await
		.expect("Refresh task should not panic.")
		.expect("Forced refresh should succeed.");

	let token = manager.get_valid_token().await.expect("Refreshed token should be served.");

	assert_eq!(token.expose(), "at-1");
	assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn concurrent_callers_share_one_failed_flight() {
	let provider = ScriptedProvider::with_delay([Step::Reject], StdDuration::from_millis(100));
	let manager = Arc::new(
		TokenManager::builder(provider.clone(), common::baseline("rt-old")).build().await,
	);
	let handles = (0..4)
		.map(|_| {
			let manager = manager.clone();

			tokio::spawn(async move { manager.get_valid_token().await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let outcome = handle.await.expect("Caller task should not panic.");

		assert_eq!(outcome, Err(AuthError::Unavailable));
	}

	assert_eq!(provider.calls(), 1);
	assert_eq!(refresh_of(&manager.state()), Some("rt-old"));
}

#[tokio::test]
async fn reset_reseeds_from_baseline_and_replaces_the_persisted_record() {
	let path = common::temp_path("reset");
	let store = Arc::new(FileStore::new(&path));

	store.save(&common::persisted("rt-persisted")).await.expect("Seeding the file should work.");

	let provider = ScriptedProvider::new([Step::rotate("at-reset", "rt-after-reset")]);
	let manager = TokenManager::builder(provider.clone(), common::baseline("rt-baseline"))
		.with_store(store.clone())
		.build()
		.await;

	manager.reset().await.expect("Reset should refresh successfully.");

	assert_eq!(provider.seen_refresh_tokens(), ["rt-baseline"]);
	assert_eq!(refresh_of(&manager.state()), Some("rt-after-reset"));

	let record = store
		.load()
		.await
		.expect("Loading the file should succeed.")
		.expect("Reset should persist the new state.");

	assert_eq!(record.refresh_token.expose(), "rt-after-reset");
	assert_ne!(record.refresh_token.expose(), "rt-persisted");
}

#[tokio::test]
async fn reset_with_installs_a_new_baseline() {
	let provider = ScriptedProvider::new([Step::Reject, Step::rotate("at-1", "rt-next")]);
	let manager =
		TokenManager::builder(provider.clone(), common::baseline("rt-revoked")).build().await;

	assert!(manager.refresh().await.is_err());

	manager.reset_with(common::baseline("rt-fresh")).await.expect("Reset should succeed.");

	assert_eq!(provider.seen_refresh_tokens(), ["rt-revoked", "rt-fresh"]);
	assert_eq!(refresh_of(&manager.state()), Some("rt-next"));
	assert_eq!(manager.baseline(), common::baseline("rt-fresh"));
	assert!(manager.status().last_failure.is_none());
}

#[tokio::test]
async fn unconfigured_manager_never_calls_the_provider() {
	let provider = ScriptedProvider::new([]);
	let manager =
		TokenManager::builder(provider.clone(), BaselineConfig::default()).build().await;

	assert_eq!(manager.get_valid_token().await, Err(AuthError::Unavailable));
	assert_eq!(provider.calls(), 0);

	let health = manager.status();

	assert!(!health.configured);
	assert_eq!(health.last_failure.map(|note| note.kind), Some(FailureKind::Configuration));
}

#[tokio::test]
async fn tokens_inside_the_buffer_are_never_returned() {
	let short = |access, refresh| Step::Grant {
		access,
		refresh: Some(refresh),
		expires_in: Duration::minutes(2),
	};
	let provider =
		ScriptedProvider::new([short("at-short", "rt-new"), short("at-short-2", "rt-newer")]);
	let store = Arc::new(MemoryStore::default());
	let manager = TokenManager::builder(provider.clone(), common::baseline("rt-old"))
		.with_store(store.clone())
		.build()
		.await;

	manager.refresh().await.expect("A published short-lived grant is still a successful refresh.");

	let health = manager.status();

	assert!(health.last_failure.is_none());
	assert_eq!(health.refresh_successes, 1);
	assert_eq!(health.refresh_failures, 0);
	assert_eq!(refresh_of(&manager.state()), Some("rt-new"), "Rotation must be kept.");
	assert_eq!(
		store.snapshot().map(|record| record.refresh_token),
		Some(TokenSecret::new("rt-new"))
	);
	assert!(manager.is_expired());

	assert_eq!(manager.get_valid_token().await, Err(AuthError::Unavailable));
	assert_eq!(provider.calls(), 2);
	assert_eq!(refresh_of(&manager.state()), Some("rt-newer"));
	assert!(manager.status().last_failure.is_none());
}

#[tokio::test]
async fn status_reports_without_refreshing() {
	let provider = ScriptedProvider::new([Step::rotate("at-1", "rt-new")]);
	let store = Arc::new(MemoryStore::default());
	let manager = TokenManager::builder(provider.clone(), common::baseline("rt-old"))
		.with_store(store)
		.build()
		.await;
	let health = manager.status();

	assert!(health.configured);
	assert!(!health.token_valid);
	assert_eq!(health.persistence, Some(StoreKind::Memory));
	assert_eq!(
		health.refresh_token_fingerprint.as_deref(),
		Some(TokenSecret::new("rt-old").fingerprint().as_str())
	);
	assert_eq!(provider.calls(), 0);

	manager.refresh().await.expect("Refresh should succeed.");

	let health = manager.status();

	assert!(health.token_valid);
	assert!(health.last_refresh_at.is_some());
	assert_eq!(health.refresh_attempts, 1);
	assert_eq!(health.refresh_successes, 1);

	let json = serde_json::to_string(&health).expect("Health should serialize.");

	assert!(!json.contains("at-1") && !json.contains("rt-new"), "Health must not leak secrets.");
}

#[tokio::test]
async fn headers_carry_bearer_and_client_identity() {
	let provider = ScriptedProvider::new([Step::rotate("at-1", "rt-new")]);
	let profile = ClientProfile::new()
		.with_user_agent("docproxy/1.0")
		.and_then(|profile| profile.with_client_version("2025.06"))
		.expect("Profile fixture should be valid.");
	let manager = TokenManager::builder(provider, common::baseline("rt-old"))
		.with_client_profile(profile)
		.build()
		.await;
	let headers = manager.headers().await.expect("Headers should be produced.");

	assert_eq!(headers[AUTHORIZATION], "Bearer at-1");
	assert!(headers[AUTHORIZATION].is_sensitive());
	assert_eq!(headers[CONTENT_TYPE], "application/json");
	assert_eq!(headers[ACCEPT], "*/*");
	assert_eq!(headers[USER_AGENT], "docproxy/1.0");
	assert_eq!(headers["x-client-version"], "2025.06");
}
