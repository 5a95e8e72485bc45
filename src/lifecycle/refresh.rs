//! Single-flight refresh and post-refresh persistence.

// std
use std::sync::atomic::Ordering;
// self
use crate::{
	_prelude::*,
	auth::{EXPIRY_BUFFER, TokenSecret, TokenState},
	error::{AuthError, ConfigError, FailureKind},
	lifecycle::{TokenManager, status::FailureNote},
	obs::{self, LifecycleOp, LifecycleOutcome, LifecycleSpan},
	store::{Durability, PersistedState},
};

impl TokenManager {
	/// Forces a refresh exchange, or joins one already in flight.
	///
	/// On failure the credential state is left exactly as it was.
	pub async fn refresh(&self) -> Result<(), AuthError> {
		let observed = self.generation.load(Ordering::Acquire);

		self.refresh_flight(observed, "refresh").await
	}

	/// Runs one refresh under the single-flight lock unless another caller already completed one
	/// since `observed` was read, in which case that flight's outcome is adopted.
	///
	/// Success means new credentials were published; whether the access token clears the expiry
	/// buffer is checked by whoever hands it out.
	pub(super) async fn refresh_flight(
		&self,
		observed: u64,
		trigger: &'static str,
	) -> Result<(), AuthError> {
		let _singleflight = self.refresh_guard.lock().await;

		if self.generation.load(Ordering::Acquire) != observed {
			self.metrics.record_coalesced();
			obs::record_lifecycle_outcome(LifecycleOp::Refresh, LifecycleOutcome::Coalesced);

			// `last_failure` is written by every flight, so it mirrors the one just adopted.
			return if self.notes.lock().last_failure.is_some() {
				Err(AuthError::Unavailable)
			} else {
				Ok(())
			};
		}

		let outcome = self.run_refresh(trigger).await;

		self.generation.fetch_add(1, Ordering::Release);

		outcome.map_err(AuthError::from)
	}

	/// Performs one exchange and records its outcome. Callers must hold `refresh_guard`.
	pub(super) async fn run_refresh(&self, trigger: &'static str) -> Result<()> {
		const OP: LifecycleOp = LifecycleOp::Refresh;

		let span = LifecycleSpan::new(OP, trigger);

		obs::record_lifecycle_outcome(OP, LifecycleOutcome::Attempt);

		let result = span.instrument(self.exchange_and_publish()).await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				self.notes.lock().record_success(OffsetDateTime::now_utc());
				obs::record_lifecycle_outcome(OP, LifecycleOutcome::Success);
			},
			Err(e) => {
				let kind = e.kind();

				match kind {
					FailureKind::Rejection | FailureKind::Configuration => tracing::error!(
						kind = %kind,
						error = %e,
						"Token refresh failed; an operator reset with a fresh refresh token is required."
					),
					FailureKind::Transient | FailureKind::Persistence => tracing::warn!(
						kind = %kind,
						error = %e,
						"Token refresh failed; the next call will retry."
					),
				}

				self.metrics.record_failure();
				self.notes.lock().last_failure =
					Some(FailureNote::new(e, OffsetDateTime::now_utc()));
				obs::record_lifecycle_outcome(OP, LifecycleOutcome::Failure);
			},
		}

		result
	}

	async fn exchange_and_publish(&self) -> Result<()> {
		let current = self.state.read().clone();
		let refresh_token =
			current.refresh_token().cloned().ok_or(ConfigError::MissingRefreshToken)?;
		let client_id = current.client_id().cloned().ok_or(ConfigError::MissingClientId)?;

		self.metrics.record_attempt();

		let grant = self.provider.exchange_refresh(&refresh_token, &client_id).await?;
		let now = OffsetDateTime::now_utc();
		let (next, rotated) = current.apply_grant(&grant, now)?;

		*self.state.write() = next.clone();

		if rotated {
			let rotated_to = next.refresh_token().map(TokenSecret::fingerprint).unwrap_or_default();

			tracing::info!(
				old_refresh_token = %refresh_token.fingerprint(),
				new_refresh_token = %rotated_to,
				expires_in = grant.expires_in.whole_seconds(),
				"Refresh token rotated."
			);
		} else {
			tracing::info!(
				refresh_token = %refresh_token.fingerprint(),
				expires_in = grant.expires_in.whole_seconds(),
				"Access token refreshed; refresh token unchanged."
			);
		}

		self.persist(&next, rotated, now).await;

		if next.valid_access_token_at(now).is_none() {
			tracing::warn!(
				expires_in = grant.expires_in.whole_seconds(),
				buffer = EXPIRY_BUFFER.whole_seconds(),
				"Issued access token expires inside the buffer and will not be served."
			);
		}

		Ok(())
	}

	/// Hands the new state to the store. Failures are logged and recorded, never returned.
	pub(super) async fn persist(&self, state: &TokenState, rotated: bool, now: OffsetDateTime) {
		const OP: LifecycleOp = LifecycleOp::Persist;

		let fingerprint = state.refresh_token().map(TokenSecret::fingerprint).unwrap_or_default();
		let Some(store) = &self.store else {
			if rotated {
				tracing::warn!(
					refresh_token = %fingerprint,
					"Refresh token rotated without persistence; the rotation will not survive a restart."
				);
			}

			return;
		};

		if store.durability() == Durability::RefreshTokenOnly && !rotated {
			tracing::debug!(store = %store.kind(), "Refresh token unchanged; persistence skipped.");

			return;
		}

		let Some(record) = PersistedState::capture(state, now) else {
			return;
		};
		let span = LifecycleSpan::new(OP, store.kind().as_str());

		obs::record_lifecycle_outcome(OP, LifecycleOutcome::Attempt);

		match span.instrument(store.save(&record)).await {
			Ok(()) => {
				tracing::debug!(
					store = %store.kind(),
					refresh_token = %fingerprint,
					"Persisted token state."
				);

				self.notes.lock().last_persist_error = None;
				obs::record_lifecycle_outcome(OP, LifecycleOutcome::Success);
			},
			Err(e) => {
				tracing::error!(
					store = %store.kind(),
					refresh_token = %fingerprint,
					error = %e,
					"Failed to persist token state; the in-memory credential remains usable."
				);

				self.metrics.record_persist_failure();
				self.notes.lock().last_persist_error = Some(e.to_string());
				obs::record_lifecycle_outcome(OP, LifecycleOutcome::Failure);
			},
		}
	}
}
