//! Administrative recovery back to baseline credentials.

// std
use std::sync::atomic::Ordering;
// self
use crate::{
	_prelude::*,
	auth::TokenState,
	config::BaselineConfig,
	error::AuthError,
	lifecycle::TokenManager,
	obs::{self, LifecycleOp, LifecycleOutcome, LifecycleSpan},
};

impl TokenManager {
	/// Discards persisted and in-memory credentials, reseeds from baseline, and refreshes once.
	///
	/// Persistence errors while clearing are logged but do not stop the reset.
	pub async fn reset(&self) -> Result<(), AuthError> {
		self.reset_inner(None, "reset").await
	}

	/// Replaces the retained baseline, then behaves like [`TokenManager::reset`].
	///
	/// Operators use this to install a freshly issued refresh token without a redeploy.
	pub async fn reset_with(&self, baseline: BaselineConfig) -> Result<(), AuthError> {
		self.reset_inner(Some(baseline), "reset_with").await
	}

	async fn reset_inner(
		&self,
		baseline: Option<BaselineConfig>,
		trigger: &'static str,
	) -> Result<(), AuthError> {
		const OP: LifecycleOp = LifecycleOp::Reset;

		let span = LifecycleSpan::new(OP, trigger);

		obs::record_lifecycle_outcome(OP, LifecycleOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.refresh_guard.lock().await;

				if let Some(baseline) = baseline {
					*self.baseline.write() = baseline;
				}

				let cleared = match &self.store {
					Some(store) => store.clear().await.map_err(|e| (store.kind(), e)),
					None => Ok(()),
				};

				if let Err((kind, e)) = cleared {
					tracing::warn!(
						store = %kind,
						error = %e,
						"Failed to clear persisted token state during reset."
					);

					self.notes.lock().last_persist_error = Some(e.to_string());
				}

				let seeded = TokenState::seeded(&self.baseline.read());

				*self.state.write() = seeded;

				tracing::info!("Token state reset to baseline; attempting a refresh.");

				let outcome = self.run_refresh(trigger).await;

				self.generation.fetch_add(1, Ordering::Release);

				outcome
			})
			.await;

		match &result {
			Ok(()) => obs::record_lifecycle_outcome(OP, LifecycleOutcome::Success),
			Err(_) => obs::record_lifecycle_outcome(OP, LifecycleOutcome::Failure),
		}

		result.map_err(AuthError::from)
	}
}
