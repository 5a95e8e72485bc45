//! Read-only health snapshot for operators.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::FailureKind,
	lifecycle::TokenManager,
	store::StoreKind,
};

/// Most recent refresh failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailureNote {
	/// Failure category.
	pub kind: FailureKind,
	/// Redacted error message.
	pub message: String,
	/// When the failure happened.
	#[serde(with = "time::serde::rfc3339")]
	pub at: OffsetDateTime,
}
impl FailureNote {
	pub(crate) fn new(error: &Error, at: OffsetDateTime) -> Self {
		Self { kind: error.kind(), message: error.to_string(), at }
	}
}

#[derive(Debug, Default)]
pub(crate) struct HealthNotes {
	pub(crate) last_refresh_at: Option<OffsetDateTime>,
	pub(crate) last_failure: Option<FailureNote>,
	pub(crate) last_persist_error: Option<String>,
}
impl HealthNotes {
	pub(crate) fn record_success(&mut self, at: OffsetDateTime) {
		self.last_refresh_at = Some(at);
		self.last_failure = None;
	}
}

/// Point-in-time view of the credential lifecycle. Contains no secrets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenHealth {
	/// Both a refresh token and a client id are present.
	pub configured: bool,
	/// The access token is present and outside the expiry buffer.
	pub token_valid: bool,
	/// Expiry of the current access token.
	#[serde(with = "time::serde::rfc3339::option")]
	pub token_expiry: Option<OffsetDateTime>,
	/// Fingerprint of the current refresh token.
	pub refresh_token_fingerprint: Option<String>,
	/// Active persistence backend.
	pub persistence: Option<StoreKind>,
	/// Completion time of the last successful refresh.
	#[serde(with = "time::serde::rfc3339::option")]
	pub last_refresh_at: Option<OffsetDateTime>,
	/// Last refresh failure, cleared by the next success.
	pub last_failure: Option<FailureNote>,
	/// Last persistence failure, cleared by the next successful write.
	pub last_persist_error: Option<String>,
	/// Exchanges sent to the provider.
	pub refresh_attempts: u64,
	/// Refreshes that produced a usable token.
	pub refresh_successes: u64,
	/// Refreshes that failed.
	pub refresh_failures: u64,
	/// Failed durable writes.
	pub persist_failures: u64,
}

impl TokenManager {
	/// Reports the current lifecycle health without contacting the provider.
	pub fn status(&self) -> TokenHealth {
		let now = OffsetDateTime::now_utc();
		let state = self.state();
		let notes = self.notes.lock();

		TokenHealth {
			configured: state.is_configured(),
			token_valid: !state.is_expired_at(now),
			token_expiry: state.token_expiry(),
			refresh_token_fingerprint: state.refresh_token().map(TokenSecret::fingerprint),
			persistence: self.persistence_kind(),
			last_refresh_at: notes.last_refresh_at,
			last_failure: notes.last_failure.clone(),
			last_persist_error: notes.last_persist_error.clone(),
			refresh_attempts: self.metrics.attempts(),
			refresh_successes: self.metrics.successes(),
			refresh_failures: self.metrics.failures(),
			persist_failures: self.metrics.persist_failures(),
		}
	}
}
