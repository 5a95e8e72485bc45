//! The in-memory credential record and its validity window.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TokenSecret},
	config::BaselineConfig,
	error::Error,
	provider::RefreshGrant,
	store::PersistedState,
};

/// Safety margin subtracted from the expiry so a token never lapses mid-flight.
pub const EXPIRY_BUFFER: Duration = Duration::minutes(5);

/// An access token paired with the instant it stops being valid.
///
/// Keeping both in one value means an access token can never exist without an expiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessGrant {
	/// Bearer credential for the upstream document API.
	pub token: TokenSecret,
	/// Instant at which the provider stops honoring `token`.
	pub expires_at: OffsetDateTime,
}
impl AccessGrant {
	/// Instant from which the grant is treated as expired.
	pub fn refresh_deadline(&self) -> Option<OffsetDateTime> {
		self.expires_at.checked_sub(EXPIRY_BUFFER)
	}
}

/// Current credentials for the single upstream service account.
///
/// Values are replaced wholesale: [`TokenState::apply_grant`] and
/// [`TokenState::restore`] return a new state and never touch `self`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenState {
	access: Option<AccessGrant>,
	refresh_token: Option<TokenSecret>,
	client_id: Option<ClientId>,
}
impl TokenState {
	/// Creates a state with no access token.
	pub fn new(refresh_token: Option<TokenSecret>, client_id: Option<ClientId>) -> Self {
		Self { access: None, refresh_token, client_id }
	}

	/// Seeds a fresh state from baseline configuration.
	pub fn seeded(baseline: &BaselineConfig) -> Self {
		Self::new(baseline.refresh_token.clone(), baseline.client_id.clone())
	}

	/// Attaches an access token and its expiry.
	pub fn with_access(mut self, token: TokenSecret, expires_at: OffsetDateTime) -> Self {
		self.access = Some(AccessGrant { token, expires_at });

		self
	}

	/// Current access grant, if one was fetched or restored.
	pub fn access(&self) -> Option<&AccessGrant> {
		self.access.as_ref()
	}

	/// Current access token, if any.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access.as_ref().map(|grant| &grant.token)
	}

	/// Expiry of the current access token, if any.
	pub fn token_expiry(&self) -> Option<OffsetDateTime> {
		self.access.as_ref().map(|grant| grant.expires_at)
	}

	/// Refresh token used for the next exchange.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Client identifier presented to the provider.
	pub fn client_id(&self) -> Option<&ClientId> {
		self.client_id.as_ref()
	}

	/// Returns `true` when both a refresh token and a client identifier are present.
	pub fn is_configured(&self) -> bool {
		self.refresh_token.is_some() && self.client_id.is_some()
	}

	/// Returns `true` if there is no access token or `now` is within [`EXPIRY_BUFFER`] of expiry.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		match &self.access {
			Some(grant) => grant.refresh_deadline().is_none_or(|deadline| now >= deadline),
			None => true,
		}
	}

	/// Returns the access token only while it is outside the expiry buffer.
	pub fn valid_access_token_at(&self, now: OffsetDateTime) -> Option<&TokenSecret> {
		if self.is_expired_at(now) { None } else { self.access_token() }
	}

	/// Builds the state that results from a successful refresh exchange.
	///
	/// Returns the new state and whether the refresh token rotated. The refresh token is
	/// only replaced when the provider returned a value different from the current one.
	pub fn apply_grant(
		&self,
		grant: &RefreshGrant,
		issued_at: OffsetDateTime,
	) -> Result<(Self, bool)> {
		let expires_at = issued_at.checked_add(grant.expires_in).ok_or_else(|| {
			Error::MalformedResponse { reason: "expires_in exceeds the supported range".into() }
		})?;
		let rotated = match (&grant.refresh_token, &self.refresh_token) {
			(Some(new), Some(current)) => new != current,
			(Some(_), None) => true,
			(None, _) => false,
		};
		let refresh_token =
			if rotated { grant.refresh_token.clone() } else { self.refresh_token.clone() };
		let next = Self {
			access: Some(AccessGrant { token: grant.access_token.clone(), expires_at }),
			refresh_token,
			client_id: self.client_id.clone(),
		};

		Ok((next, rotated))
	}

	/// Overlays persisted state on top of a baseline-seeded state.
	///
	/// A persisted refresh token always wins because it reflects the latest rotation. The
	/// persisted access token is only adopted while it is still outside the expiry buffer.
	pub fn restore(&self, persisted: &PersistedState, now: OffsetDateTime) -> Self {
		let mut next = self.clone();

		if !persisted.refresh_token.is_empty() {
			next.refresh_token = Some(persisted.refresh_token.clone());
			next.access = None;
		}
		if let (Some(token), Some(expires_at)) = (&persisted.access_token, persisted.token_expiry)
		{
			let candidate = AccessGrant { token: token.clone(), expires_at };
			let still_valid = candidate.refresh_deadline().is_some_and(|deadline| now < deadline);

			if !token.is_empty() && still_valid {
				next.access = Some(candidate);
			}
		}

		next
	}
}
