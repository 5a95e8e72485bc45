//! Header bundle handed to the proxy handlers for every upstream call.

// crates.io
use reqwest::header::{
	ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
// self
use crate::{
	_prelude::*, auth::TokenSecret, config::CLIENT_VERSION_HEADER, error::AuthError,
	lifecycle::TokenManager,
};

impl TokenManager {
	/// Returns the headers for an upstream request, refreshing the token first if needed.
	///
	/// The `Authorization` value is marked sensitive so HTTP stacks keep it out of debug output.
	pub async fn headers(&self) -> Result<HeaderMap, AuthError> {
		let token = self.get_valid_token().await?;
		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, bearer_value(&token)?);
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

		if let Some(user_agent) = self.profile.user_agent() {
			headers.insert(USER_AGENT, user_agent.clone());
		}
		if let Some(version) = self.profile.client_version() {
			headers.insert(HeaderName::from_static(CLIENT_VERSION_HEADER), version.clone());
		}

		Ok(headers)
	}
}

fn bearer_value(token: &TokenSecret) -> Result<HeaderValue, AuthError> {
	let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose())).map_err(|_| {
		tracing::error!(
			"Access token contains characters that cannot be sent in an HTTP header."
		);

		AuthError::Unavailable
	})?;

	value.set_sensitive(true);

	Ok(value)
}
