//! Shared HTTP plumbing for the provider client and the platform configuration store.
//!
//! Every outbound call goes through [`ReqwestHttpClient`], which always carries a bounded
//! request timeout so a hung identity provider fails the refresh instead of parking callers
//! forever behind the single-flight lock.

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use reqwest::{
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Default end-to-end request timeout.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);
/// Upper bound for establishing a connection.
pub const CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(10);

const BODY_PREVIEW_LIMIT: usize = 256;

/// Metadata captured from a failed response for diagnosis.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Captures the status and Retry-After hint of a response.
	pub fn capture(status: reqwest::StatusCode, headers: &HeaderMap) -> Self {
		Self { status: Some(status.as_u16()), retry_after: parse_retry_after(headers) }
	}
}

/// Thin wrapper around [`ReqwestClient`] so timeout and redirect behavior live in one place.
///
/// Token endpoints must answer directly, so redirects are never followed.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Builds a client with [`DEFAULT_TIMEOUT`].
	pub fn new() -> Result<Self, ConfigError> {
		Self::with_timeout(DEFAULT_TIMEOUT)
	}

	/// Builds a client whose requests fail after `timeout`.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.connect_timeout(timeout.min(CONNECT_TIMEOUT))
			.redirect(Policy::none())
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; the caller owns its timeout policy.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Lossy UTF-8 preview of a response body, capped for log lines.
pub fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);

	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return text.into_owned();
	}

	let mut buf: String = text.chars().take(BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return (secs >= 0).then_some(Duration::seconds(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		let mut headers = HeaderMap::new();

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(120)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));

		assert_eq!(parse_retry_after(&headers), None, "Past dates carry no hint.");
	}

	#[test]
	fn retry_after_ignores_negative_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("-5"));

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("0"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::ZERO));
	}

	#[test]
	fn body_preview_truncates_long_payloads() {
		let short = body_preview(br#"{"error":"invalid_grant"}"#);
		let long = body_preview("x".repeat(1_000).as_bytes());

		assert_eq!(short, r#"{"error":"invalid_grant"}"#);
		assert_eq!(long.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(long.ends_with('…'));
	}

	#[test]
	fn clients_build_with_bounded_timeouts() {
		ReqwestHttpClient::new().expect("Default client should build.");
		ReqwestHttpClient::with_timeout(StdDuration::from_millis(250))
			.expect("Short-timeout client should build.");
	}
}
