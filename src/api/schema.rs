//! Canonical request/response schemas of the auth endpoints.
//!
//! Each endpoint has exactly one accepted response shape; anything else fails fast with
//! [`ValidationError::Schema`](crate::error::ValidationError::Schema).

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserProfile},
};

/// Login credentials; the password is redacted from `Debug` output.
#[derive(Clone, Serialize)]
pub struct Credentials {
	/// Account email.
	pub email: String,
	password: String,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// `POST /auth/login/` success body.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
	/// Access token.
	pub token: String,
	/// Refresh token.
	pub refresh_token: String,
	/// Signed-in user.
	pub user: UserProfile,
	/// Access token lifetime in seconds, when the backend reports it.
	#[serde(default)]
	pub expires_in: Option<i64>,
}

/// `POST /auth/refresh/` request body.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
	/// Refresh token being exchanged.
	pub refresh_token: &'a str,
}

/// `POST /auth/refresh/` success body.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
	/// New access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the backend rotates on refresh.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
	/// Access token lifetime in seconds, when the backend reports it.
	#[serde(default)]
	pub expires_in: Option<i64>,
}

/// Error body emitted by the backend on failures.
///
/// Parsing is lenient: an unrecognized body simply yields an empty value and classification falls
/// back to the HTTP status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
	/// Machine-readable error code (`error`).
	#[serde(default)]
	pub error: Option<String>,
	/// Machine-readable error code (`code`).
	#[serde(default)]
	pub code: Option<String>,
	/// Human-readable detail (`detail`).
	#[serde(default)]
	pub detail: Option<String>,
	/// Human-readable message (`message`).
	#[serde(default)]
	pub message: Option<String>,
}
impl ErrorBody {
	/// Parses the body, returning an empty value on any mismatch.
	pub fn parse(body: &[u8]) -> Self {
		serde_json::from_slice(body).unwrap_or_default()
	}

	/// First machine-readable code present.
	pub fn error_code(&self) -> Option<&str> {
		self.error.as_deref().or(self.code.as_deref())
	}

	/// First human-readable description present.
	pub fn description(&self) -> Option<&str> {
		self.detail.as_deref().or(self.message.as_deref())
	}
}

/// Converts a reported lifetime into an absolute expiry, ignoring non-positive values.
pub(crate) fn expiry_from_lifetime(
	expires_in: Option<i64>,
	now: OffsetDateTime,
) -> Option<OffsetDateTime> {
	expires_in.filter(|secs| *secs > 0).and_then(|secs| now.checked_add(Duration::seconds(secs)))
}
