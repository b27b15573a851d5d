//! Secure token secret wrapper that redacts sensitive material.

// self
use crate::_prelude::*;

/// Errors raised when a token cannot be used as a bearer credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum TokenSecretError {
	/// The token was empty.
	#[error("Token cannot be empty.")]
	Empty,
	/// The token contains whitespace, control, or non-ASCII characters.
	#[error("Token contains a character that cannot appear in an Authorization header.")]
	InvalidCharacter,
}

/// Redacted token secret wrapper keeping sensitive material out of logs.
///
/// Secrets are restricted to visible ASCII so they always form a valid `Authorization` header.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string after validation.
	pub fn new(value: impl Into<String>) -> Result<Self, TokenSecretError> {
		let value = value.into();

		validate(&value)?;

		Ok(Self(value))
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<TokenSecret> for String {
	fn from(value: TokenSecret) -> Self {
		value.0
	}
}
impl TryFrom<String> for TokenSecret {
	type Error = TokenSecretError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

fn validate(value: &str) -> Result<(), TokenSecretError> {
	if value.is_empty() {
		return Err(TokenSecretError::Empty);
	}
	if !value.bytes().all(|b| b.is_ascii_graphic()) {
		return Err(TokenSecretError::InvalidCharacter);
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret").expect("Secret fixture should be valid.");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.expose(), "super-secret");
	}

	#[test]
	fn header_unsafe_tokens_are_rejected() {
		assert_eq!(TokenSecret::new(""), Err(TokenSecretError::Empty));
		assert_eq!(TokenSecret::new("with space"), Err(TokenSecretError::InvalidCharacter));
		assert_eq!(TokenSecret::new("line\nbreak"), Err(TokenSecretError::InvalidCharacter));
		assert_eq!(TokenSecret::new("caf\u{e9}"), Err(TokenSecretError::InvalidCharacter));
		assert!(serde_json::from_str::<TokenSecret>("\"bad token\"").is_err());

		let jwt_like: TokenSecret = serde_json::from_str("\"eyJhbGciOi.eyJleHAiOjE.sig-_\"")
			.expect("JWT-shaped token should deserialize.");

		assert_eq!(jwt_like.expose(), "eyJhbGciOi.eyJleHAiOjE.sig-_");
	}
}
