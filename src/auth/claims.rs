//! Unverified JWT claim inspection used to learn when an access token expires.
//!
//! Signatures are not checked; the server remains the authority on token validity. The expiry is
//! only used to refresh ahead of time instead of waiting for a 401.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

#[derive(Deserialize)]
struct ExpiryClaims {
	exp: Option<i64>,
}

/// Returns the `exp` claim of a JWT-shaped access token, or `None` for opaque tokens.
pub fn access_token_expiry(token: &str) -> Option<OffsetDateTime> {
	let mut segments = token.split('.');
	let (Some(_header), Some(payload), Some(_signature), None) =
		(segments.next(), segments.next(), segments.next(), segments.next())
	else {
		return None;
	};
	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
	let claims: ExpiryClaims = serde_json::from_slice(&bytes).ok()?;

	OffsetDateTime::from_unix_timestamp(claims.exp?).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn jwt(payload: &str) -> String {
		format!("eyJhbGciOiJIUzI1NiJ9.{}.c2lnbmF0dXJl", URL_SAFE_NO_PAD.encode(payload))
	}

	#[test]
	fn reads_exp_claim_from_jwt() {
		let token = jwt(r#"{"user_id":7,"exp":1735693200}"#);

		assert_eq!(access_token_expiry(&token), Some(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn opaque_or_malformed_tokens_have_no_expiry() {
		assert_eq!(access_token_expiry("A1"), None);
		assert_eq!(access_token_expiry("a.b"), None);
		assert_eq!(access_token_expiry("a.!!!.c"), None);
		assert_eq!(access_token_expiry(&jwt(r#"{"user_id":7}"#)), None);
		assert_eq!(access_token_expiry(&format!("{}.extra", jwt(r#"{"exp":1}"#))), None);
	}
}
