//! Credential attachment for outbound requests.

// crates.io
use http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{_prelude::*, auth::Session, error::ConfigError, http::ApiRequest};

/// Describes how to decorate an outbound request with the current session.
///
/// Implementations must be pure: no I/O and no failure mode. An absent session leaves the request
/// untouched; callers decide beforehand whether an unauthenticated send is acceptable.
pub trait CredentialAttacher
where
	Self: Send + Sync,
{
	/// Returns `request` carrying the credentials of `session`.
	fn attach(&self, request: ApiRequest, session: Option<&Session>) -> ApiRequest;
}

/// Attaches `Authorization: <scheme> <access_token>`; the scheme defaults to `Bearer`.
#[derive(Clone, Debug)]
pub struct BearerAttacher {
	scheme: String,
}
impl BearerAttacher {
	/// Uses a custom authorization scheme (for example `JWT`).
	///
	/// The scheme must be non-empty visible ASCII, so every attached header is valid.
	pub fn with_scheme(scheme: impl Into<String>) -> Result<Self, ConfigError> {
		let scheme = scheme.into();

		if scheme.is_empty() || !scheme.bytes().all(|b| b.is_ascii_graphic()) {
			return Err(ConfigError::InvalidAuthScheme { scheme });
		}

		Ok(Self { scheme })
	}
}
impl Default for BearerAttacher {
	fn default() -> Self {
		Self { scheme: "Bearer".into() }
	}
}
impl CredentialAttacher for BearerAttacher {
	fn attach(&self, mut request: ApiRequest, session: Option<&Session>) -> ApiRequest {
		let Some(session) = session else {
			return request;
		};

		// Scheme and token are both visible ASCII, so the value is always a valid header.
		if let Ok(mut value) =
			HeaderValue::try_from(format!("{} {}", self.scheme, session.access_token.expose()))
		{
			value.set_sensitive(true);
			request.headers.insert(AUTHORIZATION, value);
		}

		request
	}
}

/// Attaches the session's access token as a bearer credential.
pub fn attach_credentials(request: ApiRequest, session: Option<&Session>) -> ApiRequest {
	BearerAttacher::default().attach(request, session)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{UserId, UserProfile};

	fn session(access: &str) -> Session {
		Session::builder(UserProfile::new(UserId::from(5)))
			.access_token(access)
			.refresh_token("R1")
			.build()
			.expect("Session fixture should build.")
	}

	fn request() -> ApiRequest {
		ApiRequest::get(
			Url::parse("https://api.example.com/vendor/products/").expect("URL should parse."),
		)
	}

	#[test]
	fn bearer_header_is_attached_and_marked_sensitive() {
		let attached = attach_credentials(request(), Some(&session("A1")));
		let value = attached.headers.get(AUTHORIZATION).expect("Authorization should be set.");

		assert_eq!(value.to_str().expect("Header should be ASCII."), "Bearer A1");
		assert!(value.is_sensitive());
		assert!(!format!("{attached:?}").contains("A1"));
	}

	#[test]
	fn absent_session_leaves_request_untouched() {
		let attached = attach_credentials(request(), None);

		assert!(attached.headers.get(AUTHORIZATION).is_none());
	}

	#[test]
	fn reattaching_replaces_the_previous_token() {
		let first = attach_credentials(request(), Some(&session("A1")));
		let second = attach_credentials(first, Some(&session("A2")));

		assert_eq!(second.headers.get_all(AUTHORIZATION).iter().count(), 1);
		assert_eq!(
			second.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
			Some("Bearer A2"),
		);
	}

	#[test]
	fn custom_scheme_is_respected() {
		let attached = BearerAttacher::with_scheme("JWT")
			.expect("JWT should be a valid scheme.")
			.attach(request(), Some(&session("A1")));

		assert_eq!(
			attached.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
			Some("JWT A1"),
		);
	}

	#[test]
	fn invalid_schemes_are_rejected_up_front() {
		for scheme in ["", "JWT\n", "Bearer token", "Töken"] {
			let err = BearerAttacher::with_scheme(scheme)
				.expect_err("Schemes that cannot form a header value should be rejected.");

			assert!(matches!(
				err,
				ConfigError::InvalidAuthScheme { scheme: rejected } if rejected == scheme
			));
		}
	}
}
