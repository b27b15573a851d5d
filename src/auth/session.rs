//! Session records pairing the access and refresh secrets with the signed-in user.

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenSecretError, UserId, claims},
};

/// Errors produced by [`SessionBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum SessionBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// One of the supplied tokens is not a valid bearer credential.
	#[error(transparent)]
	InvalidToken(#[from] TokenSecretError),
}

/// Profile of the signed-in dashboard user as returned by the login endpoint.
///
/// Fields the dashboards do not interpret are preserved in `extra` so persisting and reloading a
/// session never loses data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
	/// User identifier.
	pub id: UserId,
	/// Login email address.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Portal role (vendor, customer, admin).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	/// Remaining user attributes.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}
impl UserProfile {
	/// Creates a profile carrying only the identifier.
	pub fn new(id: UserId) -> Self {
		Self { id, email: None, name: None, role: None, extra: Default::default() }
	}
}

/// Authenticated session: the access/refresh pair plus the user it belongs to.
///
/// The serialized form doubles as the persisted layout (`access_token`, `refresh_token`, `user`,
/// optional `expires_at` as a unix timestamp). Token pairs are only ever replaced as a whole via
/// [`Session::rotate`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
	/// Access token attached to authenticated requests.
	pub access_token: TokenSecret,
	/// Refresh token used solely to mint new access tokens.
	pub refresh_token: TokenSecret,
	/// Signed-in user.
	pub user: UserProfile,
	/// Access token expiry, when known.
	#[serde(default, with = "time::serde::timestamp::option", skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<OffsetDateTime>,
}
impl Session {
	/// Returns a builder for the provided user.
	pub fn builder(user: UserProfile) -> SessionBuilder {
		SessionBuilder::new(user)
	}

	/// Identifier of the signed-in user.
	pub fn user_id(&self) -> &UserId {
		&self.user.id
	}

	/// Returns `true` if the access token is known to be expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` if the access token expires within `window` of `now`.
	///
	/// Sessions without a known expiry never report as expiring. A window reaching past the
	/// representable range covers every known expiry.
	pub fn expires_within(&self, window: Duration, now: OffsetDateTime) -> bool {
		match now.checked_add(window) {
			Some(deadline) => self.is_expired_at(deadline),
			None => self.expires_at.is_some(),
		}
	}

	/// Produces the session that results from a successful refresh.
	///
	/// The refresh token is kept unless the server rotated it. The expiry comes from the refresh
	/// response when supplied, otherwise from the new access token's claims.
	pub fn rotate(
		&self,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
		expires_at: Option<OffsetDateTime>,
	) -> Self {
		let expires_at = expires_at.or_else(|| claims::access_token_expiry(access_token.expose()));

		Self {
			access_token,
			refresh_token: refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
			user: self.user.clone(),
			expires_at,
		}
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("user_id", &self.user.id)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`Session`].
#[derive(Clone, Debug)]
pub struct SessionBuilder {
	user: UserProfile,
	access_token: Option<String>,
	refresh_token: Option<String>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl SessionBuilder {
	fn new(user: UserProfile) -> Self {
		Self { user, access_token: None, refresh_token: None, expires_at: None, expires_in: None }
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(token.into());

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from now.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`Session`].
	///
	/// Expiry precedence: explicit instant, then relative duration, then the access token's `exp`
	/// claim.
	pub fn build(self) -> Result<Session, SessionBuilderError> {
		let access_token =
			TokenSecret::new(self.access_token.ok_or(SessionBuilderError::MissingAccessToken)?)?;
		let refresh_token =
			TokenSecret::new(self.refresh_token.ok_or(SessionBuilderError::MissingRefreshToken)?)?;
		let expires_at = self
			.expires_at
			.or_else(|| self.expires_in.map(|delta| OffsetDateTime::now_utc() + delta))
			.or_else(|| claims::access_token_expiry(access_token.expose()));

		Ok(Session { access_token, refresh_token, user: self.user, expires_at })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn user() -> UserProfile {
		serde_json::from_str(r#"{"id":12,"email":"ops@example.com","role":"vendor","shop":"north"}"#)
			.expect("User fixture should deserialize.")
	}

	#[test]
	fn builder_requires_both_tokens() {
		assert_eq!(
			Session::builder(user()).refresh_token("R1").build().map(|_| ()),
			Err(SessionBuilderError::MissingAccessToken),
		);
		assert_eq!(
			Session::builder(user()).access_token("A1").build().map(|_| ()),
			Err(SessionBuilderError::MissingRefreshToken),
		);
		assert_eq!(
			Session::builder(user()).access_token("A 1").refresh_token("R1").build().map(|_| ()),
			Err(SessionBuilderError::InvalidToken(TokenSecretError::InvalidCharacter)),
		);
	}

	#[test]
	fn rotate_keeps_refresh_token_unless_replaced() {
		let session = Session::builder(user())
			.access_token("A1")
			.refresh_token("R1")
			.build()
			.expect("Session fixture should build.");
		let a2 = TokenSecret::new("A2").expect("Access fixture should be valid.");
		let r2 = TokenSecret::new("R2").expect("Refresh fixture should be valid.");
		let kept = session.rotate(a2.clone(), None, None);

		assert_eq!(kept.access_token.expose(), "A2");
		assert_eq!(kept.refresh_token.expose(), "R1");
		assert_eq!(kept.user, session.user);

		let rotated = session.rotate(a2, Some(r2), None);

		assert_eq!(rotated.refresh_token.expose(), "R2");
	}

	#[test]
	fn expiry_helpers_ignore_unknown_expiry() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let opaque = Session::builder(user())
			.access_token("A1")
			.refresh_token("R1")
			.build()
			.expect("Session fixture should build.");

		assert!(!opaque.is_expired_at(now));
		assert!(!opaque.expires_within(Duration::days(365), now));

		let timed = Session::builder(user())
			.access_token("A1")
			.refresh_token("R1")
			.expires_at(now + Duration::seconds(30))
			.build()
			.expect("Session fixture should build.");

		assert!(!timed.is_expired_at(now));
		assert!(timed.expires_within(Duration::minutes(1), now));
		assert!(timed.is_expired_at(now + Duration::seconds(30)));
		assert!(timed.expires_within(Duration::MAX, now));
		assert!(!opaque.expires_within(Duration::MAX, now));
	}

	#[test]
	fn persisted_layout_uses_flat_keys_and_preserves_extra_fields() {
		let session = Session::builder(user())
			.access_token("A1")
			.refresh_token("R1")
			.expires_at(macros::datetime!(2025-01-01 01:00 UTC))
			.build()
			.expect("Session fixture should build.");
		let value = serde_json::to_value(&session).expect("Session should serialize.");

		assert_eq!(value["access_token"], "A1");
		assert_eq!(value["refresh_token"], "R1");
		assert_eq!(value["user"]["id"], "12");
		assert_eq!(value["user"]["shop"], "north");
		assert_eq!(value["expires_at"], 1735693200);

		let reloaded: Session = serde_json::from_value(value).expect("Session should reload.");

		assert_eq!(reloaded, session);
		assert!(!format!("{reloaded:?}").contains("A1"));
	}
}
