//! Auth endpoint client: login and refresh calls with canonical schemas and failure mapping.

/// Refresh failure classification.
pub mod classify;
/// Request/response schemas of the auth endpoints.
pub mod schema;

pub use classify::*;
pub use schema::*;

// self
use crate::{
	_prelude::*,
	auth::{Session, SessionBuilderError},
	config::SessionConfig,
	error::{ConfigError, ValidationError},
	http::{ApiRequest, ApiResponse, HttpTransport},
};

/// Failed refresh call, already classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshFailure {
	/// Classification produced by the configured [`RefreshClassifier`].
	pub kind: RefreshFailureKind,
	/// Human-readable cause.
	pub reason: String,
	/// Server retry hint, when supplied.
	pub retry_after: Option<Duration>,
}
impl RefreshFailure {
	/// Returns `true` if the session must end.
	pub fn is_irrecoverable(&self) -> bool {
		matches!(self.kind, RefreshFailureKind::Irrecoverable)
	}
}

/// Client for the login and refresh endpoints.
///
/// The type is generic over the transport so tests can script responses; it is cheap to clone.
pub struct AuthApi<C>
where
	C: ?Sized + HttpTransport,
{
	transport: Arc<C>,
	config: Arc<SessionConfig>,
	classifier: Arc<dyn RefreshClassifier>,
}
impl<C> AuthApi<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client using [`DefaultRefreshClassifier`].
	pub fn new(transport: Arc<C>, config: Arc<SessionConfig>) -> Self {
		Self { transport, config, classifier: Arc::new(DefaultRefreshClassifier) }
	}

	/// Replaces the refresh failure classifier.
	pub fn with_classifier(mut self, classifier: Arc<dyn RefreshClassifier>) -> Self {
		self.classifier = classifier;

		self
	}

	/// Exchanges credentials for a new [`Session`].
	///
	/// 400 and 401 map to [`Error::InvalidCredentials`], other 4xx to
	/// [`ValidationError::Rejected`], 5xx to [`Error::Upstream`], and a body that does not match
	/// [`LoginResponse`] to [`ValidationError::Schema`].
	pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
		let endpoint = &self.config.endpoints.login;
		let mut request = ApiRequest::post(endpoint.clone()).unauthenticated().json(credentials)?;

		if let Some(timeout) = self.config.request_timeout_std() {
			request = request.timeout(timeout);
		}

		let response = self.transport.send(request).await?;

		if !response.is_success() {
			return Err(login_failure(&response));
		}

		let body = response.json::<LoginResponse>(endpoint.path())?;
		let mut builder = Session::builder(body.user)
			.access_token(body.token)
			.refresh_token(body.refresh_token);

		if let Some(expires_at) = expiry_from_lifetime(body.expires_in, OffsetDateTime::now_utc()) {
			builder = builder.expires_at(expires_at);
		}

		builder.build().map_err(|e| match e {
			SessionBuilderError::InvalidToken(token) => ValidationError::Token(token).into(),
			other => ConfigError::from(other).into(),
		})
	}

	/// Exchanges the session's refresh token for a rotated [`Session`].
	///
	/// Every failure is classified; a success body that does not match [`RefreshResponse`] is
	/// reported as transient so the session survives a misbehaving backend.
	pub async fn refresh(&self, session: &Session) -> Result<Session, RefreshFailure> {
		let endpoint = &self.config.endpoints.refresh;
		let request = ApiRequest::post(endpoint.clone())
			.unauthenticated()
			.timeout(self.config.refresh_timeout_std())
			.json(&RefreshRequest { refresh_token: session.refresh_token.expose() })
			.map_err(|e| RefreshFailure {
				kind: RefreshFailureKind::Transient,
				reason: e.to_string(),
				retry_after: None,
			})?;
		let response = match self.transport.send(request).await {
			Ok(response) => response,
			Err(e) => {
				let ctx = RefreshErrorContext::network_failure(e.is_timeout());

				return Err(self.classified(&ctx, e.to_string(), None));
			},
		};

		if !response.is_success() {
			return Err(self.refresh_failure(&response));
		}

		let body = response.json::<RefreshResponse>(endpoint.path()).map_err(|e| RefreshFailure {
			kind: RefreshFailureKind::Transient,
			reason: e.to_string(),
			retry_after: None,
		})?;
		let expires_at = expiry_from_lifetime(body.expires_in, OffsetDateTime::now_utc());

		Ok(session.rotate(body.access_token, body.refresh_token, expires_at))
	}

	fn refresh_failure(&self, response: &ApiResponse) -> RefreshFailure {
		let body = ErrorBody::parse(&response.body);
		let preview = response.body_preview();
		let mut ctx = RefreshErrorContext::default()
			.with_http_status(response.status.as_u16())
			.with_body_preview(preview.clone());

		if let Some(code) = body.error_code() {
			ctx = ctx.with_error_code(code);
		}
		if let Some(description) = body.description() {
			ctx = ctx.with_description(description);
		}

		let reason = body
			.error_code()
			.or(body.description())
			.map(ToOwned::to_owned)
			.unwrap_or_else(|| format!("HTTP {}", response.status.as_u16()));

		self.classified(&ctx, reason, response.retry_after())
	}

	fn classified(
		&self,
		ctx: &RefreshErrorContext,
		reason: String,
		retry_after: Option<Duration>,
	) -> RefreshFailure {
		RefreshFailure { kind: self.classifier.classify_refresh_error(ctx), reason, retry_after }
	}
}
impl<C> Clone for AuthApi<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			classifier: self.classifier.clone(),
		}
	}
}

fn login_failure(response: &ApiResponse) -> Error {
	let status = response.status.as_u16();
	let body = ErrorBody::parse(&response.body);
	let message = body
		.description()
		.or(body.error_code())
		.map(ToOwned::to_owned)
		.unwrap_or_else(|| response.body_preview());

	match status {
		400 | 401 => Error::InvalidCredentials { reason: message },
		500..=599 => Error::Upstream { status, retry_after: response.retry_after() },
		_ => ValidationError::Rejected { status, message }.into(),
	}
}
