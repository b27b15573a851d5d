//! Refresh failure classification hooks.
//!
//! A failed refresh is either irrecoverable (the refresh token is invalid or expired, so the
//! session must end) or transient (worth retrying later with the same session). Backends differ in
//! how they signal the former, so the decision is delegated to a [`RefreshClassifier`].

/// Strategy hook that maps refresh endpoint failures onto [`RefreshFailureKind`].
pub trait RefreshClassifier: Send + Sync {
	/// Classifies a failed refresh call.
	fn classify_refresh_error(&self, ctx: &RefreshErrorContext) -> RefreshFailureKind;
}

/// Outcome categories for a failed refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshFailureKind {
	/// The server rejected the refresh token; the user must log in again.
	Irrecoverable,
	/// Temporary failure; the session is kept and a later attempt may succeed.
	Transient,
}

/// Context passed to classifiers.
///
/// The struct keeps only primitive data so classifiers stay decoupled from any HTTP client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshErrorContext {
	/// HTTP status code returned by the refresh endpoint, when available.
	pub http_status: Option<u16>,
	/// Machine-readable error code from the body.
	pub error_code: Option<String>,
	/// Human-readable description from the body.
	pub description: Option<String>,
	/// Preview of the raw response body.
	pub body_preview: Option<String>,
	/// The call produced no response.
	pub network_error: bool,
	/// The call exceeded its timeout.
	pub timed_out: bool,
}
impl RefreshErrorContext {
	/// Context for a call that produced no response.
	pub fn network_failure(timed_out: bool) -> Self {
		Self { network_error: true, timed_out, ..Default::default() }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the body's error code.
	pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
		self.error_code = Some(code.into());

		self
	}

	/// Adds the body's description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());

		self
	}

	/// Adds a raw body preview.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(body.into());

		self
	}
}

/// Default classifier.
///
/// The HTTP status decides first. Network failures, timeouts, 408, 429, and 5xx are transient no
/// matter what the body says; 400 and 401 mean the refresh token was refused. Any other outcome
/// (403, unexpected 4xx, no status) falls back to known error codes, then hints in the description
/// or body, and finally treats 403 as a refusal and everything else as transient.
#[derive(Debug, Default)]
pub struct DefaultRefreshClassifier;
impl RefreshClassifier for DefaultRefreshClassifier {
	fn classify_refresh_error(&self, ctx: &RefreshErrorContext) -> RefreshFailureKind {
		if ctx.network_error || ctx.timed_out {
			return RefreshFailureKind::Transient;
		}

		match ctx.http_status {
			Some(408 | 429 | 500..=599) => return RefreshFailureKind::Transient,
			Some(400 | 401) => return RefreshFailureKind::Irrecoverable,
			_ => {},
		}

		if let Some(kind) = ctx.error_code.as_deref().and_then(match_code) {
			return kind;
		}
		if let Some(kind) = classify_text(ctx.description.as_deref())
			.or_else(|| classify_text(ctx.body_preview.as_deref()))
		{
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

const IRRECOVERABLE_CODES: &[&str] = &[
	"invalid_refresh_token",
	"refresh_token_expired",
	"token_not_valid",
	"invalid_grant",
	"token_expired",
	"token_revoked",
];
const TRANSIENT_CODES: &[&str] = &["temporarily_unavailable", "server_error", "rate_limited"];

fn match_code(code: &str) -> Option<RefreshFailureKind> {
	if IRRECOVERABLE_CODES.iter().any(|known| code.eq_ignore_ascii_case(known)) {
		Some(RefreshFailureKind::Irrecoverable)
	} else if TRANSIENT_CODES.iter().any(|known| code.eq_ignore_ascii_case(known)) {
		Some(RefreshFailureKind::Transient)
	} else {
		None
	}
}

fn classify_text(text: Option<&str>) -> Option<RefreshFailureKind> {
	let lowered = text?.to_ascii_lowercase();

	if IRRECOVERABLE_CODES.iter().any(|code| lowered.contains(code)) {
		Some(RefreshFailureKind::Irrecoverable)
	} else if TRANSIENT_CODES.iter().any(|code| lowered.contains(code)) {
		Some(RefreshFailureKind::Transient)
	} else {
		None
	}
}

fn classify_status(status: Option<u16>) -> RefreshFailureKind {
	match status {
		Some(403) => RefreshFailureKind::Irrecoverable,
		_ => RefreshFailureKind::Transient,
	}
}
