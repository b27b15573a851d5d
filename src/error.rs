//! Session-level error types shared across the store, refresh, and pipeline layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// The type is `Clone` because a single refresh outcome is handed to every caller that waited on
/// it.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response was received (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The server rejected the request or answered with an unexpected shape.
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// The request was still rejected with 401 after its single retry.
	#[error("Request was rejected as unauthorized after {attempts} attempts.")]
	Unauthorized {
		/// Number of network attempts made for the logical request.
		attempts: u8,
	},
	/// The refresh token was rejected or no session exists; the user must log in again.
	#[error("Session expired; please log in again.")]
	SessionExpired,
	/// The refresh call failed for a temporary reason; the session is kept for a later retry.
	#[error("Token refresh is temporarily unavailable: {reason}.")]
	RefreshUnavailable {
		/// Human-readable cause.
		reason: String,
		/// Earliest retry hint, when known.
		retry_after: Option<Duration>,
	},
	/// The login endpoint rejected the supplied credentials.
	#[error("Login was rejected: {reason}.")]
	InvalidCredentials {
		/// Server-supplied reason string.
		reason: String,
	},
	/// A resource endpoint answered with a server error.
	#[error("Upstream returned HTTP {status}.")]
	Upstream {
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl Error {
	/// Returns `true` when the error requires the user to authenticate again.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired)
	}

	/// Returns `true` when retrying later may succeed.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::RefreshUnavailable { .. } | Self::Upstream { .. })
	}

	/// Returns the server-provided retry hint, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RefreshUnavailable { retry_after, .. } | Self::Upstream { retry_after, .. } =>
				*retry_after,
			_ => None,
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// Session configuration failed validation.
	#[error(transparent)]
	Session(#[from] crate::config::SessionConfigError),
	/// A request path could not be resolved against the base URL.
	#[error("Path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request body could not be serialized.
	#[error("Request body could not be serialized: {message}.")]
	RequestBody {
		/// Serializer message.
		message: String,
	},
	/// Session construction was missing a required field.
	#[error(transparent)]
	SessionBuild(#[from] crate::auth::SessionBuilderError),
	/// An authorization scheme is empty or contains whitespace or control characters.
	#[error("Authorization scheme `{scheme}` must be a non-empty run of visible ASCII.")]
	InvalidAuthScheme {
		/// Rejected scheme.
		scheme: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}

/// Transport-level failures (no usable response).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint label or URL being called.
		endpoint: String,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The call exceeded its timeout.
	#[error("Request to {endpoint} timed out.")]
	Timeout {
		/// Endpoint label or URL being called.
		endpoint: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: impl Into<String>,
		src: impl 'static + Send + Sync + StdError,
	) -> Self {
		Self::Network { endpoint: endpoint.into(), source: Arc::new(src) }
	}

	/// Builds a timeout error for the provided endpoint.
	pub fn timeout(endpoint: impl Into<String>) -> Self {
		Self::Timeout { endpoint: endpoint.into() }
	}

	/// Returns `true` for timeouts.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		let endpoint = e.url().map(|url| url.to_string()).unwrap_or_else(|| "<unknown>".into());

		if e.is_timeout() { Self::timeout(endpoint) } else { Self::network(endpoint, e) }
	}
}

/// Server rejections and boundary schema mismatches.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// The server answered with a 4xx status other than 401.
	#[error("Request was rejected with HTTP {status}: {message}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Server-supplied message or a body preview.
		message: String,
	},
	/// A response body did not match the canonical schema of its endpoint.
	#[error("Response from {endpoint} does not match the expected schema at `{path}`: {message}.")]
	Schema {
		/// Endpoint label.
		endpoint: String,
		/// JSON path of the first mismatch.
		path: String,
		/// Deserializer message.
		message: String,
	},
	/// A token returned by the server cannot be used as a bearer credential.
	#[error(transparent)]
	Token(#[from] crate::auth::TokenSecretError),
}
impl ValidationError {
	/// Builds a schema error from a path-aware deserialization failure.
	pub fn schema(
		endpoint: impl Into<String>,
		err: serde_path_to_error::Error<serde_json::Error>,
	) -> Self {
		Self::Schema {
			endpoint: endpoint.into(),
			path: err.path().to_string(),
			message: err.into_inner().to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	#[allow(dead_code)]
	struct Probe {
		token: String,
	}

	#[test]
	fn schema_error_reports_json_path() {
		let mut de = serde_json::Deserializer::from_str(r#"{"token":42}"#);
		let err = serde_path_to_error::deserialize::<_, Probe>(&mut de)
			.expect_err("Integer token should not deserialize into a string.");
		let validation = ValidationError::schema("login", err);

		match &validation {
			ValidationError::Schema { endpoint, path, .. } => {
				assert_eq!(endpoint, "login");
				assert_eq!(path, "token");
			},
			other => panic!("Unexpected validation variant: {other:?}."),
		}

		assert!(validation.to_string().contains("`token`"));
	}

	#[test]
	fn transient_classification_covers_refresh_and_upstream() {
		let refresh = Error::RefreshUnavailable {
			reason: "server_error".into(),
			retry_after: Some(Duration::seconds(3)),
		};

		assert!(refresh.is_transient());
		assert_eq!(refresh.retry_after(), Some(Duration::seconds(3)));
		assert!(!Error::SessionExpired.is_transient());
		assert!(Error::SessionExpired.is_session_expired());
		assert!(Error::from(TransportError::timeout("/auth/refresh/")).is_transient());
	}

	#[test]
	fn cloned_errors_keep_their_source() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
		let err = Error::from(TransportError::network("/api/orders/", io));
		let cloned = err.clone();
		let source = StdError::source(&cloned)
			.expect("Cloned transport error should expose the original source.");

		assert_eq!(source.to_string(), "reset by peer");
	}
}
