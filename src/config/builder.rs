// self
use crate::{
	_prelude::*,
	config::{AuthEndpoints, BackoffPolicy, SessionConfig},
};

/// Errors raised while constructing or validating session configs.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SessionConfigError {
	/// Only `http` and `https` APIs are supported.
	#[error("The {endpoint} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which URL failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// The base URL cannot have paths joined onto it (e.g. `mailto:`).
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// URL that failed validation.
		url: String,
	},
	/// An endpoint path could not be resolved.
	#[error("The {endpoint} path `{path}` is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Supplied path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Timeouts must be strictly positive.
	#[error("The {field} must be positive.")]
	NonPositiveTimeout {
		/// Offending field.
		field: &'static str,
	},
	/// The preemptive window cannot be negative.
	#[error("The preemptive window cannot be negative.")]
	NegativePreemptiveWindow,
	/// The preemptive window exceeds [`SessionConfig::MAX_PREEMPTIVE_WINDOW`].
	#[error("The preemptive window cannot exceed {max}.")]
	PreemptiveWindowTooLong {
		/// Accepted upper bound.
		max: Duration,
	},
	/// Backoff bounds are inconsistent.
	#[error("Backoff maximum must be at least the initial delay.")]
	InvalidBackoff,
	/// The backoff maximum exceeds [`SessionConfig::MAX_BACKOFF`].
	#[error("Backoff maximum cannot exceed {max}.")]
	BackoffTooLong {
		/// Accepted upper bound.
		max: Duration,
	},
}

/// Builder for [`SessionConfig`] values.
#[derive(Debug)]
pub struct SessionConfigBuilder {
	/// API base URL.
	pub base_url: Url,
	/// Login endpoint path relative to the base URL.
	pub login_path: String,
	/// Refresh endpoint path relative to the base URL.
	pub refresh_path: String,
	/// Timeout for refresh calls.
	pub refresh_timeout: Duration,
	/// Timeout for login and resource calls.
	pub request_timeout: Option<Duration>,
	/// Preemptive refresh window.
	pub preemptive_window: Duration,
	/// Transient failure backoff.
	pub transient_backoff: BackoffPolicy,
}
impl SessionConfigBuilder {
	/// Creates a new builder seeded with the provided base URL and default endpoints.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			login_path: SessionConfig::DEFAULT_LOGIN_PATH.into(),
			refresh_path: SessionConfig::DEFAULT_REFRESH_PATH.into(),
			refresh_timeout: SessionConfig::DEFAULT_REFRESH_TIMEOUT,
			request_timeout: None,
			preemptive_window: Duration::ZERO,
			transient_backoff: BackoffPolicy::DISABLED,
		}
	}

	/// Overrides the login endpoint path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the refresh call timeout.
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Sets the timeout for login and resource calls.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Sets the preemptive refresh window.
	pub fn preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = window;

		self
	}

	/// Sets the transient failure backoff policy.
	pub fn transient_backoff(mut self, policy: BackoffPolicy) -> Self {
		self.transient_backoff = policy;

		self
	}

	/// Validates the inputs and produces a [`SessionConfig`].
	pub fn build(self) -> Result<SessionConfig, SessionConfigError> {
		validate_scheme("base", &self.base_url)?;

		if self.base_url.cannot_be_a_base() {
			return Err(SessionConfigError::CannotBeABase { url: self.base_url.to_string() });
		}

		let login = resolve_endpoint(&self.base_url, "login", &self.login_path)?;
		let refresh = resolve_endpoint(&self.base_url, "refresh", &self.refresh_path)?;

		if !self.refresh_timeout.is_positive() {
			return Err(SessionConfigError::NonPositiveTimeout { field: "refresh timeout" });
		}
		if self.request_timeout.is_some_and(|timeout| !timeout.is_positive()) {
			return Err(SessionConfigError::NonPositiveTimeout { field: "request timeout" });
		}
		if self.preemptive_window.is_negative() {
			return Err(SessionConfigError::NegativePreemptiveWindow);
		}
		if self.preemptive_window > SessionConfig::MAX_PREEMPTIVE_WINDOW {
			return Err(SessionConfigError::PreemptiveWindowTooLong {
				max: SessionConfig::MAX_PREEMPTIVE_WINDOW,
			});
		}
		if self.transient_backoff.is_enabled() {
			if self.transient_backoff.max < self.transient_backoff.initial {
				return Err(SessionConfigError::InvalidBackoff);
			}
			if self.transient_backoff.max > SessionConfig::MAX_BACKOFF {
				return Err(SessionConfigError::BackoffTooLong { max: SessionConfig::MAX_BACKOFF });
			}
		}

		Ok(SessionConfig {
			base_url: self.base_url,
			endpoints: AuthEndpoints { login, refresh },
			refresh_timeout: self.refresh_timeout,
			request_timeout: self.request_timeout,
			preemptive_window: self.preemptive_window,
			transient_backoff: self.transient_backoff,
		})
	}
}

fn validate_scheme(endpoint: &'static str, url: &Url) -> Result<(), SessionConfigError> {
	match url.scheme() {
		"http" | "https" => Ok(()),
		_ => Err(SessionConfigError::UnsupportedScheme { endpoint, url: url.to_string() }),
	}
}

fn resolve_endpoint(
	base: &Url,
	endpoint: &'static str,
	path: &str,
) -> Result<Url, SessionConfigError> {
	let url = base.join(path).map_err(|source| SessionConfigError::InvalidEndpoint {
		endpoint,
		path: path.to_owned(),
		source,
	})?;

	validate_scheme(endpoint, &url)?;

	Ok(url)
}
