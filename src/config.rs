//! Session configuration: API location, auth endpoint paths, timeouts, and refresh backoff.
//!
//! Values are validated once by [`SessionConfigBuilder::build`]; the rest of the crate relies on
//! the resulting invariants (http(s) base URL, resolved endpoints, positive timeouts).

/// Transient refresh failure backoff.
pub mod backoff;
/// Builder API for assembling session configs.
pub mod builder;

pub use backoff::*;
pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Resolved auth endpoints consumed by the session layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEndpoints {
	/// Login endpoint (`POST { email, password }`).
	pub login: Url,
	/// Refresh endpoint (`POST { refresh_token }`).
	pub refresh: Url,
}

/// Immutable configuration shared by the session context, pipeline, and refresh coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Base URL every relative request path resolves against.
	pub base_url: Url,
	/// Auth endpoint URLs.
	pub endpoints: AuthEndpoints,
	/// Timeout applied to each refresh call.
	pub refresh_timeout: Duration,
	/// Timeout applied to login and resource calls, if any.
	pub request_timeout: Option<Duration>,
	/// Refresh ahead of sending when the access token expires within this window.
	pub preemptive_window: Duration,
	/// Cooldown policy after transient refresh failures.
	pub transient_backoff: BackoffPolicy,
}
impl SessionConfig {
	/// Default refresh call timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(10);
	/// Default login endpoint path.
	pub const DEFAULT_LOGIN_PATH: &'static str = "/auth/login/";
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/auth/refresh/";
	/// Largest accepted preemptive refresh window.
	pub const MAX_PREEMPTIVE_WINDOW: Duration = Duration::days(30);
	/// Largest accepted backoff delay.
	pub const MAX_BACKOFF: Duration = Duration::days(1);

	/// Creates a new builder for the provided API base URL.
	pub fn builder(base_url: Url) -> SessionConfigBuilder {
		SessionConfigBuilder::new(base_url)
	}

	/// Resolves `path` against the base URL (`"orders/"` is relative to the base path,
	/// `"/orders/"` replaces it).
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(path)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}

	pub(crate) fn refresh_timeout_std(&self) -> StdDuration {
		self.refresh_timeout.unsigned_abs()
	}

	pub(crate) fn request_timeout_std(&self) -> Option<StdDuration> {
		self.request_timeout.map(Duration::unsigned_abs)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config(base: &str) -> SessionConfig {
		SessionConfig::builder(Url::parse(base).expect("Base URL fixture should parse."))
			.build()
			.expect("Config fixture should build.")
	}

	#[test]
	fn resolve_handles_relative_and_absolute_paths() {
		let config = config("https://rent.example.com/api/");

		assert_eq!(
			config.resolve("orders/").expect("Relative path should resolve.").as_str(),
			"https://rent.example.com/api/orders/",
		);
		assert_eq!(
			config.resolve("/health/").expect("Absolute path should resolve.").as_str(),
			"https://rent.example.com/health/",
		);
	}

	#[test]
	fn timeouts_convert_to_std() {
		let config = SessionConfig::builder(
			Url::parse("https://rent.example.com").expect("Base URL fixture should parse."),
		)
		.refresh_timeout(Duration::milliseconds(1500))
		.request_timeout(Duration::seconds(30))
		.build()
		.expect("Config with timeouts should build.");

		assert_eq!(config.refresh_timeout_std(), StdDuration::from_millis(1500));
		assert_eq!(config.request_timeout_std(), Some(StdDuration::from_secs(30)));
	}
}
