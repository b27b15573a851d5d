//! Session lifecycle manager for rental dashboards: token stores, single-flight refresh and
//! retry-once request pipelines over a remote rental-management API.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod obs;
pub mod pipeline;
pub mod refresh;
pub mod session;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Session, UserProfile},
		config::SessionConfig,
		http::ReqwestHttpClient,
		session::SessionContext,
		store::{MemoryStore, TokenStore},
	};

	/// Session context type alias used by reqwest-backed integration tests.
	pub type ReqwestTestContext = SessionContext<ReqwestHttpClient>;

	/// Builds a reqwest HTTP client suitable for talking to `httpmock` servers during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.danger_accept_invalid_certs(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a config pointing at the provided mock server base URL.
	pub fn test_config(base_url: &str) -> SessionConfig {
		SessionConfig::builder(Url::parse(base_url).expect("Mock base URL should parse."))
			.build()
			.expect("Test session config should build.")
	}

	/// Builds a session fixture with the provided token pair and a numeric user id.
	pub fn test_session(access: &str, refresh: &str) -> Session {
		let user: UserProfile = serde_json::from_str(r#"{"id":7,"email":"vendor@example.com"}"#)
			.expect("User profile fixture should deserialize.");

		Session::builder(user)
			.access_token(access)
			.refresh_token(refresh)
			.build()
			.expect("Session fixture should build.")
	}

	/// Constructs a [`SessionContext`] backed by an in-memory store and the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_context(config: SessionConfig) -> (ReqwestTestContext, MemoryStore) {
		let store_backend = MemoryStore::default();
		let store: Arc<dyn TokenStore> = Arc::new(store_backend.clone());
		let context = SessionContext::with_http_client(config, store, test_reqwest_http_client());

		(context, store_backend)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
