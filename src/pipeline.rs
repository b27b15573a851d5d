//! Retry-once request execution.
//!
//! Each logical request moves through [`RequestPhase`]s: credentials are attached, the request is
//! sent, and a 401 routes it through the [`RefreshCoordinator`] before exactly one retry with the
//! refreshed token. A request that is still rejected after its retry fails with
//! [`Error::Unauthorized`]; ending the session is left to the refresh path.

// crates.io
use http::StatusCode;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	api::ErrorBody,
	auth::Session,
	config::SessionConfig,
	credential::CredentialAttacher,
	error::ValidationError,
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
	refresh::RefreshCoordinator,
	store::TokenStore,
};

/// Phases of one logical request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestPhase {
	/// Credentials were attached.
	Attached,
	/// The first attempt is on the wire.
	Sent,
	/// The first attempt was rejected with 401.
	NeedsRefresh,
	/// The retry with refreshed credentials is on the wire.
	Retried,
	/// A non-401 response was received.
	Success,
	/// The request ended with an error.
	Failed,
}
impl RequestPhase {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestPhase::Attached => "attached",
			RequestPhase::Sent => "sent",
			RequestPhase::NeedsRefresh => "needs_refresh",
			RequestPhase::Retried => "retried",
			RequestPhase::Success => "success",
			RequestPhase::Failed => "failed",
		}
	}
}
impl Display for RequestPhase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Executes API requests on behalf of the current session.
pub struct RequestPipeline<C>
where
	C: ?Sized + HttpTransport,
{
	transport: Arc<C>,
	config: Arc<SessionConfig>,
	store: Arc<dyn TokenStore>,
	coordinator: Arc<RefreshCoordinator<C>>,
	attacher: Arc<dyn CredentialAttacher>,
}
impl<C> RequestPipeline<C>
where
	C: ?Sized + HttpTransport,
{
	pub(crate) fn new(
		transport: Arc<C>,
		config: Arc<SessionConfig>,
		store: Arc<dyn TokenStore>,
		coordinator: Arc<RefreshCoordinator<C>>,
		attacher: Arc<dyn CredentialAttacher>,
	) -> Self {
		Self { transport, config, store, coordinator, attacher }
	}

	/// Builds a `GET` request for `path`, resolved against the configured base URL.
	pub fn get(&self, path: &str) -> Result<ApiRequest> {
		Ok(ApiRequest::get(self.config.resolve(path)?))
	}

	/// Builds a `POST` request for `path`.
	pub fn post(&self, path: &str) -> Result<ApiRequest> {
		Ok(ApiRequest::post(self.config.resolve(path)?))
	}

	/// Builds a `PUT` request for `path`.
	pub fn put(&self, path: &str) -> Result<ApiRequest> {
		Ok(ApiRequest::put(self.config.resolve(path)?))
	}

	/// Builds a `PATCH` request for `path`.
	pub fn patch(&self, path: &str) -> Result<ApiRequest> {
		Ok(ApiRequest::patch(self.config.resolve(path)?))
	}

	/// Builds a `DELETE` request for `path`.
	pub fn delete(&self, path: &str) -> Result<ApiRequest> {
		Ok(ApiRequest::delete(self.config.resolve(path)?))
	}

	/// Executes `request`, refreshing and retrying once on 401.
	///
	/// Credential-requiring requests fail with [`Error::SessionExpired`] when no session exists.
	/// Non-401 4xx responses become [`ValidationError::Rejected`] and 5xx responses
	/// [`Error::Upstream`]; anything else is returned as is.
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Request;

		let span = OpSpan::new(KIND, "execute");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.run(request)).await;

		obs::trace_event(
			KIND,
			if result.is_ok() { RequestPhase::Success.as_str() } else { RequestPhase::Failed.as_str() },
		);
		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	/// Executes `request` and decodes a successful body into `T`.
	pub async fn execute_json<T>(&self, request: ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let endpoint = request.endpoint().to_owned();
		let response = self.execute(request).await?;

		Ok(response.json(&endpoint)?)
	}

	async fn run(&self, request: ApiRequest) -> Result<ApiResponse> {
		let request = self.with_default_timeout(request);

		if !request.authenticated {
			let response = self.transport.send(request).await?;

			return map_response(response, 1);
		}

		let session = self.session().await?;
		let first = self.attacher.attach(request.clone(), Some(&session));

		obs::trace_event(OpKind::Request, RequestPhase::Attached.as_str());

		let response = self.transport.send(first).await?;

		obs::trace_event(OpKind::Request, RequestPhase::Sent.as_str());

		if response.status != StatusCode::UNAUTHORIZED {
			return map_response(response, 1);
		}

		obs::trace_event(OpKind::Request, RequestPhase::NeedsRefresh.as_str());

		let refreshed = self.coordinator.refresh_rejected(&session.access_token).await?;
		let retry = self.attacher.attach(request, Some(&refreshed));

		obs::trace_event(OpKind::Request, RequestPhase::Retried.as_str());

		let response = self.transport.send(retry).await?;

		map_response(response, 2)
	}

	/// Loads the session, refreshing it first when it expires within the preemptive window.
	async fn session(&self) -> Result<Session> {
		let session = self.store.get().await?.ok_or(Error::SessionExpired)?;

		if !session.expires_within(self.config.preemptive_window, OffsetDateTime::now_utc()) {
			return Ok(session);
		}

		match self.coordinator.refresh_rejected(&session.access_token).await {
			Ok(refreshed) => Ok(refreshed),
			Err(Error::SessionExpired) => Err(Error::SessionExpired),
			// The server has the final say on a token we only believe is expiring.
			Err(_) => Ok(session),
		}
	}

	fn with_default_timeout(&self, request: ApiRequest) -> ApiRequest {
		match (request.timeout, self.config.request_timeout_std()) {
			(None, Some(timeout)) => request.timeout(timeout),
			_ => request,
		}
	}
}
impl<C> Clone for RequestPipeline<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
			attacher: self.attacher.clone(),
		}
	}
}
impl<C> Debug for RequestPipeline<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestPipeline")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

fn map_response(response: ApiResponse, attempts: u8) -> Result<ApiResponse> {
	let status = response.status;

	if status == StatusCode::UNAUTHORIZED {
		return Err(Error::Unauthorized { attempts });
	}
	if status.is_client_error() {
		let body = ErrorBody::parse(&response.body);
		let message = body
			.description()
			.or(body.error_code())
			.map(ToOwned::to_owned)
			.unwrap_or_else(|| response.body_preview());

		return Err(ValidationError::Rejected { status: status.as_u16(), message }.into());
	}
	if status.is_server_error() {
		return Err(Error::Upstream { status: status.as_u16(), retry_after: response.retry_after() });
	}

	Ok(response)
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use http::header::AUTHORIZATION;
	// self
	use super::*;
	use crate::{
		api::AuthApi,
		auth::{UserId, UserProfile},
		config::BackoffPolicy,
		credential::BearerAttacher,
		error::TransportError,
		http::TransportFuture,
		session::lifecycle::Lifecycle,
		store::MemoryStore,
	};

	/// Resource endpoint accepting only `Bearer A2`; refresh always yields `A2`.
	#[derive(Default)]
	struct Backend {
		resource_calls: AtomicUsize,
		refresh_calls: AtomicUsize,
		always_reject: bool,
		seen: Mutex<Vec<Option<String>>>,
	}
	impl HttpTransport for Backend {
		fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
			let reply = if request.url.path().ends_with("/auth/refresh/") {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);

				ApiResponse::new(StatusCode::OK, r#"{"access_token":"A2"}"#)
			} else {
				self.resource_calls.fetch_add(1, Ordering::SeqCst);

				let authorization = request
					.headers
					.get(AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.map(ToOwned::to_owned);
				let accepted = !self.always_reject && authorization.as_deref() == Some("Bearer A2");

				self.seen.lock().push(authorization);

				match (request.url.path(), accepted) {
					("/api/broken/", _) => ApiResponse::new(StatusCode::BAD_GATEWAY, ""),
					("/api/missing/", _) =>
						ApiResponse::new(StatusCode::NOT_FOUND, r#"{"detail":"Not found."}"#),
					(_, true) => ApiResponse::new(StatusCode::OK, r#"{"id":1,"status":"active"}"#),
					(_, false) => ApiResponse::new(StatusCode::UNAUTHORIZED, ""),
				}
			};

			Box::pin(async move { Ok::<_, TransportError>(reply) })
		}
	}

	fn pipeline(backend: Arc<Backend>, store: &MemoryStore) -> RequestPipeline<Backend> {
		let config = Arc::new(
			SessionConfig::builder(
				Url::parse("https://rent.example.com/api/").expect("Base URL fixture should parse."),
			)
			.preemptive_window(Duration::minutes(1))
			.build()
			.expect("Config fixture should build."),
		);
		let store: Arc<dyn TokenStore> = Arc::new(store.clone());
		let lifecycle = Arc::new(Lifecycle::new(store.clone()));
		let api = AuthApi::new(backend.clone(), config.clone());
		let coordinator =
			Arc::new(RefreshCoordinator::new(api, lifecycle, BackoffPolicy::DISABLED));

		RequestPipeline::new(backend, config, store, coordinator, Arc::new(BearerAttacher::default()))
	}

	fn session(access: &str) -> Session {
		Session::builder(UserProfile::new(UserId::from(7)))
			.access_token(access)
			.refresh_token("R1")
			.build()
			.expect("Session fixture should build.")
	}

	#[tokio::test]
	async fn unauthorized_request_is_refreshed_and_retried_once() {
		let backend = Arc::new(Backend::default());
		let store = MemoryStore::with_session(session("A1"));
		let pipeline = pipeline(backend.clone(), &store);
		let request = pipeline.get("orders/1/").expect("Path should resolve.");

		#[derive(Debug, Deserialize)]
		struct Order {
			id: u64,
		}

		let order: Order = pipeline.execute_json(request).await.expect("Retry should succeed.");

		assert_eq!(order.id, 1);
		assert_eq!(backend.resource_calls.load(Ordering::SeqCst), 2);
		assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
		assert_eq!(*backend.seen.lock(), [
			Some("Bearer A1".to_owned()),
			Some("Bearer A2".to_owned()),
		]);
	}

	#[tokio::test]
	async fn persistent_unauthorized_stops_after_two_attempts() {
		let backend = Arc::new(Backend { always_reject: true, ..Default::default() });
		let store = MemoryStore::with_session(session("A1"));
		let pipeline = pipeline(backend.clone(), &store);
		let request = pipeline.get("orders/").expect("Path should resolve.");

		assert!(matches!(pipeline.execute(request).await, Err(Error::Unauthorized { attempts: 2 })));
		assert_eq!(backend.resource_calls.load(Ordering::SeqCst), 2);
		assert!(store.snapshot().is_some(), "A failed retry must not end the session.");
	}

	#[tokio::test]
	async fn missing_session_fails_before_sending() {
		let backend = Arc::new(Backend::default());
		let pipeline = pipeline(backend.clone(), &MemoryStore::default());
		let request = pipeline.get("orders/").expect("Path should resolve.");

		assert!(matches!(pipeline.execute(request).await, Err(Error::SessionExpired)));
		assert_eq!(backend.resource_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn expiring_session_is_refreshed_before_sending() {
		let backend = Arc::new(Backend::default());
		let expiring = Session::builder(UserProfile::new(UserId::from(7)))
			.access_token("A1")
			.refresh_token("R1")
			.expires_in(Duration::seconds(10))
			.build()
			.expect("Session fixture should build.");
		let store = MemoryStore::with_session(expiring);
		let pipeline = pipeline(backend.clone(), &store);
		let request = pipeline.get("orders/").expect("Path should resolve.");

		pipeline.execute(request).await.expect("Preemptively refreshed request should succeed.");

		assert_eq!(backend.resource_calls.load(Ordering::SeqCst), 1);
		assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn error_statuses_are_mapped() {
		let backend = Arc::new(Backend::default());
		let store = MemoryStore::with_session(session("A2"));
		let pipeline = pipeline(backend.clone(), &store);

		match pipeline.execute(pipeline.get("missing/").expect("Path should resolve.")).await {
			Err(Error::Validation(ValidationError::Rejected { status, message })) => {
				assert_eq!(status, 404);
				assert_eq!(message, "Not found.");
			},
			other => panic!("Unexpected response: {other:?}."),
		}
		assert!(matches!(
			pipeline.execute(pipeline.get("broken/").expect("Path should resolve.")).await,
			Err(Error::Upstream { status: 502, .. })
		));
		assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn unauthenticated_requests_skip_credentials() {
		let backend = Arc::new(Backend::default());
		let pipeline = pipeline(backend.clone(), &MemoryStore::default());
		let request = pipeline.get("catalog/").expect("Path should resolve.").unauthenticated();

		assert!(matches!(pipeline.execute(request).await, Err(Error::Unauthorized { attempts: 1 })));
		assert_eq!(*backend.seen.lock(), [None::<String>]);
		assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
	}
}
