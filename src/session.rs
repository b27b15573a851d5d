//! Process-wide session handle.
//!
//! [`SessionContext`] owns the token store, the refresh coordinator, and the request pipeline
//! for one signed-in user. It is cheap to clone; every clone shares the same state, so a UI can
//! hand it to as many tasks as it likes.

mod events;
pub(crate) mod lifecycle;

pub use events::{LogoutReason, SessionObserver};

pub(crate) use events::ObserverRegistry;

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	api::{AuthApi, Credentials, RefreshClassifier},
	auth::Session,
	config::SessionConfig,
	credential::{BearerAttacher, CredentialAttacher},
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
	pipeline::RequestPipeline,
	refresh::RefreshCoordinator,
	session::lifecycle::Lifecycle,
	store::TokenStore,
};

/// Login/logout state plus the machinery that keeps the session usable.
pub struct SessionContext<C>
where
	C: ?Sized + HttpTransport,
{
	inner: Arc<Shared<C>>,
}
impl<C> SessionContext<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a context with the default classifier and bearer credentials.
	pub fn with_http_client(
		config: SessionConfig,
		store: Arc<dyn TokenStore>,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self::builder(config, store, http_client).build()
	}

	/// Returns a builder for contexts that customize classification, credentials, or observers.
	pub fn builder(
		config: SessionConfig,
		store: Arc<dyn TokenStore>,
		http_client: impl Into<Arc<C>>,
	) -> SessionContextBuilder<C> {
		SessionContextBuilder {
			config,
			store,
			http_client: http_client.into(),
			classifier: None,
			attacher: Arc::new(BearerAttacher::default()),
			observers: Vec::new(),
		}
	}

	/// Exchanges credentials for a session, replacing any previous one.
	///
	/// Fires [`SessionObserver::on_login_success`] once the session is persisted.
	pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
		const KIND: OpKind = OpKind::Login;

		let span = OpSpan::new(KIND, "login");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let session = self.inner.api.login(credentials).await?;

				self.inner.lifecycle.begin(session.clone()).await?;

				Ok(session)
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	/// Ends the session and clears the store.
	///
	/// Idempotent: concurrent or repeated calls produce a single [`LogoutReason::Explicit`]
	/// notification. Returns whether this call ended a session.
	pub async fn logout(&self) -> Result<bool> {
		const KIND: OpKind = OpKind::Logout;

		let span = OpSpan::new(KIND, "logout");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.inner.lifecycle.end(LogoutReason::Explicit)).await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	/// Returns the stored session.
	///
	/// If the store was cleared by someone else while this context was signed in, the context
	/// signs out and fires [`LogoutReason::External`] once.
	pub async fn current(&self) -> Result<Option<Session>> {
		self.inner.lifecycle.current().await
	}

	/// Adopts a session persisted by an earlier run; call once at application start.
	pub async fn restore(&self) -> Result<Option<Session>> {
		let restored = self.inner.lifecycle.current().await?;

		if restored.is_some() {
			obs::trace_event(OpKind::Login, "restored");
		}

		Ok(restored)
	}

	/// Whether the context currently considers itself signed in.
	pub fn is_authenticated(&self) -> bool {
		self.inner.lifecycle.is_authenticated()
	}

	/// Registers an observer for lifecycle events.
	pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
		self.inner.lifecycle.observers().subscribe(observer);
	}

	/// Executes a request through the pipeline.
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.inner.pipeline.execute(request).await
	}

	/// Request pipeline bound to this session.
	pub fn pipeline(&self) -> &RequestPipeline<C> {
		&self.inner.pipeline
	}

	/// Refresh coordinator bound to this session.
	pub fn coordinator(&self) -> &RefreshCoordinator<C> {
		&self.inner.coordinator
	}

	/// Configuration the context was built with.
	pub fn config(&self) -> &SessionConfig {
		&self.inner.config
	}
}
#[cfg(feature = "reqwest")]
impl SessionContext<ReqwestHttpClient> {
	/// Creates a context backed by a reqwest client with redirects disabled.
	pub fn new(config: SessionConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
		Ok(Self::with_http_client(config, store, ReqwestHttpClient::build()?))
	}
}
impl<C> Clone for SessionContext<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<C> Debug for SessionContext<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionContext")
			.field("base_url", &self.inner.config.base_url.as_str())
			.field("lifecycle", &self.inner.lifecycle)
			.field("coordinator", &self.inner.coordinator)
			.finish()
	}
}

/// Builder for [`SessionContext`].
pub struct SessionContextBuilder<C>
where
	C: ?Sized + HttpTransport,
{
	config: SessionConfig,
	store: Arc<dyn TokenStore>,
	http_client: Arc<C>,
	classifier: Option<Arc<dyn RefreshClassifier>>,
	attacher: Arc<dyn CredentialAttacher>,
	observers: Vec<Arc<dyn SessionObserver>>,
}
impl<C> SessionContextBuilder<C>
where
	C: ?Sized + HttpTransport,
{
	/// Overrides how refresh failures are classified.
	pub fn classifier(mut self, classifier: Arc<dyn RefreshClassifier>) -> Self {
		self.classifier = Some(classifier);

		self
	}

	/// Overrides how credentials are attached to requests.
	pub fn attacher(mut self, attacher: Arc<dyn CredentialAttacher>) -> Self {
		self.attacher = attacher;

		self
	}

	/// Registers an observer before any event can fire.
	pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
		self.observers.push(observer);

		self
	}

	/// Assembles the context.
	pub fn build(self) -> SessionContext<C> {
		let Self { config, store, http_client, classifier, attacher, observers } = self;
		let config = Arc::new(config);
		let mut api = AuthApi::new(http_client.clone(), config.clone());

		if let Some(classifier) = classifier {
			api = api.with_classifier(classifier);
		}

		let lifecycle = Arc::new(Lifecycle::new(store.clone()));

		observers.into_iter().for_each(|observer| lifecycle.observers().subscribe(observer));

		let coordinator = Arc::new(RefreshCoordinator::new(
			api.clone(),
			lifecycle.clone(),
			config.transient_backoff,
		));
		let pipeline =
			RequestPipeline::new(http_client, config.clone(), store, coordinator.clone(), attacher);

		SessionContext { inner: Arc::new(Shared { config, api, lifecycle, coordinator, pipeline }) }
	}
}
impl<C> Debug for SessionContextBuilder<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionContextBuilder")
			.field("config", &self.config)
			.field("observers", &self.observers.len())
			.finish()
	}
}

struct Shared<C>
where
	C: ?Sized + HttpTransport,
{
	config: Arc<SessionConfig>,
	api: AuthApi<C>,
	lifecycle: Arc<Lifecycle>,
	coordinator: Arc<RefreshCoordinator<C>>,
	pipeline: RequestPipeline<C>,
}
