//! Single-flight token refresh.
//!
//! [`RefreshCoordinator`] guarantees that at most one refresh call is outstanding no matter how
//! many requests discover an expired access token at the same time. The first caller becomes the
//! executor; everyone arriving while it runs waits on the flight lock and, once it is released,
//! notices that the generation moved and takes the recorded outcome instead of calling the
//! endpoint again. Irrecoverable failures end the session through the lifecycle exactly once;
//! transient failures keep it and may start a cooldown.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	api::{AuthApi, RefreshFailure},
	auth::{Session, TokenSecret},
	config::BackoffPolicy,
	http::HttpTransport,
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::lifecycle::{CommitOutcome, Lifecycle},
};

/// Observable state of the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
	/// No refresh is running.
	Idle,
	/// A refresh is running; it started at `generation` and will complete as `generation + 1`.
	Refreshing {
		/// Generation observed when the running refresh started.
		generation: u64,
	},
}

/// Coordinates access token refreshes for one session context.
pub struct RefreshCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	api: AuthApi<C>,
	lifecycle: Arc<Lifecycle>,
	backoff: BackoffPolicy,
	flight_guard: AsyncMutex<()>,
	flight: Mutex<Flight>,
	metrics: RefreshMetrics,
}
impl<C> RefreshCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	pub(crate) fn new(api: AuthApi<C>, lifecycle: Arc<Lifecycle>, backoff: BackoffPolicy) -> Self {
		Self {
			api,
			lifecycle,
			backoff,
			flight_guard: AsyncMutex::new(()),
			flight: Mutex::new(Flight::default()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Refreshes the stored session, or waits for the refresh already in flight.
	///
	/// Every caller that waited on a flight receives that flight's outcome: the rotated
	/// [`Session`], [`Error::SessionExpired`] when the refresh token was rejected (or no session
	/// exists), or [`Error::RefreshUnavailable`] for transient failures.
	pub async fn refresh(&self) -> Result<Session> {
		self.run(None).await
	}

	/// Same as [`refresh`](Self::refresh) for a caller whose request was rejected while carrying
	/// `rejected`.
	///
	/// When the store already holds a different access token, that session is returned without a
	/// network call, so a 401 arriving just after a completed refresh never triggers another one.
	pub async fn refresh_rejected(&self, rejected: &TokenSecret) -> Result<Session> {
		self.run(Some(rejected)).await
	}

	/// Current state of the flight.
	pub fn state(&self) -> RefreshState {
		let flight = self.flight.lock();

		if flight.running {
			RefreshState::Refreshing { generation: flight.generation }
		} else {
			RefreshState::Idle
		}
	}

	/// Number of completed refresh flights.
	pub fn generation(&self) -> u64 {
		self.flight.lock().generation
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	async fn run(&self, rejected: Option<&TokenSecret>) -> Result<Session> {
		const KIND: OpKind = OpKind::Refresh;

		let span =
			OpSpan::new(KIND, if rejected.is_some() { "refresh_rejected" } else { "refresh" });

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				// Read the generation before the store so a flight finishing in between is seen
				// by one of the two checks.
				let observed = self.generation();

				if let Some(newer) = self.superseding(rejected).await? {
					self.metrics.record_joined();

					return Ok(newer);
				}

				let _flight = self.flight_guard.lock().await;

				if let Some(outcome) = self.completed_since(observed) {
					self.metrics.record_joined();
					obs::trace_event(KIND, "joined");

					return outcome;
				}
				if let Some(newer) = self.superseding(rejected).await? {
					self.metrics.record_joined();

					return Ok(newer);
				}

				let in_flight = InFlight::start(&self.flight);
				let outcome = self.execute().await;

				match &outcome {
					Ok(_) => self.metrics.record_success(),
					Err(_) => self.metrics.record_failure(),
				}

				in_flight.complete(outcome.clone());

				outcome
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	async fn execute(&self) -> Result<Session> {
		// Captured before the store read; a login or logout after this point voids the flight.
		let epoch = self.lifecycle.epoch();
		let now = OffsetDateTime::now_utc();

		if let Some(remaining) = self.cooldown_remaining(now) {
			return Err(Error::RefreshUnavailable {
				reason: "refresh is cooling down after transient failures".into(),
				retry_after: Some(remaining),
			});
		}

		let Some(current) = self.lifecycle.store().get().await? else {
			return self.expire(epoch).await;
		};

		self.metrics.record_attempt();

		match self.api.refresh(&current).await {
			Ok(next) => self.commit(epoch, &current, next).await,
			Err(failure) => self.fail(epoch, failure).await,
		}
	}

	async fn commit(&self, epoch: u64, used: &Session, next: Session) -> Result<Session> {
		self.flight.lock().reset_backoff();

		match self.lifecycle.commit_refresh(epoch, used, next.clone()).await? {
			CommitOutcome::Stored => {
				obs::trace_event(OpKind::Refresh, "rotated");

				Ok(next)
			},
			CommitOutcome::Superseded(existing) => {
				obs::trace_event(OpKind::Refresh, "superseded");

				Ok(existing)
			},
			CommitOutcome::Discarded => {
				obs::trace_event(OpKind::Refresh, "discarded");

				Err(Error::SessionExpired)
			},
		}
	}

	async fn fail(&self, epoch: u64, failure: RefreshFailure) -> Result<Session> {
		if failure.is_irrecoverable() {
			self.flight.lock().reset_backoff();

			return self.expire(epoch).await;
		}

		let cooldown = self.flight.lock().note_transient(
			&self.backoff,
			failure.retry_after,
			OffsetDateTime::now_utc(),
		);

		Err(Error::RefreshUnavailable {
			reason: failure.reason,
			retry_after: cooldown.or(failure.retry_after),
		})
	}

	/// Ends the session, or continues with one a newer login stored meanwhile.
	async fn expire(&self, epoch: u64) -> Result<Session> {
		self.lifecycle.expire(epoch).await?.ok_or(Error::SessionExpired)
	}

	async fn superseding(&self, rejected: Option<&TokenSecret>) -> Result<Option<Session>> {
		let Some(rejected) = rejected else {
			return Ok(None);
		};

		Ok(self.lifecycle.store().get().await?.filter(|stored| &stored.access_token != rejected))
	}

	fn completed_since(&self, observed: u64) -> Option<Result<Session>> {
		let flight = self.flight.lock();

		if flight.generation == observed {
			return None;
		}

		flight.last.clone()
	}

	fn cooldown_remaining(&self, now: OffsetDateTime) -> Option<Duration> {
		self.flight.lock().cooldown_until.filter(|until| *until > now).map(|until| until - now)
	}
}
impl<C> Debug for RefreshCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("state", &self.state())
			.field("backoff", &self.backoff)
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[derive(Debug, Default)]
struct Flight {
	running: bool,
	generation: u64,
	last: Option<Result<Session>>,
	consecutive_transient: u32,
	cooldown_until: Option<OffsetDateTime>,
}
impl Flight {
	fn reset_backoff(&mut self) {
		self.consecutive_transient = 0;
		self.cooldown_until = None;
	}

	fn note_transient(
		&mut self,
		policy: &BackoffPolicy,
		retry_after: Option<Duration>,
		now: OffsetDateTime,
	) -> Option<Duration> {
		self.consecutive_transient = self.consecutive_transient.saturating_add(1);

		if !policy.is_enabled() {
			return None;
		}

		let cooldown = policy
			.cooldown_for(self.consecutive_transient)
			.max(retry_after.unwrap_or(Duration::ZERO));

		self.cooldown_until = Some(now.saturating_add(cooldown));

		Some(cooldown)
	}
}

/// Marks the flight as running; a cancelled executor leaves it idle without bumping the
/// generation.
struct InFlight<'a> {
	flight: &'a Mutex<Flight>,
	completed: bool,
}
impl<'a> InFlight<'a> {
	fn start(flight: &'a Mutex<Flight>) -> Self {
		flight.lock().running = true;

		Self { flight, completed: false }
	}

	fn complete(mut self, outcome: Result<Session>) {
		self.completed = true;

		let mut flight = self.flight.lock();

		flight.running = false;
		flight.generation += 1;
		flight.last = Some(outcome);
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		if !self.completed {
			self.flight.lock().running = false;
		}
	}
}
