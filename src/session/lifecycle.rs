//! Serialized session transitions: login, logout, expiry, external invalidation, and refresh
//! commits.

// std
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::Session,
	obs::{self, OpKind},
	session::{LogoutReason, ObserverRegistry},
	store::TokenStore,
};

/// Result of writing a refreshed session back to the store.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CommitOutcome {
	/// The refreshed session replaced the one it was derived from.
	Stored,
	/// The store holds a session from another refresh or a newer login; it is returned instead.
	Superseded(Session),
	/// The session ended while the refresh ran and nothing replaced it.
	Discarded,
}

/// Owns the store's transitions.
///
/// Every transition runs under one async mutex, and each one that changes who is signed in bumps
/// the epoch. A refresh captures the epoch before reading the store and only commits if it is
/// unchanged, so a logout can never be undone by a refresh that finishes later.
pub(crate) struct Lifecycle {
	store: Arc<dyn TokenStore>,
	state: AsyncMutex<LifecycleState>,
	epoch: AtomicU64,
	authenticated: AtomicBool,
	observers: ObserverRegistry,
}
impl Lifecycle {
	pub(crate) fn new(store: Arc<dyn TokenStore>) -> Self {
		Self {
			store,
			state: AsyncMutex::new(LifecycleState::default()),
			epoch: AtomicU64::new(0),
			authenticated: AtomicBool::new(false),
			observers: ObserverRegistry::default(),
		}
	}

	pub(crate) fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	pub(crate) fn observers(&self) -> &ObserverRegistry {
		&self.observers
	}

	pub(crate) fn epoch(&self) -> u64 {
		self.epoch.load(Ordering::SeqCst)
	}

	pub(crate) fn is_authenticated(&self) -> bool {
		self.authenticated.load(Ordering::SeqCst)
	}

	pub(crate) async fn begin(&self, session: Session) -> Result<()> {
		let mut state = self.state.lock().await;

		self.store.set(session.clone()).await?;
		self.mark(&mut state, true);
		self.epoch.fetch_add(1, Ordering::SeqCst);
		self.observers.login_success(&session);
		obs::trace_event(OpKind::Login, "login_success");

		Ok(())
	}

	/// Reads the store, adopting a persisted session or noticing that someone else cleared it.
	pub(crate) async fn current(&self) -> Result<Option<Session>> {
		let mut state = self.state.lock().await;
		let stored = self.store.get().await?;

		match (&stored, state.active) {
			(None, true) => self.finish(&mut state, LogoutReason::External),
			(Some(_), false) => self.mark(&mut state, true),
			_ => (),
		}

		Ok(stored)
	}

	/// Clears the store and reports whether a signed-in session actually ended.
	pub(crate) async fn end(&self, reason: LogoutReason) -> Result<bool> {
		let mut state = self.state.lock().await;

		self.end_locked(&mut state, reason).await
	}

	/// Ends the session because its refresh token was rejected.
	///
	/// If a login or logout already moved past `epoch` nothing is cleared, and the session stored
	/// since then (if any) is returned for the caller to continue with.
	pub(crate) async fn expire(&self, epoch: u64) -> Result<Option<Session>> {
		let mut state = self.state.lock().await;

		if self.epoch() != epoch {
			return Ok(self.store.get().await?);
		}

		self.end_locked(&mut state, LogoutReason::SessionExpired).await?;

		Ok(None)
	}

	/// Writes `next` if the session `used` for the refresh is still the stored one.
	pub(crate) async fn commit_refresh(
		&self,
		epoch: u64,
		used: &Session,
		next: Session,
	) -> Result<CommitOutcome> {
		let _state = self.state.lock().await;

		if self.epoch() != epoch {
			return Ok(self
				.store
				.get()
				.await?
				.map_or(CommitOutcome::Discarded, CommitOutcome::Superseded));
		}

		match self.store.get().await? {
			None => Ok(CommitOutcome::Discarded),
			Some(stored) if stored.refresh_token != used.refresh_token =>
				Ok(CommitOutcome::Superseded(stored)),
			Some(_) => {
				self.store.set(next).await?;

				Ok(CommitOutcome::Stored)
			},
		}
	}

	async fn end_locked(&self, state: &mut LifecycleState, reason: LogoutReason) -> Result<bool> {
		// An unreadable document still counts as a session to tear down.
		let had_session = !matches!(self.store.get().await, Ok(None));

		self.store.clear().await?;

		let ended = state.active || had_session;

		if ended {
			self.finish(state, reason);
		} else {
			self.mark(state, false);
		}

		Ok(ended)
	}

	fn finish(&self, state: &mut LifecycleState, reason: LogoutReason) {
		self.mark(state, false);
		self.epoch.fetch_add(1, Ordering::SeqCst);
		self.observers.ended(reason);
		obs::trace_event(OpKind::Logout, reason.as_str());
	}

	fn mark(&self, state: &mut LifecycleState, active: bool) {
		state.active = active;
		self.authenticated.store(active, Ordering::SeqCst);
	}
}

impl Debug for Lifecycle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Lifecycle")
			.field("epoch", &self.epoch())
			.field("authenticated", &self.is_authenticated())
			.field("observers", &self.observers)
			.finish()
	}
}

#[derive(Debug, Default)]
struct LifecycleState {
	active: bool,
}
