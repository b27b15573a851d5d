//! Observable session transitions.

// self
use crate::{_prelude::*, auth::Session};

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogoutReason {
	/// The user asked to log out.
	Explicit,
	/// The server rejected the refresh token.
	SessionExpired,
	/// Another party cleared the token store.
	External,
}
impl LogoutReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LogoutReason::Explicit => "explicit",
			LogoutReason::SessionExpired => "session_expired",
			LogoutReason::External => "external",
		}
	}
}
impl Display for LogoutReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Receives session lifecycle events.
///
/// Each callback fires exactly once per transition. Callbacks run while the lifecycle is locked,
/// so they must return quickly and must not wait on session operations; spawn a task for anything
/// heavier.
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// A login succeeded and its session was persisted.
	fn on_login_success(&self, _session: &Session) {}

	/// The refresh token was rejected; fired right before the matching
	/// [`on_logout`](Self::on_logout) with [`LogoutReason::SessionExpired`].
	fn on_session_expired(&self) {}

	/// The session ended.
	fn on_logout(&self, _reason: LogoutReason) {}
}

#[derive(Default)]
pub(crate) struct ObserverRegistry(RwLock<Vec<Arc<dyn SessionObserver>>>);
impl ObserverRegistry {
	pub(crate) fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
		self.0.write().push(observer);
	}

	pub(crate) fn login_success(&self, session: &Session) {
		self.snapshot().iter().for_each(|observer| observer.on_login_success(session));
	}

	pub(crate) fn ended(&self, reason: LogoutReason) {
		let observers = self.snapshot();

		if reason == LogoutReason::SessionExpired {
			observers.iter().for_each(|observer| observer.on_session_expired());
		}

		observers.iter().for_each(|observer| observer.on_logout(reason));
	}

	// Callbacks may subscribe further observers.
	fn snapshot(&self) -> Vec<Arc<dyn SessionObserver>> {
		self.0.read().clone()
	}
}
impl Debug for ObserverRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ObserverRegistry").field("observers", &self.0.read().len()).finish()
	}
}
