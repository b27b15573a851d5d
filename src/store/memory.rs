//! Thread-safe in-memory [`TokenStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::Session,
	store::{StoreFuture, TokenStore},
};

/// Process-local session storage; clones share the same slot.
///
/// Any clone calling [`TokenStore::clear`] logs out every other holder, which is how tests and
/// embedders simulate a logout performed elsewhere.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<Session>>>);
impl MemoryStore {
	/// Creates a store pre-seeded with a session.
	pub fn with_session(session: Session) -> Self {
		Self(Arc::new(RwLock::new(Some(session))))
	}

	/// Returns the current session without going through the async contract.
	pub fn snapshot(&self) -> Option<Session> {
		self.0.read().clone()
	}
}
impl TokenStore for MemoryStore {
	fn get(&self) -> StoreFuture<'_, Option<Session>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn set(&self, session: Session) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(session);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
