//! Storage contracts and built-in store implementations for the current session.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Session};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the session token pair.
///
/// Writes are last-writer-wins and always replace the whole [`Session`], so the access and refresh
/// tokens can never be observed half-updated. Once any party clears the store, `get` must return
/// `None` until a new session is written.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the persisted session, if any.
	fn get(&self) -> StoreFuture<'_, Option<Session>>;

	/// Persists or replaces the session.
	fn set(&self, session: Session) -> StoreFuture<'_, ()>;

	/// Removes every persisted key of the session at once.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
