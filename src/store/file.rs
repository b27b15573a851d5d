//! File-backed [`TokenStore`] that persists the session as a single JSON document.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::Session,
	store::{StoreError, StoreFuture, TokenStore},
};

/// Persists the session to a JSON file after each mutation.
///
/// The document holds the `access_token`, `refresh_token`, and `user` keys (plus `expires_at` when
/// known). Every read goes to disk, so another process deleting the file is observed as a logout
/// on the next [`TokenStore::get`].
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	write_lock: Arc<Mutex<()>>,
}
impl FileStore {
	/// Opens a store at the provided path, creating parent directories as needed.
	///
	/// An existing document is validated eagerly so corruption surfaces at startup.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;
		Self::load(&path)?;

		Ok(Self { path, write_lock: Default::default() })
	}

	/// Location of the session document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load(path: &Path) -> Result<Option<Session>, StoreError> {
		let bytes = match fs::read(path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", path.display()),
				}),
		};

		if bytes.is_empty() {
			return Ok(None);
		}

		serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist(&self, session: &Session) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(session).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize session: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn remove(&self) -> Result<(), StoreError> {
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to remove {}: {e}", self.path.display()),
			}),
		}
	}
}
impl TokenStore for FileStore {
	fn get(&self) -> StoreFuture<'_, Option<Session>> {
		Box::pin(async move { Self::load(&self.path) })
	}

	fn set(&self, session: Session) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let _guard = self.write_lock.lock();

			self.persist(&session)
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let _guard = self.write_lock.lock();

			self.remove()
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::auth::UserProfile;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"rental_session_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn build_session(access: &str) -> Session {
		let user: UserProfile = serde_json::from_str(r#"{"id":3,"email":"desk@example.com"}"#)
			.expect("Failed to build user fixture.");

		Session::builder(user)
			.access_token(access)
			.refresh_token("refresh-token")
			.build()
			.expect("Failed to build file-store test session.")
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let session = build_session("access-token");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set(session.clone())).expect("Failed to save fixture session.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store.");
		let fetched = rt
			.block_on(reopened.get())
			.expect("Failed to read fixture session from file store.")
			.expect("File store lost session after reopen.");

		assert_eq!(fetched, session);

		let raw: serde_json::Value = serde_json::from_slice(
			&fs::read(&path).expect("Session document should exist on disk."),
		)
		.expect("Session document should be JSON.");

		assert_eq!(raw["access_token"], "access-token");
		assert_eq!(raw["refresh_token"], "refresh-token");
		assert_eq!(raw["user"]["id"], "3");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary session document {}: {e}", path.display())
		});
	}

	#[tokio::test]
	async fn clear_removes_all_keys_and_tolerates_missing_file() {
		let path = temp_path("clear");
		let store = FileStore::open(&path).expect("Failed to open file store.");

		store.set(build_session("to-clear")).await.expect("Failed to save fixture session.");
		store.clear().await.expect("Clearing a present session should succeed.");

		assert!(!path.exists());
		assert_eq!(store.get().await.expect("Read after clear should succeed."), None);

		store.clear().await.expect("Clearing an absent session should succeed.");
	}

	#[tokio::test]
	async fn external_delete_is_observed_as_logout() {
		let path = temp_path("external");
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let other_tab = FileStore::open(&path).expect("Failed to open second handle.");

		store.set(build_session("shared")).await.expect("Failed to save fixture session.");

		assert!(other_tab.get().await.expect("Read should succeed.").is_some());

		fs::remove_file(&path).expect("Failed to delete session document externally.");

		assert_eq!(store.get().await.expect("Read after external delete should succeed."), None);
	}

	#[test]
	fn corrupt_document_is_reported_on_open() {
		let path = temp_path("corrupt");

		fs::write(&path, b"{\"access_token\":").expect("Failed to write corrupt fixture.");

		let err = FileStore::open(&path).expect_err("Corrupt documents should fail to open.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).expect("Failed to remove corrupt fixture.");
	}
}
