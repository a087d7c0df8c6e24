use std::{path::PathBuf, sync::Arc};

use parking_lot::{Mutex, MutexGuard};

use crate::{
	config::StoreConfig,
	engine::bootstrap::{self, BootstrapError, BootstrapOutcome},
	models::collection::Collection,
};

/// Handle to one data root + backup root.
/// Clone is cheap (Arc internally).
#[derive(Clone)]
pub struct StoreHandle {
	inner: Arc<Inner>,
}

struct Inner {
	config: StoreConfig,
	/// One write lock per collection, indexed by `Collection as usize`.
	locks: [Mutex<()>; Collection::ALL.len()],
}

impl std::fmt::Debug for StoreHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StoreHandle").field("config", &self.inner.config).finish()
	}
}

impl StoreHandle {
	/// Build a handle without touching the filesystem.
	pub fn new(config: StoreConfig) -> Self {
		Self {
			inner: Arc::new(Inner {
				config,
				locks: Default::default(),
			}),
		}
	}

	/// Build a handle and run the startup sequence once: keep existing data,
	/// else restore the latest snapshot, else seed defaults.
	pub fn init(config: StoreConfig) -> Result<(Self, BootstrapOutcome), BootstrapError> {
		let handle = Self::new(config);
		let outcome = bootstrap::run(&handle)?;
		Ok((handle, outcome))
	}

	pub fn config(&self) -> &StoreConfig {
		&self.inner.config
	}

	pub fn data_dir(&self) -> &PathBuf {
		&self.inner.config.data_dir
	}

	pub fn backup_dir(&self) -> &PathBuf {
		&self.inner.config.backup_dir
	}

	/// Live file for a collection: `<data>/<name>.json`.
	pub fn collection_path(&self, collection: Collection) -> PathBuf {
		self.data_dir().join(collection.file_name())
	}

	/// Snapshot directory: `<backup>/<name>`.
	pub fn snapshot_path(&self, snapshot: &str) -> PathBuf {
		self.backup_dir().join(snapshot)
	}

	/// Serialize read-modify-write cycles on one collection within this process.
	pub fn lock(&self, collection: Collection) -> MutexGuard<'_, ()> {
		self.inner.locks[collection as usize].lock()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn paths_follow_config() {
		let db = StoreHandle::new(StoreConfig::from_root("/srv/shop"));
		assert_eq!(db.collection_path(Collection::BlogPosts), PathBuf::from("/srv/shop/data/blog-posts.json"));
		assert_eq!(
			db.snapshot_path("backup-2026-01-01T00-00-00-000Z"),
			PathBuf::from("/srv/shop/backup/backup-2026-01-01T00-00-00-000Z")
		);
	}

	#[test]
	fn locks_are_per_collection() {
		let db = StoreHandle::new(StoreConfig::from_root("/srv/shop"));
		let _orders = db.lock(Collection::Orders);
		// A different collection is still free.
		assert!(db.inner.locks[Collection::Products as usize].try_lock().is_some());
		assert!(db.inner.locks[Collection::Orders as usize].try_lock().is_none());
	}
}
