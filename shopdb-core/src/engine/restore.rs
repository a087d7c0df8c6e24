use tracing::{info, warn};

use crate::{
	db::StoreHandle,
	engine::{
		backup::{self, BackupError},
		copier,
	},
	models::collection::Collection,
};

/// What a restore actually did.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
	pub snapshot: String,
	pub restored: Vec<Collection>,
	pub failed: Vec<(Collection, String)>,
}

impl RestoreReport {
	/// Every collection present in the snapshot made it back.
	pub fn is_complete(&self) -> bool {
		self.failed.is_empty()
	}
}

/// Copy every collection in the newest snapshot over the live files.
///
/// `Ok(None)` when there are no snapshots; nothing is touched in that case.
pub fn restore_from_backup(db: &StoreHandle) -> Result<Option<RestoreReport>, BackupError> {
	let backups = backup::get_backups(db)?;
	let Some(latest) = backups.last() else {
		info!("no backups found, nothing to restore");
		return Ok(None);
	};

	Ok(Some(restore_from(db, latest)))
}

/// Restore from a specific snapshot in the snapshot set.
pub fn restore_snapshot(db: &StoreHandle, snapshot: &str) -> Result<RestoreReport, BackupError> {
	backup::ensure_snapshot(db, snapshot)?;
	Ok(restore_from(db, snapshot))
}

fn restore_from(db: &StoreHandle, snapshot: &str) -> RestoreReport {
	let dir = db.snapshot_path(snapshot);
	let mut report = RestoreReport {
		snapshot: snapshot.to_string(),
		restored: Vec::new(),
		failed: Vec::new(),
	};

	for collection in Collection::ALL {
		let source = dir.join(collection.file_name());
		if !source.is_file() {
			continue;
		}

		let _guard = db.lock(collection);
		match copier::copy_with_retry(&source, &db.collection_path(collection), copier::DEFAULT_ATTEMPTS) {
			Ok(_) => report.restored.push(collection),
			Err(err) => {
				warn!(snapshot = %snapshot, %collection, error = %err, "failed to restore collection");
				report.failed.push((collection, err.to_string()));
			}
		}
	}

	info!(
		snapshot = %snapshot,
		restored = report.restored.len(),
		failed = report.failed.len(),
		"restore finished"
	);
	report
}
