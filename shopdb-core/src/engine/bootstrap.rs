use thiserror::Error;
use tracing::{info, warn};

use crate::{
	db::StoreHandle,
	engine::{
		backup::BackupError,
		record_store::{self, StoreError},
		restore::{self, RestoreReport},
	},
	models::collection::Collection,
};

#[derive(Debug, Error)]
pub enum BootstrapError {
	#[error("collection {collection} is corrupt, refusing to start: {source}")]
	Corrupt { collection: Collection, source: StoreError },

	#[error("cannot read collection {collection}: {source}")]
	Read { collection: Collection, source: StoreError },

	#[error("restore from backup failed: {0}")]
	Restore(#[from] BackupError),
}

/// How the live store was populated at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
	/// A primary collection was already present; nothing was touched.
	KeptExisting,
	Restored(RestoreReport),
	/// Collections that received their default contents.
	Seeded(Vec<Collection>),
}

/// Decide once, before serving, how the live store gets its data.
///
/// check existing → restore latest snapshot → seed defaults. Existing live
/// files are never overwritten.
pub fn run(db: &StoreHandle) -> Result<BootstrapOutcome, BootstrapError> {
	if has_primary_data(db)? {
		info!(data_dir = %db.data_dir().display(), "existing data found, leaving it in place");
		return Ok(BootstrapOutcome::KeptExisting);
	}

	if let Some(report) = restore::restore_from_backup(db)? {
		if report.is_complete() {
			info!(snapshot = %report.snapshot, "data restored from backup");
		} else {
			warn!(snapshot = %report.snapshot, failed = report.failed.len(), "data partially restored from backup");
		}
		return Ok(BootstrapOutcome::Restored(report));
	}

	Ok(BootstrapOutcome::Seeded(seed_defaults(db)))
}

/// True if any primary collection file exists. A primary file that exists
/// but does not parse stops startup instead of being treated as absent.
fn has_primary_data(db: &StoreHandle) -> Result<bool, BootstrapError> {
	let mut found = false;
	for collection in Collection::PRIMARY {
		match record_store::read(&db.collection_path(collection)) {
			Ok(Some(_)) => found = true,
			Ok(None) => {}
			Err(source @ StoreError::Corrupt { .. }) => return Err(BootstrapError::Corrupt { collection, source }),
			Err(source) => return Err(BootstrapError::Read { collection, source }),
		}
	}
	Ok(found)
}

/// Write defaults for each collection still missing. One failure does not
/// stop the rest.
fn seed_defaults(db: &StoreHandle) -> Vec<Collection> {
	let mut seeded = Vec::new();
	for collection in Collection::ALL {
		let _guard = db.lock(collection);
		let path = db.collection_path(collection);
		if path.exists() {
			continue;
		}

		match record_store::write(&path, &collection.seed_records()) {
			Ok(()) => seeded.push(collection),
			Err(err) => warn!(%collection, error = %err, "failed to seed collection"),
		}
	}

	info!(seeded = seeded.len(), "seeded default collections");
	seeded
}

#[cfg(test)]
mod tests {
	use std::fs;

	use super::*;
	use crate::{config::StoreConfig, engine::backup};

	fn store(tmp: &tempfile::TempDir) -> StoreHandle {
		StoreHandle::new(StoreConfig::from_root(tmp.path()))
	}

	fn snapshot_files(db: &StoreHandle) -> Vec<(String, Vec<u8>)> {
		let mut files: Vec<_> = fs::read_dir(db.data_dir())
			.unwrap()
			.map(|e| {
				let e = e.unwrap();
				(e.file_name().to_string_lossy().to_string(), fs::read(e.path()).unwrap())
			})
			.collect();
		files.sort();
		files
	}

	#[test]
	fn existing_primary_data_is_untouched() {
		for primary in Collection::PRIMARY {
			let tmp = tempfile::tempdir().unwrap();
			let db = store(&tmp);
			fs::create_dir_all(db.data_dir()).unwrap();
			fs::write(db.collection_path(primary), "\u{feff}[ {\"id\": \"x\"} ]").unwrap();
			// A snapshot exists but must not be applied.
			let snap = db.snapshot_path("backup-2099-01-01T00-00-00-000Z");
			fs::create_dir_all(&snap).unwrap();
			fs::write(snap.join(primary.file_name()), "[]").unwrap();

			let before = snapshot_files(&db);
			assert_eq!(run(&db).unwrap(), BootstrapOutcome::KeptExisting);
			assert_eq!(snapshot_files(&db), before, "{primary} was modified");
		}
	}

	#[test]
	fn secondary_collections_alone_do_not_count() {
		let tmp = tempfile::tempdir().unwrap();
		let db = store(&tmp);
		fs::create_dir_all(db.data_dir()).unwrap();
		fs::write(db.collection_path(Collection::BlogPosts), "[{\"id\":\"b1\"}]").unwrap();

		let outcome = run(&db).unwrap();

		let BootstrapOutcome::Seeded(seeded) = outcome else {
			panic!("expected seeding, got {outcome:?}");
		};
		assert!(!seeded.contains(&Collection::BlogPosts));
		assert_eq!(seeded.len(), 5);
		assert_eq!(
			fs::read_to_string(db.collection_path(Collection::BlogPosts)).unwrap(),
			"[{\"id\":\"b1\"}]"
		);
	}

	#[test]
	fn restores_when_no_primary_data() {
		let tmp = tempfile::tempdir().unwrap();
		let db = store(&tmp);
		fs::create_dir_all(db.data_dir()).unwrap();
		fs::write(db.collection_path(Collection::Products), "[{\"id\":\"p1\"}]").unwrap();
		backup::create_backup(&db).unwrap();
		fs::remove_file(db.collection_path(Collection::Products)).unwrap();

		let outcome = run(&db).unwrap();

		let BootstrapOutcome::Restored(report) = outcome else {
			panic!("expected restore, got {outcome:?}");
		};
		assert_eq!(report.restored, vec![Collection::Products]);
		assert_eq!(
			fs::read_to_string(db.collection_path(Collection::Products)).unwrap(),
			"[{\"id\":\"p1\"}]"
		);
		// Restore succeeded, so no seeding happened.
		assert!(!db.collection_path(Collection::Orders).exists());
	}

	#[test]
	fn seeds_defaults_without_data_or_backups() {
		let tmp = tempfile::tempdir().unwrap();
		let db = store(&tmp);

		let outcome = run(&db).unwrap();
		assert_eq!(outcome, BootstrapOutcome::Seeded(Collection::ALL.to_vec()));

		for collection in Collection::ALL {
			let records = record_store::read(&db.collection_path(collection)).unwrap().unwrap();
			if collection == Collection::Orders {
				assert_eq!(records.len(), 1);
				assert_eq!(records[0]["id"], "1");
			} else {
				assert!(records.is_empty(), "{collection} should be empty");
			}
		}
	}

	#[test]
	fn second_run_keeps_seeded_data() {
		let tmp = tempfile::tempdir().unwrap();
		let db = store(&tmp);

		run(&db).unwrap();
		let before = snapshot_files(&db);
		assert_eq!(run(&db).unwrap(), BootstrapOutcome::KeptExisting);
		assert_eq!(snapshot_files(&db), before);
	}

	#[test]
	fn corrupt_primary_stops_startup() {
		let tmp = tempfile::tempdir().unwrap();
		let db = store(&tmp);
		fs::create_dir_all(db.data_dir()).unwrap();
		fs::write(db.collection_path(Collection::Categories), "{not json").unwrap();

		let err = run(&db).unwrap_err();
		assert!(matches!(err, BootstrapError::Corrupt { collection: Collection::Categories, .. }));
		// Nothing was seeded over the corrupt file.
		assert_eq!(fs::read_to_string(db.collection_path(Collection::Categories)).unwrap(), "{not json");
		assert!(!db.collection_path(Collection::Products).exists());
	}

	#[test]
	fn init_builds_handle_and_bootstraps() {
		let tmp = tempfile::tempdir().unwrap();
		let (db, outcome) = StoreHandle::init(StoreConfig::from_root(tmp.path())).unwrap();

		assert!(matches!(outcome, BootstrapOutcome::Seeded(_)));
		assert!(db.collection_path(Collection::Orders).is_file());
	}
}
