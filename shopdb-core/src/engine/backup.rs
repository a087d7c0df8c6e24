use std::{
	collections::BTreeMap,
	fs, io,
	path::PathBuf,
};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
	db::StoreHandle,
	engine::{
		copier::{self, CopyError},
		record_store::{self, StoreError},
	},
	models::{
		collection::Collection,
		manifest::{BackupManifest, FailedFile, MANIFEST_FILE},
	},
};

/// Every snapshot directory name starts with this.
pub const SNAPSHOT_PREFIX: &str = "backup-";

#[derive(Debug, Error)]
pub enum BackupError {
	#[error("failed to create snapshot directory {}: {source}", .path.display())]
	CreateSnapshotDir { path: PathBuf, source: io::Error },

	#[error("failed to list backups in {}: {source}", .path.display())]
	ListBackups { path: PathBuf, source: io::Error },

	#[error("failed to write manifest for {snapshot}: {source}")]
	WriteManifest { snapshot: String, source: StoreError },

	#[error("failed to read manifest for {snapshot}: {reason}")]
	ReadManifest { snapshot: String, reason: String },

	#[error("unknown snapshot: {0}")]
	UnknownSnapshot(String),
}

#[derive(Debug, Clone)]
pub struct BackupReport {
	pub snapshot: String,
	pub manifest: BackupManifest,
}

/// Result of re-hashing a snapshot against its manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyReport {
	pub verified: Vec<String>,
	pub mismatched: Vec<String>,
	pub missing: Vec<String>,
	/// Listed in the manifest without a checksum to compare against.
	pub unverified: Vec<String>,
}

impl VerifyReport {
	pub fn is_ok(&self) -> bool {
		self.mismatched.is_empty() && self.missing.is_empty() && self.unverified.is_empty()
	}
}

/// `backup-` + the ISO-8601 instant with `:` and `.` replaced by `-`.
/// Names sort lexicographically in creation order.
pub fn snapshot_name(at: DateTime<Utc>) -> String {
	let iso = at.to_rfc3339_opts(SecondsFormat::Millis, true);
	format!("{SNAPSHOT_PREFIX}{}", iso.replace([':', '.'], "-"))
}

/// Snapshot every live collection file into a new `backup-<timestamp>` directory.
///
/// A file that fails to copy is logged and left out of the manifest; the
/// snapshot still counts. Only a missing snapshot directory or manifest is fatal.
pub fn create_backup(db: &StoreHandle) -> Result<BackupReport, BackupError> {
	create_backup_at(db, Utc::now())
}

pub(crate) fn create_backup_at(db: &StoreHandle, now: DateTime<Utc>) -> Result<BackupReport, BackupError> {
	let snapshot = snapshot_name(now);
	let dir = db.snapshot_path(&snapshot);

	fs::create_dir_all(&dir).map_err(|source| {
		error!(snapshot = %snapshot, error = %source, "cannot create snapshot directory");
		BackupError::CreateSnapshotDir { path: dir.clone(), source }
	})?;

	let mut files = Vec::new();
	let mut failed = Vec::new();
	let mut checksums = BTreeMap::new();

	for collection in Collection::ALL {
		let live = db.collection_path(collection);
		if !live.exists() {
			continue;
		}

		let file_name = collection.file_name();
		match copier::copy_with_retry(&live, &dir.join(&file_name), copier::DEFAULT_ATTEMPTS) {
			Ok(result) => {
				checksums.insert(file_name.clone(), result.dest_hash);
				files.push(file_name);
			}
			Err(err) => {
				warn!(snapshot = %snapshot, %collection, error = %err, "skipping collection in backup");
				failed.push(FailedFile { file: file_name, error: err.to_string() });
			}
		}
	}

	let total_backups = get_backup_count(db)?;
	let manifest = BackupManifest {
		timestamp: Utc::now(),
		files,
		failed,
		checksums,
		total_backups,
	};
	write_manifest(db, &snapshot, &manifest)?;

	info!(
		snapshot = %snapshot,
		copied = manifest.files.len(),
		failed = manifest.failed.len(),
		total_backups,
		"backup created"
	);

	Ok(BackupReport { snapshot, manifest })
}

fn write_manifest(db: &StoreHandle, snapshot: &str, manifest: &BackupManifest) -> Result<(), BackupError> {
	let to_error = |source: StoreError| BackupError::WriteManifest { snapshot: snapshot.to_string(), source };
	let json = serde_json::to_vec_pretty(manifest).map_err(|e| to_error(StoreError::from(e)))?;
	record_store::write_atomic(&db.snapshot_path(snapshot).join(MANIFEST_FILE), &json).map_err(to_error)
}

/// Delete the oldest snapshots so that at most `retain` remain.
/// Returns the names actually removed. A snapshot that cannot be removed is
/// logged and does not stop the others.
pub fn cleanup_old_backups(db: &StoreHandle) -> Result<Vec<String>, BackupError> {
	let retain = db.config().retain();
	let backups = get_backups(db)?;
	if backups.len() <= retain {
		return Ok(Vec::new());
	}

	let excess = backups.len() - retain;
	let mut removed = Vec::with_capacity(excess);
	for name in &backups[..excess] {
		match fs::remove_dir_all(db.snapshot_path(name)) {
			Ok(()) => {
				info!(snapshot = %name, "removed old backup");
				removed.push(name.clone());
			}
			Err(err) => warn!(snapshot = %name, error = %err, "failed to remove old backup"),
		}
	}

	Ok(removed)
}

/// The `backup` workflow: snapshot, then prune to the retention count.
pub fn backup_and_prune(db: &StoreHandle) -> Result<(BackupReport, Vec<String>), BackupError> {
	let report = create_backup(db)?;
	let removed = cleanup_old_backups(db)?;
	Ok((report, removed))
}

/// Snapshot directory names, oldest first. Empty if the backup root does not exist.
pub fn get_backups(db: &StoreHandle) -> Result<Vec<String>, BackupError> {
	let root = db.backup_dir();
	let entries = match fs::read_dir(root) {
		Ok(entries) => entries,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
		Err(source) => return Err(BackupError::ListBackups { path: root.clone(), source }),
	};

	let mut names = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|source| BackupError::ListBackups { path: root.clone(), source })?;
		let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
		if !is_dir {
			continue;
		}
		if let Ok(name) = entry.file_name().into_string() {
			if name.starts_with(SNAPSHOT_PREFIX) {
				names.push(name);
			}
		}
	}

	names.sort();
	Ok(names)
}

pub fn get_backup_count(db: &StoreHandle) -> Result<usize, BackupError> {
	Ok(get_backups(db)?.len())
}

/// Fails with `UnknownSnapshot` unless `snapshot` is in the snapshot set.
pub(crate) fn ensure_snapshot(db: &StoreHandle, snapshot: &str) -> Result<(), BackupError> {
	if get_backups(db)?.iter().any(|b| b == snapshot) {
		Ok(())
	} else {
		Err(BackupError::UnknownSnapshot(snapshot.to_string()))
	}
}

pub fn read_manifest(db: &StoreHandle, snapshot: &str) -> Result<BackupManifest, BackupError> {
	ensure_snapshot(db, snapshot)?;

	let path = db.snapshot_path(snapshot).join(MANIFEST_FILE);
	let reason = |r: String| BackupError::ReadManifest { snapshot: snapshot.to_string(), reason: r };
	let text = fs::read_to_string(&path).map_err(|e| reason(e.to_string()))?;
	let body = text.strip_prefix('\u{feff}').unwrap_or(&text);
	serde_json::from_str(body).map_err(|e| reason(e.to_string()))
}

/// Re-hash every file recorded in a snapshot's manifest.
pub fn verify_snapshot(db: &StoreHandle, snapshot: &str) -> Result<VerifyReport, BackupError> {
	let manifest = read_manifest(db, snapshot)?;
	let dir = db.snapshot_path(snapshot);
	let mut report = VerifyReport::default();

	for file in &manifest.files {
		let Some(expected) = manifest.checksums.get(file) else {
			warn!(snapshot = %snapshot, file = %file, "manifest has no checksum for file");
			report.unverified.push(file.clone());
			continue;
		};

		match copier::hash_file(&dir.join(file)) {
			Ok(actual) if &actual == expected => report.verified.push(file.clone()),
			Ok(_) => report.mismatched.push(file.clone()),
			Err(CopyError::SourceNotFound(_)) => report.missing.push(file.clone()),
			Err(err) => {
				warn!(snapshot = %snapshot, file = %file, error = %err, "cannot hash snapshot file");
				report.mismatched.push(file.clone());
			}
		}
	}

	Ok(report)
}
