use std::{
	fs,
	io::{self, Read, Write},
	path::Path,
};

use tempfile::NamedTempFile;
use thiserror::Error;

const CHUNK_SIZE: usize = 256 * 1024; // 256KB

/// Attempts per file for backup and restore copies.
pub const DEFAULT_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum CopyError {
	#[error("source file not found: {0}")]
	SourceNotFound(String),

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	#[error("disk full: {0}")]
	DiskFull(String),

	#[error("I/O error: {0}")]
	IoError(String),

	#[error("hash mismatch: source={source_hash}, dest={dest_hash}")]
	HashMismatch {
		source_hash: String,
		dest_hash: String,
	},
}

impl CopyError {
	/// Whether this error is transient I/O that a later attempt may clear.
	pub fn is_retryable(&self) -> bool {
		matches!(self, CopyError::IoError(_))
	}
}

#[derive(Debug, Clone)]
pub struct CopyResult {
	pub bytes_copied: u64,
	pub source_hash: String,
	pub dest_hash: String,
}

/// Copy `source` over `dest` byte-for-byte and verify the result.
///
/// The bytes land in a temp file beside `dest` which is renamed into place,
/// so an interrupted copy never leaves a truncated `dest` behind.
pub fn copy_and_hash(source: &Path, dest: &Path) -> Result<CopyResult, CopyError> {
	let dest_dir = match dest.parent() {
		Some(p) if !p.as_os_str().is_empty() => p,
		_ => Path::new("."),
	};
	fs::create_dir_all(dest_dir).map_err(|e| map_io_error(e, dest_dir))?;

	let mut input = fs::File::open(source).map_err(|e| map_io_error(e, source))?;
	let mut output = NamedTempFile::new_in(dest_dir).map_err(|e| map_io_error(e, dest_dir))?;

	// Single-pass: read → hash → write
	let mut hasher = blake3::Hasher::new();
	let mut buf = vec![0u8; CHUNK_SIZE];
	let mut bytes_copied: u64 = 0;

	loop {
		let n = input.read(&mut buf).map_err(|e| map_io_error(e, source))?;
		if n == 0 {
			break;
		}

		hasher.update(&buf[..n]);
		output.write_all(&buf[..n]).map_err(|e| map_io_error(e, dest))?;
		bytes_copied += n as u64;
	}

	output.flush().map_err(|e| map_io_error(e, dest))?;
	output.as_file().sync_all().map_err(|e| map_io_error(e, dest))?;
	output.persist(dest).map_err(|e| map_io_error(e.error, dest))?;

	let source_hash = hasher.finalize().to_hex().to_string();

	// Verify: re-read dest, compute hash
	let dest_hash = hash_file(dest)?;
	if source_hash != dest_hash {
		return Err(CopyError::HashMismatch { source_hash, dest_hash });
	}

	Ok(CopyResult { bytes_copied, source_hash, dest_hash })
}

/// [`copy_and_hash`], retrying transient I/O failures up to `attempts` times.
pub fn copy_with_retry(source: &Path, dest: &Path, attempts: u32) -> Result<CopyResult, CopyError> {
	let mut attempt = 1;
	loop {
		match copy_and_hash(source, dest) {
			Err(err) if err.is_retryable() && attempt < attempts => {
				tracing::debug!(path = %source.display(), attempt, error = %err, "retrying copy");
				attempt += 1;
			}
			result => return result,
		}
	}
}

/// Hash a file using blake3 in 256KB chunks.
pub fn hash_file(path: &Path) -> Result<String, CopyError> {
	let mut file = fs::File::open(path).map_err(|e| map_io_error(e, path))?;
	let mut hasher = blake3::Hasher::new();
	let mut buf = vec![0u8; CHUNK_SIZE];

	loop {
		let n = file.read(&mut buf).map_err(|e| map_io_error(e, path))?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}

	Ok(hasher.finalize().to_hex().to_string())
}

fn map_io_error(err: io::Error, path: &Path) -> CopyError {
	let shown = path.display().to_string();
	match err.kind() {
		io::ErrorKind::NotFound => CopyError::SourceNotFound(shown),
		io::ErrorKind::PermissionDenied => CopyError::PermissionDenied(shown),
		io::ErrorKind::StorageFull => CopyError::DiskFull(shown),
		_ => CopyError::IoError(format!("{shown}: {err}")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn copy_and_verify_small_file() {
		let tmp = tempfile::tempdir().unwrap();
		let src = tmp.path().join("products.json");
		let dst = tmp.path().join("snap/products.json");
		fs::write(&src, "[{\"id\":\"p1\"}]").unwrap();

		let result = copy_and_hash(&src, &dst).unwrap();

		assert_eq!(result.bytes_copied, 13);
		assert_eq!(result.source_hash, result.dest_hash);
		assert_eq!(fs::read(&dst).unwrap(), fs::read(&src).unwrap());
	}

	#[test]
	fn copy_overwrites_existing_dest() {
		let tmp = tempfile::tempdir().unwrap();
		let src = tmp.path().join("a.json");
		let dst = tmp.path().join("b.json");
		fs::write(&src, "[]").unwrap();
		fs::write(&dst, "[{\"id\":\"stale\"},{\"id\":\"longer\"}]").unwrap();

		copy_and_hash(&src, &dst).unwrap();
		assert_eq!(fs::read_to_string(&dst).unwrap(), "[]");
	}

	#[test]
	fn hash_empty_file() {
		let tmp = tempfile::tempdir().unwrap();
		let f = tmp.path().join("empty.json");
		fs::write(&f, "").unwrap();

		let hash = hash_file(&f).unwrap();
		assert_eq!(hash.len(), 64); // blake3 hex
	}

	#[test]
	fn hash_multichunk_file() {
		let tmp = tempfile::tempdir().unwrap();
		let f = tmp.path().join("big.bin");
		let data = vec![42u8; CHUNK_SIZE * 3 + 1000];
		fs::write(&f, &data).unwrap();

		let hash = hash_file(&f).unwrap();

		// Must match blake3 computed in one shot
		let expected = blake3::hash(&data).to_hex().to_string();
		assert_eq!(hash, expected);
	}

	#[test]
	fn missing_source_is_classified() {
		let tmp = tempfile::tempdir().unwrap();
		let err = copy_and_hash(&tmp.path().join("nope.json"), &tmp.path().join("out.json")).unwrap_err();
		assert!(matches!(err, CopyError::SourceNotFound(_)));
		assert!(!tmp.path().join("out.json").exists());
	}

	#[test]
	fn retry_gives_up_on_persistent_io_error() {
		let tmp = tempfile::tempdir().unwrap();
		// Reading a directory fails with a plain I/O error on every attempt.
		let src = tmp.path().join("orders.json");
		fs::create_dir(&src).unwrap();

		let err = copy_with_retry(&src, &tmp.path().join("out/orders.json"), 3).unwrap_err();
		assert!(matches!(err, CopyError::IoError(_)));
		assert_eq!(fs::read_dir(tmp.path().join("out")).unwrap().count(), 0);
	}

	#[test]
	fn error_classification() {
		assert!(CopyError::IoError("tmp".into()).is_retryable());
		assert!(!CopyError::SourceNotFound("x".into()).is_retryable());
		assert!(!CopyError::PermissionDenied("x".into()).is_retryable());
		assert!(!CopyError::DiskFull("x".into()).is_retryable());
		assert!(!CopyError::HashMismatch { source_hash: "a".into(), dest_hash: "b".into() }.is_retryable());
	}
}
