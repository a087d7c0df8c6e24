use std::{
	fs,
	io::{self, Write},
	path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::Record;

const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("I/O error on {}: {source}", .path.display())]
	Io { path: PathBuf, source: io::Error },

	#[error("corrupt collection file {}: {source}", .path.display())]
	Corrupt { path: PathBuf, source: serde_json::Error },

	#[error("failed to serialize records: {0}")]
	Serialize(#[from] serde_json::Error),
}

impl StoreError {
	fn io(path: &Path, source: io::Error) -> Self {
		StoreError::Io { path: path.to_path_buf(), source }
	}
}

/// Read one collection file.
///
/// `Ok(None)` when the file does not exist. A file that exists but is not a
/// JSON array of objects is `StoreError::Corrupt`, never "absent".
pub fn read(path: &Path) -> Result<Option<Vec<Record>>, StoreError> {
	let text = match fs::read_to_string(path) {
		Ok(text) => text,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(StoreError::io(path, e)),
	};

	let body = text.strip_prefix(UTF8_BOM).unwrap_or(&text);
	let records = serde_json::from_str(body).map_err(|source| StoreError::Corrupt {
		path: path.to_path_buf(),
		source,
	})?;

	Ok(Some(records))
}

/// Like [`read`], with an absent file reading as an empty collection.
pub fn read_or_default(path: &Path) -> Result<Vec<Record>, StoreError> {
	Ok(read(path)?.unwrap_or_default())
}

/// Replace a collection file with `records`, pretty-printed.
///
/// Writes a temp file in the same directory and renames it over the target,
/// so readers see either the old or the new contents.
pub fn write(path: &Path, records: &[Record]) -> Result<(), StoreError> {
	let json = serde_json::to_vec_pretty(records)?;
	write_atomic(path, &json)
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
	let dir = match path.parent() {
		Some(p) if !p.as_os_str().is_empty() => p,
		_ => Path::new("."),
	};
	fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

	let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
	tmp.write_all(data).map_err(|e| StoreError::io(tmp.path(), e))?;
	tmp.as_file().sync_all().map_err(|e| StoreError::io(path, e))?;
	tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn records(value: serde_json::Value) -> Vec<Record> {
		serde_json::from_value(value).unwrap()
	}

	#[test]
	fn write_then_read_preserves_order() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("products.json");
		let data = records(json!([
			{"id": "3", "name": "Brake pad"},
			{"id": "1", "name": "Oil filter", "price": 12.5},
			{"id": "2", "tags": ["ecu", "bosch"]}
		]));

		write(&path, &data).unwrap();
		assert_eq!(read(&path).unwrap(), Some(data));
	}

	#[test]
	fn missing_file_is_none() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("orders.json");

		assert_eq!(read(&path).unwrap(), None);
		assert!(read_or_default(&path).unwrap().is_empty());
	}

	#[test]
	fn bom_is_ignored() {
		let tmp = tempfile::tempdir().unwrap();
		let plain = tmp.path().join("plain.json");
		let bom = tmp.path().join("bom.json");
		fs::write(&plain, r#"[{"id":"p1"}]"#).unwrap();
		fs::write(&bom, "\u{feff}[{\"id\":\"p1\"}]").unwrap();

		let expected = read(&plain).unwrap();
		assert!(expected.is_some());
		assert_eq!(read(&bom).unwrap(), expected);
	}

	#[test]
	fn corrupt_file_is_not_absent() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("categories.json");
		fs::write(&path, "[{\"id\": \"c1\",").unwrap();

		assert!(matches!(read(&path), Err(StoreError::Corrupt { .. })));
		assert!(matches!(read_or_default(&path), Err(StoreError::Corrupt { .. })));
	}

	#[test]
	fn non_array_document_is_corrupt() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("products.json");
		fs::write(&path, r#"{"id":"p1"}"#).unwrap();
		assert!(matches!(read(&path), Err(StoreError::Corrupt { .. })));

		fs::write(&path, r#"["p1", "p2"]"#).unwrap();
		assert!(matches!(read(&path), Err(StoreError::Corrupt { .. })));
	}

	#[test]
	fn write_creates_parent_and_leaves_no_temp_files() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("nested/data");
		let path = dir.join("blog-posts.json");

		write(&path, &[]).unwrap();
		write(&path, &records(json!([{"id": "b1"}]))).unwrap();

		let names: Vec<_> = fs::read_dir(&dir)
			.unwrap()
			.map(|e| e.unwrap().file_name().to_string_lossy().to_string())
			.collect();
		assert_eq!(names, vec!["blog-posts.json".to_string()]);
		assert_eq!(read(&path).unwrap().unwrap().len(), 1);
	}

	#[test]
	fn output_is_pretty_printed() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("orders.json");
		write(&path, &records(json!([{"id": "1"}]))).unwrap();

		let text = fs::read_to_string(&path).unwrap();
		assert!(text.contains("\n  {\n    \"id\": \"1\"\n  }\n"));
	}
}
