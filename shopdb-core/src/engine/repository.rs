//! Per-collection CRUD used by the HTTP handlers.
//!
//! Every operation holds the collection's in-process lock across its
//! read-modify-write cycle, so concurrent handlers cannot drop each other's
//! writes. Other processes writing the same files are not coordinated.

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::{
	db::StoreHandle,
	engine::record_store::{self, StoreError},
	models::{collection::Collection, Record},
};

#[derive(Debug, Error)]
pub enum RepoError {
	#[error("{collection} already contains a record with id {id}")]
	DuplicateId { collection: Collection, id: String },

	#[error("{collection} has no record with id {id}")]
	NotFound { collection: Collection, id: String },

	#[error("record id must be a non-empty string")]
	InvalidId,

	#[error("{collection} has no free numeric id left")]
	NoFreeId { collection: Collection },

	#[error(transparent)]
	Store(#[from] StoreError),
}

pub fn record_id(record: &Record) -> Option<&str> {
	record.get("id").and_then(Value::as_str)
}

/// All records in insertion order. A missing collection file reads as empty.
pub fn list(db: &StoreHandle, collection: Collection) -> Result<Vec<Record>, RepoError> {
	let _guard = db.lock(collection);
	Ok(record_store::read_or_default(&db.collection_path(collection))?)
}

pub fn get(db: &StoreHandle, collection: Collection, id: &str) -> Result<Option<Record>, RepoError> {
	let records = list(db, collection)?;
	Ok(records.into_iter().find(|r| record_id(r) == Some(id)))
}

/// Append a record. A missing or null `id` is assigned; an `id` already in
/// the collection is rejected.
pub fn create(db: &StoreHandle, collection: Collection, mut record: Record) -> Result<Record, RepoError> {
	let _guard = db.lock(collection);
	let path = db.collection_path(collection);
	let mut records = record_store::read_or_default(&path)?;

	let id = match record.get("id") {
		None | Some(Value::Null) => {
			let id = next_id(&records).ok_or(RepoError::NoFreeId { collection })?;
			record.insert("id".to_string(), Value::String(id.clone()));
			id
		}
		Some(Value::String(s)) if !s.is_empty() => s.clone(),
		Some(_) => return Err(RepoError::InvalidId),
	};

	if records.iter().any(|r| record_id(r) == Some(id.as_str())) {
		return Err(RepoError::DuplicateId { collection, id });
	}

	records.push(record.clone());
	record_store::write(&path, &records)?;
	info!(%collection, id = %id, "record created");
	Ok(record)
}

/// Shallow-merge `patch` into the record with `id`. The id itself cannot change.
pub fn update(db: &StoreHandle, collection: Collection, id: &str, patch: Record) -> Result<Record, RepoError> {
	let _guard = db.lock(collection);
	let path = db.collection_path(collection);
	let mut records = record_store::read_or_default(&path)?;

	let pos = position(&records, collection, id)?;
	let target = &mut records[pos];
	for (key, value) in patch {
		if key == "id" {
			continue;
		}
		target.insert(key, value);
	}
	let updated = target.clone();

	record_store::write(&path, &records)?;
	info!(%collection, id = %id, "record updated");
	Ok(updated)
}

/// Remove the record with `id` and return it.
pub fn delete(db: &StoreHandle, collection: Collection, id: &str) -> Result<Record, RepoError> {
	let _guard = db.lock(collection);
	let path = db.collection_path(collection);
	let mut records = record_store::read_or_default(&path)?;

	let pos = position(&records, collection, id)?;
	let removed = records.remove(pos);

	record_store::write(&path, &records)?;
	info!(%collection, id = %id, "record deleted");
	Ok(removed)
}

fn position(records: &[Record], collection: Collection, id: &str) -> Result<usize, RepoError> {
	records
		.iter()
		.position(|r| record_id(r) == Some(id))
		.ok_or_else(|| RepoError::NotFound { collection, id: id.to_string() })
}

/// Next id: one past the last record's numeric id, else count + 1, skipping
/// any id already taken. `None` only when every candidate id is in use.
pub fn next_id(records: &[Record]) -> Option<String> {
	let fallback = (records.len() as u64).saturating_add(1);
	let start = records
		.last()
		.and_then(record_id)
		.and_then(|id| id.parse::<u64>().ok())
		.and_then(|n| n.checked_add(1))
		.unwrap_or(fallback);

	// At most `records.len()` candidates can be taken, so this ends quickly.
	(start..=u64::MAX)
		.chain(1..start)
		.map(|n| n.to_string())
		.find(|id| !records.iter().any(|r| record_id(r) == Some(id.as_str())))
}
