use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the manifest written into every snapshot directory.
pub const MANIFEST_FILE: &str = "backup-info.json";

/// `backup-info.json`: what a snapshot actually contains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub timestamp: DateTime<Utc>,
    /// File names that were copied and verified.
    pub files: Vec<String>,
    /// Files that existed in the live store but failed to copy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedFile>,
    /// blake3 hex digest per copied file.
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
    /// Snapshot count at creation time, this one included.
    pub total_backups: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}
