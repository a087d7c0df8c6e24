//! Persistence layer for the parts storefront: JSON record collections on
//! disk, timestamped snapshot backups, restore, and startup bootstrap.

pub mod config;
pub mod db;
pub mod engine;
pub mod models;

pub use config::{ConfigError, StoreConfig};
pub use db::StoreHandle;
pub use models::{collection::Collection, manifest::BackupManifest, Record};
