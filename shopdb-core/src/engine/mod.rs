pub mod backup;
pub mod bootstrap;
pub mod copier;
pub mod record_store;
pub mod repository;
pub mod restore;
