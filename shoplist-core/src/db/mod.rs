//! Database abstraction layer for shopping lists
//!
//! This module provides a trait-based abstraction for storage backends,
//! allowing the store to use different databases (YAML files, SQLite, memory)
//! while maintaining a consistent interface.

mod memory_backend;
mod migration;
mod sqlite_backend;
mod traits;
mod yaml_backend;

pub use memory_backend::MemoryBackend;
pub use migration::{
    copy_between, export_backend_to_json, export_to_json, import_from_json,
    import_json_to_backend, migrate_sqlite_to_yaml, migrate_yaml_to_sqlite,
};
pub use sqlite_backend::SqliteBackend;
pub use traits::{BackendType, DatabaseBackend, DatabaseConfig, DatabaseStats};
pub use yaml_backend::YamlBackend;

use std::path::Path;

use crate::error::Result;

/// Path that selects the in-memory backend
pub const MEMORY_PATH: &str = ":memory:";

/// Creates a database backend based on the file extension or explicit type
pub fn create_backend(
    path: &Path,
    backend_type: Option<BackendType>,
) -> Result<Box<dyn DatabaseBackend>> {
    let bt = backend_type.unwrap_or_else(|| BackendType::from_path(path));
    log::debug!("Using {} backend for {:?}", bt, path);

    match bt {
        BackendType::Yaml => Ok(Box::new(YamlBackend::new(path))),
        BackendType::Sqlite => Ok(Box::new(SqliteBackend::new(path)?)),
        BackendType::Memory => Ok(Box::new(MemoryBackend::new())),
    }
}

/// Opens a backend from a config, creating the database if needed
pub fn open(config: &DatabaseConfig) -> Result<Box<dyn DatabaseBackend>> {
    let backend = create_backend(&config.path, Some(config.backend_type))?;
    backend.create_if_not_exists()?;
    Ok(backend)
}
