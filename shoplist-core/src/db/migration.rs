//! Migration utilities for converting between storage backends
//!
//! This module provides functions to migrate data between YAML and SQLite backends,
//! as well as import/export to JSON format for backup and interoperability.

use anyhow::Context;
use std::path::Path;

use super::traits::DatabaseBackend;
use super::{SqliteBackend, YamlBackend};
use crate::error::Result;
use crate::models::ShoppingStore;

/// Migrates data from a YAML file to a SQLite database
///
/// # Returns
/// The number of lists migrated
pub fn migrate_yaml_to_sqlite<P1: AsRef<Path>, P2: AsRef<Path>>(
    yaml_path: P1,
    sqlite_path: P2,
) -> Result<usize> {
    // Load first so a bad source never leaves an empty database behind
    let store = load_source(&YamlBackend::new(yaml_path))?;
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;
    save_dest(&store, &sqlite_backend)
}

/// Migrates data from a SQLite database to a YAML file
///
/// # Returns
/// The number of lists migrated
pub fn migrate_sqlite_to_yaml<P1: AsRef<Path>, P2: AsRef<Path>>(
    sqlite_path: P1,
    yaml_path: P2,
) -> Result<usize> {
    let store = load_source(&SqliteBackend::new(sqlite_path)?)?;
    save_dest(&store, &YamlBackend::new(yaml_path))
}

/// Copies the full contents of `source` into `dest`, replacing whatever
/// `dest` held. Returns the number of lists copied.
pub fn copy_between(source: &dyn DatabaseBackend, dest: &dyn DatabaseBackend) -> Result<usize> {
    let store = load_source(source)?;
    save_dest(&store, dest)
}

fn load_source(source: &dyn DatabaseBackend) -> Result<ShoppingStore> {
    let store = source.load().map_err(|e| {
        e.context(format!(
            "Failed to load {} database {:?}",
            source.backend_type(),
            source.path()
        ))
    })?;
    log::debug!(
        "Loaded {} lists and {} items from {:?}",
        store.lists().len(),
        store.items().len(),
        source.path()
    );
    Ok(store)
}

fn save_dest(store: &ShoppingStore, dest: &dyn DatabaseBackend) -> Result<usize> {
    dest.save(store).map_err(|e| {
        e.context(format!(
            "Failed to save to {} database {:?}",
            dest.backend_type(),
            dest.path()
        ))
    })?;
    log::info!(
        "Migrated {} lists and {} items to {:?}",
        store.lists().len(),
        store.items().len(),
        dest.path()
    );
    Ok(store.lists().len())
}

/// Exports a ShoppingStore to a JSON file
pub fn export_to_json<P: AsRef<Path>>(store: &ShoppingStore, json_path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(store).context("Failed to serialize to JSON")?;

    std::fs::write(&json_path, json)
        .with_context(|| format!("Failed to write JSON file {:?}", json_path.as_ref()))?;

    Ok(())
}

/// Imports a ShoppingStore from a JSON file.
/// The result is validated like any other load.
pub fn import_from_json<P: AsRef<Path>>(json_path: P) -> Result<ShoppingStore> {
    let json = std::fs::read_to_string(&json_path)
        .with_context(|| format!("Failed to read JSON file {:?}", json_path.as_ref()))?;

    let store: ShoppingStore = serde_json::from_str(&json).context("Failed to parse JSON")?;
    store.validate()?;

    Ok(store)
}

/// Exports data from any backend to a JSON file
pub fn export_backend_to_json<P: AsRef<Path>>(
    backend: &dyn DatabaseBackend,
    json_path: P,
) -> Result<()> {
    let store = backend.load()?;
    export_to_json(&store, json_path)
}

/// Imports data from a JSON file into any backend, replacing its contents
pub fn import_json_to_backend<P: AsRef<Path>>(
    json_path: P,
    backend: &dyn DatabaseBackend,
) -> Result<()> {
    let store = import_from_json(json_path)?;
    backend.save(&store)
}
