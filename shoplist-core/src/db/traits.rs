//! Database abstraction traits
//!
//! This module defines the core trait that all storage backends must implement.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{Item, ItemChanges, ListChanges, ShoppingList, ShoppingStore};

/// Types of database backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// YAML file storage (single file)
    Yaml,
    /// SQLite database storage
    Sqlite,
    /// Process-local, nothing written to disk
    Memory,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Yaml => write!(f, "YAML"),
            BackendType::Sqlite => write!(f, "SQLite"),
            BackendType::Memory => write!(f, "Memory"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(BackendType::Yaml),
            "sqlite" | "db" => Ok(BackendType::Sqlite),
            "memory" | "mem" => Ok(BackendType::Memory),
            other => Err(format!(
                "Unknown backend '{}' (expected yaml, sqlite or memory)",
                other
            )),
        }
    }
}

impl BackendType {
    /// Infers the backend from a file path
    pub fn from_path(path: &Path) -> Self {
        if path.as_os_str() == super::MEMORY_PATH {
            return BackendType::Memory;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => BackendType::Yaml,
            Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
            _ => BackendType::Yaml,
        }
    }
}

/// Configuration for database backends
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database file
    pub path: PathBuf,
    /// Backend type
    pub backend_type: BackendType,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lists.yaml"),
            backend_type: BackendType::Yaml,
        }
    }
}

/// Core trait for database backends
///
/// `load()` and `save()` work with the full `ShoppingStore`. The record-level
/// operations default to load/modify/save through `update_atomically`;
/// backends with a real query engine override them.
///
/// Every mutating method either commits completely or leaves the stored
/// state untouched.
pub trait DatabaseBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the path to the database file
    fn path(&self) -> &Path;

    // =========================================================================
    // Full Store Operations
    // =========================================================================

    /// Loads the entire store
    fn load(&self) -> Result<ShoppingStore>;

    /// Replaces the entire store
    fn save(&self, store: &ShoppingStore) -> Result<()>;

    /// Loads, applies `update_fn` and saves. Nothing is saved if
    /// `update_fn` returns an error.
    fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut ShoppingStore) -> Result<()>,
    ) -> Result<ShoppingStore> {
        let mut store = self.load()?;
        update_fn(&mut store)?;
        store.validate()?;
        self.save(&store)?;
        Ok(store)
    }

    // =========================================================================
    // List Operations
    // =========================================================================

    /// Gets a list by id
    fn get_list(&self, id: &Uuid) -> Result<Option<ShoppingList>> {
        Ok(self.load()?.get_list(id).cloned())
    }

    /// All lists in store order
    fn list_lists(&self) -> Result<Vec<ShoppingList>> {
        Ok(self.load()?.lists().to_vec())
    }

    /// Adds a new list
    fn add_list(&self, list: ShoppingList) -> Result<ShoppingList> {
        let mut pending = Some(list.clone());
        self.update_atomically(&mut |store| {
            if let Some(list) = pending.take() {
                store.insert_list(list);
            }
            Ok(())
        })?;
        Ok(list)
    }

    /// Applies `changes` to an existing list and returns the updated list
    fn update_list(&self, id: &Uuid, changes: &ListChanges) -> Result<ShoppingList> {
        let mut updated = None;
        self.update_atomically(&mut |store| {
            let list = store
                .get_list_mut(id)
                .ok_or_else(|| StoreError::list_not_found(*id))?;
            list.apply(changes);
            updated = Some(list.clone());
            Ok(())
        })?;
        updated.ok_or_else(|| StoreError::list_not_found(*id))
    }

    /// Deletes a list and every item it owns.
    /// Returns the number of items removed with it.
    fn delete_list(&self, id: &Uuid) -> Result<usize> {
        let mut removed = 0;
        self.update_atomically(&mut |store| {
            let (_, items) = store.remove_list(id)?;
            removed = items.len();
            Ok(())
        })?;
        Ok(removed)
    }

    // =========================================================================
    // Item Operations
    // =========================================================================

    /// Gets an item by id
    fn get_item(&self, id: &Uuid) -> Result<Option<Item>> {
        Ok(self.load()?.get_item(id).cloned())
    }

    /// Items owned by a list, in insertion order.
    /// Fails with `NotFound` if the list does not exist.
    fn list_items(&self, list_id: &Uuid) -> Result<Vec<Item>> {
        let store = self.load()?;
        let items = store
            .items_of(list_id)
            .ok_or_else(|| StoreError::list_not_found(*list_id))?;
        Ok(items.into_iter().cloned().collect())
    }

    /// Adds an item to its owning list
    fn add_item(&self, item: Item) -> Result<Item> {
        let mut pending = Some(item.clone());
        self.update_atomically(&mut |store| match pending.take() {
            Some(item) => store.insert_item(item),
            None => Ok(()),
        })?;
        Ok(item)
    }

    /// Applies `changes` to an existing item and returns the updated item
    fn update_item(&self, id: &Uuid, changes: &ItemChanges) -> Result<Item> {
        let mut updated = None;
        self.update_atomically(&mut |store| {
            let item = store
                .get_item_mut(id)
                .ok_or_else(|| StoreError::item_not_found(*id))?;
            item.apply(changes);
            updated = Some(item.clone());
            Ok(())
        })?;
        updated.ok_or_else(|| StoreError::item_not_found(*id))
    }

    /// Flips `done` on an item in a single atomic update and returns the
    /// updated item
    fn toggle_item(&self, id: &Uuid) -> Result<Item> {
        let mut updated = None;
        self.update_atomically(&mut |store| {
            let item = store
                .get_item_mut(id)
                .ok_or_else(|| StoreError::item_not_found(*id))?;
            item.done = !item.done;
            updated = Some(item.clone());
            Ok(())
        })?;
        updated.ok_or_else(|| StoreError::item_not_found(*id))
    }

    /// Deletes an item and detaches it from its list
    fn delete_item(&self, id: &Uuid) -> Result<()> {
        self.update_atomically(&mut |store| store.remove_item(id).map(|_| ()))?;
        Ok(())
    }

    // =========================================================================
    // Utility Operations
    // =========================================================================

    /// Returns true if the database file exists
    fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Creates the database with an empty store if it doesn't exist
    fn create_if_not_exists(&self) -> Result<()> {
        if !self.exists() {
            self.save(&ShoppingStore::new())?;
        }
        Ok(())
    }

    /// Returns statistics about the database
    fn stats(&self) -> Result<DatabaseStats> {
        let store = self.load()?;
        Ok(DatabaseStats {
            list_count: store.lists().len(),
            item_count: store.items().len(),
            done_count: store.items().iter().filter(|i| i.done).count(),
            backend_type: self.backend_type(),
        })
    }
}

/// Statistics about a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub list_count: usize,
    pub item_count: usize,
    pub done_count: usize,
    pub backend_type: BackendType,
}
