//! The shopping list store
//!
//! `ShoppingListStore` is the single entry point collaborators use. It owns
//! one backend for its whole lifetime, enforces the optional text policy and
//! maps the ownership contract onto backend calls. Every mutating method
//! returns only after the backend has committed.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{self, BackendType, DatabaseBackend, DatabaseConfig, DatabaseStats, MemoryBackend};
use crate::error::{Result, StoreError};
use crate::models::{Item, ItemChanges, ListChanges, ShoppingList};

/// Store-level policy switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Reject list titles and item labels that are blank after trimming
    pub require_text: bool,
}

/// Typed repository over a storage backend
pub struct ShoppingListStore {
    backend: Box<dyn DatabaseBackend>,
    options: StoreOptions,
}

impl ShoppingListStore {
    /// Wraps an already-open backend
    pub fn new(backend: Box<dyn DatabaseBackend>, options: StoreOptions) -> Self {
        Self { backend, options }
    }

    /// Opens the database described by `config`, creating it if needed
    pub fn open(config: &DatabaseConfig, options: StoreOptions) -> Result<Self> {
        let backend = db::open(config)?;
        log::info!(
            "Opened {} shopping list store at {:?}",
            backend.backend_type(),
            backend.path()
        );
        Ok(Self::new(backend, options))
    }

    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()), StoreOptions::default())
    }

    pub fn backend(&self) -> &dyn DatabaseBackend {
        self.backend.as_ref()
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Releases the backend
    pub fn close(self) {
        log::debug!("Closing store at {:?}", self.backend.path());
    }

    fn check_text(&self, field: &'static str, value: &str) -> Result<()> {
        if self.options.require_text && value.trim().is_empty() {
            return Err(StoreError::Validation {
                field,
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Lists
    // =========================================================================

    pub fn create_list(&self, title: &str, created_at: DateTime<Utc>) -> Result<ShoppingList> {
        self.check_text("title", title)?;
        let list = self.backend.add_list(ShoppingList::new(title, created_at))?;
        log::debug!("Created list {} '{}'", list.id, list.title);
        Ok(list)
    }

    /// Every stored list, in store order
    pub fn list_all(&self) -> Result<Vec<ShoppingList>> {
        self.backend.list_lists()
    }

    pub fn get_list(&self, id: &Uuid) -> Result<ShoppingList> {
        self.backend
            .get_list(id)?
            .ok_or_else(|| StoreError::list_not_found(*id))
    }

    pub fn update_list(&self, id: &Uuid, changes: &ListChanges) -> Result<()> {
        if let Some(title) = &changes.title {
            self.check_text("title", title)?;
        }
        self.backend.update_list(id, changes)?;
        log::debug!("Updated list {}", id);
        Ok(())
    }

    /// Deletes a list and, in the same commit, every item it owns
    pub fn delete_list(&self, id: &Uuid) -> Result<()> {
        let removed = self.backend.delete_list(id)?;
        log::debug!("Deleted list {} with {} items", id, removed);
        Ok(())
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub fn create_item(
        &self,
        list_id: &Uuid,
        label: &str,
        sub_label: &str,
        annotation: &str,
    ) -> Result<Item> {
        self.check_text("label", label)?;
        let item = self
            .backend
            .add_item(Item::new(*list_id, label, sub_label, annotation))?;
        log::debug!("Created item {} '{}' in list {}", item.id, item.label, list_id);
        Ok(item)
    }

    /// Items owned by `list_id` in store order. An unknown list is `NotFound`.
    pub fn list_items(&self, list_id: &Uuid) -> Result<Vec<Item>> {
        self.backend.list_items(list_id)
    }

    pub fn get_item(&self, id: &Uuid) -> Result<Item> {
        self.backend
            .get_item(id)?
            .ok_or_else(|| StoreError::item_not_found(*id))
    }

    pub fn update_item(&self, id: &Uuid, changes: &ItemChanges) -> Result<()> {
        if let Some(label) = &changes.label {
            self.check_text("label", label)?;
        }
        self.backend.update_item(id, changes)?;
        log::debug!("Updated item {}", id);
        Ok(())
    }

    pub fn delete_item(&self, id: &Uuid) -> Result<()> {
        self.backend.delete_item(id)?;
        log::debug!("Deleted item {}", id);
        Ok(())
    }

    /// Flips `done` and returns the new value
    pub fn toggle_done(&self, id: &Uuid) -> Result<bool> {
        let item = self.backend.toggle_item(id)?;
        log::debug!("Item {} done = {}", id, item.done);
        Ok(item.done)
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        self.backend.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SqliteBackend, YamlBackend};
    use crate::ordering::{order_items, order_lists};
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use tempfile::TempDir;

    /// One store per backend kind; the TempDir keeps file backends alive
    fn all_stores() -> Vec<(TempDir, ShoppingListStore)> {
        let mut stores = Vec::new();

        let dir = TempDir::new().unwrap();
        stores.push((dir, ShoppingListStore::in_memory()));

        let dir = TempDir::new().unwrap();
        let yaml = YamlBackend::new(dir.path().join("lists.yaml"));
        stores.push((dir, ShoppingListStore::new(Box::new(yaml), StoreOptions::default())));

        let dir = TempDir::new().unwrap();
        let sqlite = SqliteBackend::new(dir.path().join("lists.db")).unwrap();
        stores.push((dir, ShoppingListStore::new(Box::new(sqlite), StoreOptions::default())));

        stores
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 1, 12, 18, 30, 0).unwrap()
    }

    #[test]
    fn test_groceries_scenario() {
        for (_dir, store) in all_stores() {
            let list = store.create_list("Groceries", t0()).unwrap();
            assert_eq!(list.title, "Groceries");
            assert_eq!(list.created_at, t0());

            let milk = store.create_item(&list.id, "Milk", "", "").unwrap();
            let eggs = store.create_item(&list.id, "Eggs", "", "").unwrap();
            assert!(!milk.done && !eggs.done);

            let items = store.list_items(&list.id).unwrap();
            assert_eq!(items, vec![milk.clone(), eggs.clone()]);

            assert!(store.toggle_done(&milk.id).unwrap());
            let milk = store.get_item(&milk.id).unwrap();
            assert!(milk.done);

            let ordered = order_items(&[milk.clone(), eggs.clone()]);
            assert_eq!(ordered, vec![eggs, milk]);
        }
    }

    #[test]
    fn test_lists_ordered_newest_first() {
        for (_dir, store) in all_stores() {
            let l1 = store.create_list("L1", t0()).unwrap();
            let l2 = store.create_list("L2", t0() + Duration::days(1)).unwrap();

            let all = store.list_all().unwrap();
            assert_eq!(all.len(), 2);
            assert_eq!(order_lists(&all), vec![l2, l1]);
        }
    }

    #[test]
    fn test_created_items_match_listing() {
        for (_dir, store) in all_stores() {
            let list = store.create_list("Hardware", t0()).unwrap();
            let other = store.create_list("Other", t0()).unwrap();
            store.create_item(&other.id, "Glue", "", "").unwrap();

            let created: HashSet<Uuid> = ["Nails", "Screws", "Tape", "Hinges"]
                .iter()
                .map(|label| store.create_item(&list.id, label, "", "").unwrap().id)
                .collect();

            let listed = store.list_items(&list.id).unwrap();
            assert!(listed.iter().all(|i| !i.done && i.list_id == list.id));
            let listed: HashSet<Uuid> = listed.iter().map(|i| i.id).collect();
            assert_eq!(listed, created);
        }
    }

    #[test]
    fn test_toggle_done_twice_restores_state() {
        for (_dir, store) in all_stores() {
            let list = store.create_list("Groceries", t0()).unwrap();
            let item = store.create_item(&list.id, "Bread", "", "").unwrap();

            assert!(store.toggle_done(&item.id).unwrap());
            assert!(!store.toggle_done(&item.id).unwrap());
            assert_eq!(store.get_item(&item.id).unwrap(), item);
        }
    }

    #[test]
    fn test_delete_list_cascades_to_items() {
        for (_dir, store) in all_stores() {
            let list = store.create_list("L1", t0()).unwrap();
            let ids: Vec<Uuid> = ["a", "b", "c"]
                .iter()
                .map(|label| store.create_item(&list.id, label, "", "").unwrap().id)
                .collect();

            store.delete_list(&list.id).unwrap();

            assert!(store.list_items(&list.id).unwrap_err().is_not_found());
            for id in &ids {
                assert!(store.get_item(id).unwrap_err().is_not_found());
                let err = store
                    .update_item(id, &ItemChanges::done(true))
                    .unwrap_err();
                assert!(err.is_not_found());
            }
            assert_eq!(store.stats().unwrap().item_count, 0);
            assert!(store.delete_list(&list.id).unwrap_err().is_not_found());
        }
    }

    #[test]
    fn test_delete_empty_list() {
        for (_dir, store) in all_stores() {
            let list = store.create_list("Empty", t0()).unwrap();
            store.delete_list(&list.id).unwrap();
            assert!(store.list_all().unwrap().is_empty());
        }
    }

    #[test]
    fn test_update_unknown_item_leaves_state_unchanged() {
        for (_dir, store) in all_stores() {
            let list = store.create_list("Groceries", t0()).unwrap();
            store.create_item(&list.id, "Milk", "", "").unwrap();
            let before = store.backend().load().unwrap();

            let err = store
                .update_item(&Uuid::new_v4(), &ItemChanges::done(true))
                .unwrap_err();
            assert!(matches!(
                err,
                StoreError::NotFound {
                    kind: crate::error::RecordKind::Item,
                    ..
                }
            ));
            assert_eq!(store.backend().load().unwrap(), before);
        }
    }

    #[test]
    fn test_update_fields() {
        for (_dir, store) in all_stores() {
            let list = store.create_list("Groceries", t0()).unwrap();
            let item = store.create_item(&list.id, "Milk", "", "").unwrap();

            store
                .update_list(&list.id, &ListChanges::title("Weekly shop"))
                .unwrap();
            store
                .update_item(
                    &item.id,
                    &ItemChanges {
                        sub_label: Some("1 gallon".to_string()),
                        annotation: Some("whole".to_string()),
                        ..Default::default()
                    },
                )
                .unwrap();

            let list_after = store.get_list(&list.id).unwrap();
            assert_eq!(list_after.title, "Weekly shop");
            assert_eq!(list_after.created_at, list.created_at);

            let item = store.get_item(&item.id).unwrap();
            assert_eq!(item.label, "Milk");
            assert_eq!(item.sub_label, "1 gallon");
            assert_eq!(item.annotation, "whole");
            assert!(!item.done);
        }
    }

    #[test]
    fn test_missing_list_is_not_found() {
        for (_dir, store) in all_stores() {
            let unknown = Uuid::new_v4();
            assert!(store.get_list(&unknown).unwrap_err().is_not_found());
            assert!(store
                .update_list(&unknown, &ListChanges::title("x"))
                .unwrap_err()
                .is_not_found());
            assert!(store
                .create_item(&unknown, "Milk", "", "")
                .unwrap_err()
                .is_not_found());
            assert!(store.toggle_done(&unknown).unwrap_err().is_not_found());
            assert!(store.delete_item(&unknown).unwrap_err().is_not_found());
        }
    }

    #[test]
    fn test_delete_item_detaches_from_list() {
        for (_dir, store) in all_stores() {
            let list = store.create_list("Groceries", t0()).unwrap();
            let milk = store.create_item(&list.id, "Milk", "", "").unwrap();
            let eggs = store.create_item(&list.id, "Eggs", "", "").unwrap();

            store.delete_item(&milk.id).unwrap();
            assert_eq!(store.list_items(&list.id).unwrap(), vec![eggs]);
        }
    }

    #[test]
    fn test_empty_text_accepted_by_default() {
        let store = ShoppingListStore::in_memory();
        let list = store.create_list("", t0()).unwrap();
        store.create_item(&list.id, "  ", "", "").unwrap();
    }

    #[test]
    fn test_require_text_rejects_blank_fields() {
        let store = ShoppingListStore::new(
            Box::new(MemoryBackend::new()),
            StoreOptions { require_text: true },
        );
        let err = store.create_list("   ", t0()).unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "title", .. }));

        let list = store.create_list("Groceries", t0()).unwrap();
        let err = store.create_item(&list.id, "", "", "").unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "label", .. }));

        let item = store.create_item(&list.id, "Milk", "", "").unwrap();
        let changes = ItemChanges {
            label: Some(String::new()),
            ..Default::default()
        };
        assert!(store.update_item(&item.id, &changes).is_err());
        assert_eq!(store.get_item(&item.id).unwrap().label, "Milk");
        assert!(store.list_all().unwrap().len() == 1);
    }

    #[test]
    fn test_open_from_config() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("lists.yaml"),
            backend_type: BackendType::Yaml,
        };
        let store = ShoppingListStore::open(&config, StoreOptions::default()).unwrap();
        let list = store.create_list("Groceries", t0()).unwrap();
        store.close();

        let reopened = ShoppingListStore::open(&config, StoreOptions::default()).unwrap();
        assert_eq!(reopened.get_list(&list.id).unwrap(), list);
        assert_eq!(reopened.backend_type(), BackendType::Yaml);
    }
}
