use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// A named shopping list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShoppingList {
    pub id: Uuid,
    pub title: String,
    /// Creation time, used only for default ordering
    pub created_at: DateTime<Utc>,
}

impl ShoppingList {
    /// Creates a new list with a fresh id
    pub fn new(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            created_at,
        }
    }

    /// Applies a change set in place
    pub fn apply(&mut self, changes: &ListChanges) {
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
    }
}

/// A single entry on a shopping list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    /// Owning list
    pub list_id: Uuid,
    pub label: String,
    pub sub_label: String,
    pub annotation: String,
    #[serde(default)]
    pub done: bool,
}

impl Item {
    /// Creates a new, not-done item attached to `list_id`
    pub fn new(
        list_id: Uuid,
        label: impl Into<String>,
        sub_label: impl Into<String>,
        annotation: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            list_id,
            label: label.into(),
            sub_label: sub_label.into(),
            annotation: annotation.into(),
            done: false,
        }
    }

    /// Applies a change set in place
    pub fn apply(&mut self, changes: &ItemChanges) {
        if let Some(label) = &changes.label {
            self.label = label.clone();
        }
        if let Some(sub_label) = &changes.sub_label {
            self.sub_label = sub_label.clone();
        }
        if let Some(annotation) = &changes.annotation {
            self.annotation = annotation.clone();
        }
        if let Some(done) = changes.done {
            self.done = done;
        }
    }
}

/// Field changes for a list. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListChanges {
    pub title: Option<String>,
}

impl ListChanges {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
    }
}

/// Field changes for an item. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChanges {
    pub label: Option<String>,
    pub sub_label: Option<String>,
    pub annotation: Option<String>,
    pub done: Option<bool>,
}

impl ItemChanges {
    pub fn done(done: bool) -> Self {
        Self {
            done: Some(done),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.sub_label.is_none()
            && self.annotation.is_none()
            && self.done.is_none()
    }
}

/// Maps each list id to the ids of the items it owns, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerIndex {
    owners: HashMap<Uuid, Vec<Uuid>>,
}

impl OwnerIndex {
    /// Builds the index from lists and items in store order.
    /// Items whose owner is not among `lists` are left out.
    pub fn build(lists: &[ShoppingList], items: &[Item]) -> Self {
        let mut owners: HashMap<Uuid, Vec<Uuid>> =
            lists.iter().map(|l| (l.id, Vec::new())).collect();
        for item in items {
            if let Some(ids) = owners.get_mut(&item.list_id) {
                ids.push(item.id);
            }
        }
        Self { owners }
    }

    pub fn contains_list(&self, list_id: &Uuid) -> bool {
        self.owners.contains_key(list_id)
    }

    /// Item ids owned by a list, or None for an unknown list
    pub fn items_of(&self, list_id: &Uuid) -> Option<&[Uuid]> {
        self.owners.get(list_id).map(|ids| ids.as_slice())
    }

    fn add_list(&mut self, list_id: Uuid) {
        self.owners.entry(list_id).or_default();
    }

    fn attach(&mut self, list_id: Uuid, item_id: Uuid) {
        self.owners.entry(list_id).or_default().push(item_id);
    }

    fn detach(&mut self, list_id: &Uuid, item_id: &Uuid) {
        if let Some(ids) = self.owners.get_mut(list_id) {
            ids.retain(|id| id != item_id);
        }
    }

    fn remove_list(&mut self, list_id: &Uuid) -> Vec<Uuid> {
        self.owners.remove(list_id).unwrap_or_default()
    }
}

/// Serialized form of a store
#[derive(Debug, Deserialize)]
struct StoreSnapshot {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    lists: Vec<ShoppingList>,
    #[serde(default)]
    items: Vec<Item>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl From<StoreSnapshot> for ShoppingStore {
    fn from(snapshot: StoreSnapshot) -> Self {
        ShoppingStore::from_parts(snapshot.version, snapshot.lists, snapshot.items)
    }
}

/// The complete persisted state: all lists and items plus the owner index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoreSnapshot")]
pub struct ShoppingStore {
    version: u32,
    lists: Vec<ShoppingList>,
    items: Vec<Item>,
    #[serde(skip_serializing)]
    index: OwnerIndex,
}

impl Default for ShoppingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ShoppingStore {
    fn eq(&self, other: &Self) -> bool {
        self.lists == other.lists && self.items == other.items
    }
}

impl ShoppingStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            lists: Vec::new(),
            items: Vec::new(),
            index: OwnerIndex::default(),
        }
    }

    /// Assembles a store from raw records, rebuilding the owner index.
    /// Call [`ShoppingStore::validate`] before trusting the result.
    pub fn from_parts(version: u32, lists: Vec<ShoppingList>, items: Vec<Item>) -> Self {
        let index = OwnerIndex::build(&lists, &items);
        Self {
            version,
            lists,
            items,
            index,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// All lists in store order
    pub fn lists(&self) -> &[ShoppingList] {
        &self.lists
    }

    /// All items in store order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn index(&self) -> &OwnerIndex {
        &self.index
    }

    pub fn get_list(&self, id: &Uuid) -> Option<&ShoppingList> {
        self.lists.iter().find(|l| &l.id == id)
    }

    pub fn get_list_mut(&mut self, id: &Uuid) -> Option<&mut ShoppingList> {
        self.lists.iter_mut().find(|l| &l.id == id)
    }

    pub fn get_item(&self, id: &Uuid) -> Option<&Item> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn get_item_mut(&mut self, id: &Uuid) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| &i.id == id)
    }

    /// Items owned by a list in insertion order, or None for an unknown list
    pub fn items_of(&self, list_id: &Uuid) -> Option<Vec<&Item>> {
        let ids = self.index.items_of(list_id)?;
        Some(ids.iter().filter_map(|id| self.get_item(id)).collect())
    }

    /// Adds a list
    pub fn insert_list(&mut self, list: ShoppingList) {
        self.index.add_list(list.id);
        self.lists.push(list);
    }

    /// Adds an item to its owning list
    pub fn insert_item(&mut self, item: Item) -> Result<()> {
        if !self.index.contains_list(&item.list_id) {
            return Err(StoreError::list_not_found(item.list_id));
        }
        self.index.attach(item.list_id, item.id);
        self.items.push(item);
        Ok(())
    }

    /// Removes an item and detaches it from its owner
    pub fn remove_item(&mut self, id: &Uuid) -> Result<Item> {
        let pos = self
            .items
            .iter()
            .position(|i| &i.id == id)
            .ok_or_else(|| StoreError::item_not_found(*id))?;
        let item = self.items.remove(pos);
        self.index.detach(&item.list_id, &item.id);
        Ok(item)
    }

    /// Removes a list together with every item it owns
    pub fn remove_list(&mut self, id: &Uuid) -> Result<(ShoppingList, Vec<Item>)> {
        let pos = self
            .lists
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| StoreError::list_not_found(*id))?;
        let list = self.lists.remove(pos);
        let owned: HashSet<Uuid> = self.index.remove_list(id).into_iter().collect();
        let (removed, kept): (Vec<Item>, Vec<Item>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|i| owned.contains(&i.id));
        self.items = kept;
        Ok((list, removed))
    }

    /// Checks the ownership invariants: unique ids and no orphan items
    pub fn validate(&self) -> Result<()> {
        if self.version > SNAPSHOT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "snapshot version {} is newer than supported version {}",
                self.version, SNAPSHOT_VERSION
            )));
        }

        let mut seen = HashSet::new();
        for list in &self.lists {
            if !seen.insert(list.id) {
                return Err(StoreError::Corrupt(format!("duplicate list id {}", list.id)));
            }
        }

        let mut seen_items = HashSet::new();
        for item in &self.items {
            if !seen_items.insert(item.id) {
                return Err(StoreError::Corrupt(format!("duplicate item id {}", item.id)));
            }
            if !seen.contains(&item.list_id) {
                return Err(StoreError::Corrupt(format!(
                    "item {} references missing list {}",
                    item.id, item.list_id
                )));
            }
        }
        Ok(())
    }
}
