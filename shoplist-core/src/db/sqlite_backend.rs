//! SQLite database storage backend
//!
//! This backend stores lists and items in a SQLite database file. Items
//! reference their list with a cascading foreign key, and every mutation
//! runs inside a single transaction.

use anyhow::anyhow;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::traits::{BackendType, DatabaseBackend, DatabaseStats};
use crate::error::{Result, StoreError};
use crate::models::{
    Item, ItemChanges, ListChanges, ShoppingList, ShoppingStore, SNAPSHOT_VERSION,
};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

const LIST_COLUMNS: &str = "id, title, created_at";
const ITEM_COLUMNS: &str = "id, list_id, label, sub_label, annotation, done";

/// SQLite backend implementation
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) a SQLite database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;

        // WAL for better concurrent access; foreign keys drive the cascade
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let backend = Self {
            path,
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        log::debug!("Opened SQLite database at {:?}", backend.path);
        Ok(backend)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned").into())
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let mut conn = self.lock()?;
        // One transaction, so a failed setup never leaves a version row without tables
        let tx = conn.transaction()?;

        let has_version_table: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )?;

        let current_version: i32 = if has_version_table {
            tx.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0)
        } else {
            0
        };

        if current_version == 0 {
            tx.execute_batch(include_str!("schema.sql"))?;
        } else if current_version != SCHEMA_VERSION {
            return Err(StoreError::Corrupt(format!(
                "Database schema version {} is not supported, expected {}",
                current_version, SCHEMA_VERSION
            )));
        }

        tx.commit()?;
        Ok(())
    }

    fn parse_uuid(s: &str) -> Result<Uuid> {
        Uuid::parse_str(s).map_err(|e| StoreError::Corrupt(format!("invalid id '{}': {}", s, e)))
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{}': {}", s, e)))
    }

    fn read_list_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }

    fn build_list((id, title, created_at): (String, String, String)) -> Result<ShoppingList> {
        Ok(ShoppingList {
            id: Self::parse_uuid(&id)?,
            title,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    #[allow(clippy::type_complexity)]
    fn read_item_row(
        row: &Row<'_>,
    ) -> rusqlite::Result<(String, String, String, String, String, bool)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn build_item(
        (id, list_id, label, sub_label, annotation, done): (
            String,
            String,
            String,
            String,
            String,
            bool,
        ),
    ) -> Result<Item> {
        Ok(Item {
            id: Self::parse_uuid(&id)?,
            list_id: Self::parse_uuid(&list_id)?,
            label,
            sub_label,
            annotation,
            done,
        })
    }

    /// Load lists from database, in insertion order
    fn load_lists(conn: &Connection) -> Result<Vec<ShoppingList>> {
        let mut stmt = conn.prepare(&format!("SELECT {} FROM lists ORDER BY seq", LIST_COLUMNS))?;
        let rows = stmt.query_map([], Self::read_list_row)?;

        let mut lists = Vec::new();
        for row in rows {
            lists.push(Self::build_list(row?)?);
        }
        Ok(lists)
    }

    /// Load items from database, optionally restricted to one list
    fn load_items(conn: &Connection, list_id: Option<&Uuid>) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        match list_id {
            Some(list_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM items WHERE list_id = ?1 ORDER BY seq",
                    ITEM_COLUMNS
                ))?;
                let rows = stmt.query_map([list_id.to_string()], Self::read_item_row)?;
                for row in rows {
                    items.push(Self::build_item(row?)?);
                }
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM items ORDER BY seq", ITEM_COLUMNS))?;
                let rows = stmt.query_map([], Self::read_item_row)?;
                for row in rows {
                    items.push(Self::build_item(row?)?);
                }
            }
        }
        Ok(items)
    }

    fn load_store(conn: &Connection) -> Result<ShoppingStore> {
        let lists = Self::load_lists(conn)?;
        let items = Self::load_items(conn, None)?;
        let store = ShoppingStore::from_parts(SNAPSHOT_VERSION, lists, items);
        store.validate()?;
        Ok(store)
    }

    fn find_list(conn: &Connection, id: &Uuid) -> Result<Option<ShoppingList>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM lists WHERE id = ?1", LIST_COLUMNS),
                [id.to_string()],
                Self::read_list_row,
            )
            .optional()?;
        row.map(Self::build_list).transpose()
    }

    fn find_item(conn: &Connection, id: &Uuid) -> Result<Option<Item>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                [id.to_string()],
                Self::read_item_row,
            )
            .optional()?;
        row.map(Self::build_item).transpose()
    }

    fn insert_list(conn: &Connection, list: &ShoppingList) -> Result<()> {
        conn.execute(
            "INSERT INTO lists (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![
                list.id.to_string(),
                list.title,
                Self::format_timestamp(&list.created_at)
            ],
        )?;
        Ok(())
    }

    fn insert_item(conn: &Connection, item: &Item) -> Result<()> {
        conn.execute(
            "INSERT INTO items (id, list_id, label, sub_label, annotation, done)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id.to_string(),
                item.list_id.to_string(),
                item.label,
                item.sub_label,
                item.annotation,
                item.done
            ],
        )?;
        Ok(())
    }

    /// Replaces every row with the contents of `store`
    fn replace_all(conn: &Connection, store: &ShoppingStore) -> Result<()> {
        conn.execute("DELETE FROM items", [])?;
        conn.execute("DELETE FROM lists", [])?;
        for list in store.lists() {
            Self::insert_list(conn, list)?;
        }
        for item in store.items() {
            Self::insert_item(conn, item)?;
        }
        Ok(())
    }
}

impl DatabaseBackend for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<ShoppingStore> {
        let conn = self.lock()?;
        Self::load_store(&conn)
    }

    fn save(&self, store: &ShoppingStore) -> Result<()> {
        store.validate()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::replace_all(&tx, store)?;
        tx.commit()?;
        Ok(())
    }

    fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut ShoppingStore) -> Result<()>,
    ) -> Result<ShoppingStore> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut store = Self::load_store(&tx)?;
        update_fn(&mut store)?;
        store.validate()?;
        Self::replace_all(&tx, &store)?;

        tx.commit()?;
        Ok(store)
    }

    // Override for more efficient single-record operations

    fn get_list(&self, id: &Uuid) -> Result<Option<ShoppingList>> {
        let conn = self.lock()?;
        Self::find_list(&conn, id)
    }

    fn list_lists(&self) -> Result<Vec<ShoppingList>> {
        let conn = self.lock()?;
        Self::load_lists(&conn)
    }

    fn add_list(&self, list: ShoppingList) -> Result<ShoppingList> {
        let conn = self.lock()?;
        Self::insert_list(&conn, &list)?;
        Ok(list)
    }

    fn update_list(&self, id: &Uuid, changes: &ListChanges) -> Result<ShoppingList> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut list = Self::find_list(&tx, id)?.ok_or_else(|| StoreError::list_not_found(*id))?;
        list.apply(changes);
        tx.execute(
            "UPDATE lists SET title = ?1 WHERE id = ?2",
            params![list.title, id.to_string()],
        )?;

        tx.commit()?;
        Ok(list)
    }

    fn delete_list(&self, id: &Uuid) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if Self::find_list(&tx, id)?.is_none() {
            return Err(StoreError::list_not_found(*id));
        }
        // Explicit delete so the count is known; the foreign key would cascade anyway
        let removed = tx.execute("DELETE FROM items WHERE list_id = ?1", [id.to_string()])?;
        tx.execute("DELETE FROM lists WHERE id = ?1", [id.to_string()])?;

        tx.commit()?;
        Ok(removed)
    }

    fn get_item(&self, id: &Uuid) -> Result<Option<Item>> {
        let conn = self.lock()?;
        Self::find_item(&conn, id)
    }

    fn list_items(&self, list_id: &Uuid) -> Result<Vec<Item>> {
        let conn = self.lock()?;
        if Self::find_list(&conn, list_id)?.is_none() {
            return Err(StoreError::list_not_found(*list_id));
        }
        Self::load_items(&conn, Some(list_id))
    }

    fn add_item(&self, item: Item) -> Result<Item> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if Self::find_list(&tx, &item.list_id)?.is_none() {
            return Err(StoreError::list_not_found(item.list_id));
        }
        Self::insert_item(&tx, &item)?;

        tx.commit()?;
        Ok(item)
    }

    fn update_item(&self, id: &Uuid, changes: &ItemChanges) -> Result<Item> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut item = Self::find_item(&tx, id)?.ok_or_else(|| StoreError::item_not_found(*id))?;
        item.apply(changes);
        tx.execute(
            "UPDATE items SET label = ?1, sub_label = ?2, annotation = ?3, done = ?4 WHERE id = ?5",
            params![
                item.label,
                item.sub_label,
                item.annotation,
                item.done,
                id.to_string()
            ],
        )?;

        tx.commit()?;
        Ok(item)
    }

    fn toggle_item(&self, id: &Uuid) -> Result<Item> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut item = Self::find_item(&tx, id)?.ok_or_else(|| StoreError::item_not_found(*id))?;
        item.done = !item.done;
        tx.execute(
            "UPDATE items SET done = ?1 WHERE id = ?2",
            params![item.done, id.to_string()],
        )?;

        tx.commit()?;
        Ok(item)
    }

    fn delete_item(&self, id: &Uuid) -> Result<()> {
        let conn = self.lock()?;
        let rows_affected = conn.execute("DELETE FROM items WHERE id = ?1", [id.to_string()])?;
        if rows_affected == 0 {
            return Err(StoreError::item_not_found(*id));
        }
        Ok(())
    }

    fn stats(&self) -> Result<DatabaseStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(DatabaseStats {
            list_count: count("SELECT COUNT(*) FROM lists")?,
            item_count: count("SELECT COUNT(*) FROM items")?,
            done_count: count("SELECT COUNT(*) FROM items WHERE done = 1")?,
            backend_type: BackendType::Sqlite,
        })
    }
}
