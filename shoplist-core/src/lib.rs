pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod ordering;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::{default_database_path, get_config_path, Config};
pub use db::{BackendType, DatabaseBackend, DatabaseConfig, DatabaseStats};
pub use error::{RecordKind, Result, StoreError};
pub use models::{Item, ItemChanges, ListChanges, OwnerIndex, ShoppingList, ShoppingStore};
pub use ordering::{order_items, order_lists};
pub use storage::Storage;
pub use store::{ShoppingListStore, StoreOptions};
