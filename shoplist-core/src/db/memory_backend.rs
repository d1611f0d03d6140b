//! In-memory backend
//!
//! Keeps the whole store behind a mutex. Nothing touches the disk, so
//! this is used for tests and throwaway sessions.

use anyhow::anyhow;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::traits::{BackendType, DatabaseBackend};
use super::MEMORY_PATH;
use crate::error::Result;
use crate::models::ShoppingStore;

/// In-memory backend implementation
#[derive(Default)]
pub struct MemoryBackend {
    store: Mutex<ShoppingStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with `store`
    pub fn with_store(store: ShoppingStore) -> Result<Self> {
        store.validate()?;
        Ok(Self {
            store: Mutex::new(store),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ShoppingStore>> {
        self.store
            .lock()
            .map_err(|_| anyhow!("In-memory store lock poisoned").into())
    }
}

impl DatabaseBackend for MemoryBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn path(&self) -> &Path {
        Path::new(MEMORY_PATH)
    }

    fn load(&self) -> Result<ShoppingStore> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, store: &ShoppingStore) -> Result<()> {
        store.validate()?;
        *self.lock()? = store.clone();
        Ok(())
    }

    /// Works on a copy and swaps it in only on success
    fn update_atomically(
        &self,
        update_fn: &mut dyn FnMut(&mut ShoppingStore) -> Result<()>,
    ) -> Result<ShoppingStore> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        update_fn(&mut working)?;
        working.validate()?;
        *guard = working.clone();
        Ok(working)
    }

    fn exists(&self) -> bool {
        true
    }
}
