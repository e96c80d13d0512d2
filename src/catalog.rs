//! Table catalog: maps table ids to their heap files.

use crate::access::heap::HeapFile;
use crate::error::{DbError, DbResult};
use dashmap::DashMap;
use std::sync::Arc;

/// Process-wide registry of tables, owned by the `Database` and shared with
/// the buffer pool. Reads are concurrent; registration is serialized by the
/// underlying map shards.
pub struct Catalog {
    files: DashMap<u32, Arc<HeapFile>>,
    names: DashMap<String, u32>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            names: DashMap::new(),
        }
    }

    /// Registers a heap file under `name` and returns its table id.
    /// Re-registering the same backing file yields the same id, so catalog
    /// reloads recover table identity.
    pub fn add_table(&self, name: &str, file: Arc<HeapFile>) -> u32 {
        let table_id = file.table_id();
        self.files.insert(table_id, file);
        self.names.insert(name.to_string(), table_id);
        table_id
    }

    pub fn file(&self, table_id: u32) -> DbResult<Arc<HeapFile>> {
        self.files
            .get(&table_id)
            .map(|entry| entry.value().clone())
            .ok_or(DbError::NoSuchTable(table_id))
    }

    pub fn table_id(&self, name: &str) -> Option<u32> {
        self.names.get(name).map(|entry| *entry.value())
    }

    pub fn tables(&self) -> Vec<(String, u32)> {
        self.names
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
