//! Error types shared across the storage core.

use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use thiserror::Error;

/// Errors surfaced by the storage core.
#[derive(Error, Debug)]
pub enum DbError {
    /// The deadlock detector elected this transaction as the cycle victim.
    /// Its dirty pages have been rolled back and its locks released before
    /// this error surfaces; the caller must stop using the transaction.
    #[error("transaction {0} aborted by deadlock detection")]
    TransactionAborted(TransactionId),

    #[error("all pages dirty: no clean victim available for eviction")]
    AllPagesDirty,

    #[error("invalid page: table {table_id} page {page_no} is out of range")]
    InvalidPage { table_id: u32, page_no: u32 },

    #[error("replacer does not track page {0}")]
    ReplacerUntracked(PageId),

    #[error("page {0} has no empty slot")]
    PageFull(PageId),

    #[error("slot {slot} of page {pid} is empty")]
    SlotEmpty { pid: PageId, slot: u16 },

    #[error("slot {slot} of page {pid} is already occupied")]
    SlotOccupied { pid: PageId, slot: u16 },

    #[error("tuple does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("no table with id {0}")]
    NoSuchTable(u32),

    #[error("tuple has no record id")]
    MissingRecordId,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log serialization error: {0}")]
    Log(#[from] bincode::Error),
}

/// Result type for storage-core operations.
pub type DbResult<T> = Result<T, DbError>;
