//! Write-ahead log record types.

use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use serde::{Deserialize, Serialize};

/// A single log record.
///
/// `Update` carries both page images so a write can be undone (before) or
/// redone (after). It is appended, and the log forced, before the page
/// itself reaches disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    Update {
        tid: TransactionId,
        pid: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    Commit {
        tid: TransactionId,
    },
    Abort {
        tid: TransactionId,
    },
}

impl LogRecord {
    /// The transaction this record belongs to.
    pub fn tid(&self) -> TransactionId {
        match self {
            LogRecord::Update { tid, .. }
            | LogRecord::Commit { tid }
            | LogRecord::Abort { tid } => *tid,
        }
    }
}
