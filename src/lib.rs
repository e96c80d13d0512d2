//! A transactional storage core: heap files, a locking buffer pool, and a
//! write-ahead log.
//!
//! The engine stores fixed-schema tuples in heap files and mediates every
//! page access through a bounded buffer pool. Transactions follow strict
//! two-phase locking at page granularity with deadlock detection; commits
//! are durable through a force-on-commit write-ahead log.
//!
//! ```no_run
//! use pagedb::access::tuple::{Tuple, TupleDesc};
//! use pagedb::access::value::{Field, FieldType};
//! use pagedb::{Database, DbConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let db = Database::new(DbConfig::new("data"))?;
//! let table_id = db.create_table("users", TupleDesc::new(vec![FieldType::Int, FieldType::Int]))?;
//!
//! let tid = db.begin();
//! let desc = db.catalog().file(table_id)?.desc().clone();
//! db.buffer_pool()
//!     .insert_tuple(tid, table_id, Tuple::new(desc, vec![Field::Int(1), Field::Int(10)])?)?;
//! db.commit(tid)?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod catalog;
pub mod concurrency;
pub mod config;
pub mod database;
pub mod error;
pub mod storage;
pub mod transaction;

pub use access::{Field, FieldType, HeapFile, HeapScan, RecordId, Tuple, TupleDesc};
pub use catalog::Catalog;
pub use concurrency::{LockAttempt, LockManager, Permissions};
pub use config::{DbConfig, DEFAULT_PAGE_SIZE, DEFAULT_POOL_PAGES};
pub use database::Database;
pub use error::{DbError, DbResult};
pub use storage::{BufferPool, LogFile, Page, PageHandle, PageId};
pub use transaction::{TransactionId, TransactionIdGenerator};
