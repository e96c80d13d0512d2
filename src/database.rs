//! The top-level engine handle.
//!
//! A `Database` is a plain value owning its catalog, write-ahead log, and
//! buffer pool; two instances over different data directories are fully
//! independent, and dropping the value drops the engine.

use crate::access::heap::HeapFile;
use crate::access::tuple::TupleDesc;
use crate::catalog::Catalog;
use crate::config::DbConfig;
use crate::error::DbResult;
use crate::storage::buffer::BufferPool;
use crate::storage::wal::LogFile;
use crate::transaction::{TransactionId, TransactionIdGenerator};
use std::fs;
use std::sync::Arc;

const LOG_FILE_NAME: &str = "wal.log";

pub struct Database {
    config: DbConfig,
    catalog: Arc<Catalog>,
    log: Arc<LogFile>,
    buffer_pool: Arc<BufferPool>,
    txn_ids: TransactionIdGenerator,
}

impl Database {
    /// Opens an engine over `config.data_dir`, creating the directory and
    /// the write-ahead log if absent.
    pub fn new(config: DbConfig) -> anyhow::Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let log = Arc::new(LogFile::open(config.data_dir.join(LOG_FILE_NAME))?);
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(
            catalog.clone(),
            log.clone(),
            config.num_pages,
        ));
        Ok(Self {
            config,
            catalog,
            log,
            buffer_pool,
            txn_ids: TransactionIdGenerator::new(),
        })
    }

    /// Creates (or reopens) the table `name` with the given schema and
    /// registers it in the catalog. The heap file lives at
    /// `data_dir/<name>.tbl`.
    pub fn create_table(&self, name: &str, desc: TupleDesc) -> DbResult<u32> {
        let path = self.config.data_dir.join(format!("{name}.tbl"));
        let file = Arc::new(HeapFile::open(
            path,
            Arc::new(desc),
            self.config.page_size,
        )?);
        Ok(self.catalog.add_table(name, file))
    }

    /// Starts a transaction. Transactions carry no state beyond their id;
    /// locks and dirty pages accrue in the buffer pool as pages are
    /// requested.
    pub fn begin(&self) -> TransactionId {
        self.txn_ids.next()
    }

    /// Commits `tid`: flushes its dirty pages through the log, appends the
    /// commit record, and releases its locks.
    pub fn commit(&self, tid: TransactionId) -> DbResult<()> {
        self.buffer_pool.transaction_complete(tid, true)
    }

    /// Aborts `tid`: discards its dirty pages, appends the abort record,
    /// and releases its locks.
    pub fn abort(&self, tid: TransactionId) -> DbResult<()> {
        self.buffer_pool.transaction_complete(tid, false)
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn log(&self) -> &Arc<LogFile> {
        &self.log
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }
}
