//! Append-only log file with force-on-commit semantics.

use crate::error::DbResult;
use crate::storage::page::PageId;
use crate::storage::wal::record::LogRecord;
use crate::transaction::TransactionId;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The write-ahead log. Records are length-prefixed `bincode` frames
/// appended under a single mutex; `force` fsyncs everything appended so
/// far. The log is a process-wide singleton owned by the `Database`.
pub struct LogFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogFile {
    /// Opens the log at `path`, creating it if absent. Appends go to the
    /// end of any existing content.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        file.seek(SeekFrom::End(0))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn append(&self, record: &LogRecord) -> DbResult<()> {
        let payload = bincode::serialize(record)?;
        let mut file = self.file.lock();
        file.write_u32::<BigEndian>(payload.len() as u32)?;
        file.write_all(&payload)?;
        Ok(())
    }

    /// Appends an update record with before- and after-images. Not forced;
    /// the caller forces before the page write lands.
    pub fn log_update(
        &self,
        tid: TransactionId,
        pid: PageId,
        before: &[u8],
        after: &[u8],
    ) -> DbResult<()> {
        self.append(&LogRecord::Update {
            tid,
            pid,
            before: before.to_vec(),
            after: after.to_vec(),
        })
    }

    /// Appends a commit record and forces the log.
    pub fn log_commit(&self, tid: TransactionId) -> DbResult<()> {
        self.append(&LogRecord::Commit { tid })?;
        self.force()
    }

    /// Appends an abort record and forces the log.
    pub fn log_abort(&self, tid: TransactionId) -> DbResult<()> {
        self.append(&LogRecord::Abort { tid })?;
        self.force()
    }

    /// Flushes and fsyncs everything appended so far.
    pub fn force(&self) -> DbResult<()> {
        let mut file = self.file.lock();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Reads every record from the start of the log, in append order.
    /// Used by tests and recovery.
    pub fn records(&self) -> DbResult<Vec<LogRecord>> {
        let _guard = self.file.lock();
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut out = Vec::new();
        loop {
            let len = match reader.read_u32::<BigEndian>() {
                Ok(len) => len as usize,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload)?;
            out.push(bincode::deserialize(&payload)?);
        }
        Ok(out)
    }
}
