//! Storage layer: pages, the buffer pool, and the write-ahead log.
//!
//! - **Page**: fixed-size byte block, the unit of I/O, with dirty state and
//!   a before-image for logging
//! - **BufferPool**: bounded in-memory cache mediating every page access,
//!   coordinating locks, replacement, and logging
//! - **LruReplacer**: orders cached pages for eviction
//! - **LogFile**: append-only write-ahead log with force-on-commit

pub mod buffer;
pub mod page;
pub mod wal;

pub use buffer::{BufferPool, PageHandle};
pub use page::{Page, PageId};
pub use wal::LogFile;
