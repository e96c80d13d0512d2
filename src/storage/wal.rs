pub mod manager;
pub mod record;

pub use manager::LogFile;
pub use record::LogRecord;
