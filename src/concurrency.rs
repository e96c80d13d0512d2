pub mod lock;

pub use lock::{LockAttempt, LockManager, Permissions};
