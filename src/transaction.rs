pub mod id;

pub use id::{TransactionId, TransactionIdGenerator};
