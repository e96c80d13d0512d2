pub mod heap;
pub mod scan;
pub mod tuple;
pub mod value;

pub use heap::HeapFile;
pub use scan::HeapScan;
pub use tuple::{RecordId, Tuple, TupleDesc};
pub use value::{Field, FieldType};
