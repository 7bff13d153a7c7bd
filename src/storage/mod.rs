pub mod sqlite;
pub mod trait_def;

pub use sqlite::SqliteVisitorStore;
pub use trait_def::{StorageError, StorageResult, VisitorStore};
