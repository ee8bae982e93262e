mod postgres;
mod sqlite;
mod trait_def;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{RedirectBundle, Storage, StorageError, StorageResult};
