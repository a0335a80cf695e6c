pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use schema::{Column, TableName};
pub use sqlite::SqliteStore;
pub use traits::*;
