pub mod connection;
pub mod documents;
pub mod setup;

pub use connection::{create_memory_pool, create_pool, get_connection, DbConn, DbPool};
pub use documents::SqliteStore;
