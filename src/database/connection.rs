use r2d2_sqlite::SqliteConnectionManager;

use crate::errors::StoreError;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

pub fn create_pool(database_path: &str) -> Result<DbPool, StoreError> {
    let manager = build_manager(database_path);
    build_pool(manager, None)
}

/// Single connection pool over a private in-memory database.
/// Every connection to `:memory:` is a separate database, hence the size cap.
pub fn create_memory_pool() -> Result<DbPool, StoreError> {
    build_pool(SqliteConnectionManager::memory(), Some(1))
}

fn build_manager(path: &str) -> SqliteConnectionManager {
    SqliteConnectionManager::file(path)
}

fn build_pool(manager: SqliteConnectionManager, max_size: Option<u32>) -> Result<DbPool, StoreError> {
    let mut builder = r2d2::Pool::builder();
    if let Some(size) = max_size {
        builder = builder.max_size(size);
    }
    Ok(builder.build(manager)?)
}

pub fn get_connection(pool: &DbPool) -> Result<DbConn, StoreError> {
    Ok(pool.get()?)
}
