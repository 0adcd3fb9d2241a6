use anyhow::Result;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;

use super::connection::{self, DbPool};
use super::setup;
use crate::domain::EntityId;
use crate::errors::StoreError;
use crate::store::{Document, Kind, Store};

/// Document store over a single SQLite table
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn open(database_path: &str) -> Result<Self, StoreError> {
        Ok(Self::new(connection::create_pool(database_path)?))
    }

    /// Fresh private database with the schema applied
    pub fn in_memory() -> Result<Self> {
        let store = Self::new(connection::create_memory_pool()?);
        store.reset()?;
        Ok(store)
    }

    pub fn reset(&self) -> Result<()> {
        let mut conn = connection::get_connection(&self.pool)?;
        setup::reset_database(&mut conn)
    }
}

impl Store for SqliteStore {
    fn allocate_id(&self, kind: Kind) -> Result<EntityId, StoreError> {
        let mut conn = connection::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let highest_stored: EntityId = tx.query_row(
            "SELECT COALESCE(MAX(id), 0) FROM documents WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        let sequence: EntityId = tx
            .query_row(
                "SELECT next_id FROM id_sequences WHERE kind = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        let next_id = sequence.max(highest_stored) + 1;
        tx.execute(
            "INSERT INTO id_sequences (kind, next_id) VALUES (?1, ?2) ON CONFLICT(kind) DO UPDATE SET next_id = excluded.next_id",
            params![kind.as_str(), next_id],
        )?;
        tx.commit()?;

        Ok(next_id)
    }

    fn get(&self, kind: Kind, id: EntityId) -> Result<Option<Document>, StoreError> {
        let conn = connection::get_connection(&self.pool)?;
        read_document(&conn, kind, id)
    }

    fn put(&self, kind: Kind, document: &Document) -> Result<u64, StoreError> {
        let mut conn = connection::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let version = write_document(&tx, kind, document)?;
        tx.commit()?;
        Ok(version)
    }

    fn get_multi(&self, kind: Kind, ids: &[EntityId]) -> Result<Vec<Option<Document>>, StoreError> {
        let conn = connection::get_connection(&self.pool)?;
        ids.iter().map(|&id| read_document(&conn, kind, id)).collect()
    }

    fn put_multi(&self, kind: Kind, documents: &[Document]) -> Result<Vec<u64>, StoreError> {
        let mut conn = connection::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let versions = documents
            .iter()
            .map(|document| write_document(&tx, kind, document))
            .collect::<Result<Vec<_>, _>>()?;
        // dropping the transaction on error rolls every write back
        tx.commit()?;
        Ok(versions)
    }

    fn query(&self, kind: Kind, field: &str, value: &Value) -> Result<Vec<Document>, StoreError> {
        let path = json_path(field)?;
        let sql_value = to_sql_value(field, value)?;
        let sql = "SELECT id, version, body FROM documents WHERE kind = ?1 AND json_extract(body, ?2) = ?3 ORDER BY id";

        let conn = connection::get_connection(&self.pool)?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![kind.as_str(), path, sql_value], parse_document_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(into_document).collect()
    }
}

type RawDocument = (EntityId, i64, String);

fn parse_document_row(row: &rusqlite::Row) -> rusqlite::Result<RawDocument> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_document((id, version, body): RawDocument) -> Result<Document, StoreError> {
    Ok(Document {
        id,
        version: version as u64,
        body: serde_json::from_str(&body)?,
    })
}

fn read_document(conn: &Connection, kind: Kind, id: EntityId) -> Result<Option<Document>, StoreError> {
    let sql = "SELECT id, version, body FROM documents WHERE kind = ?1 AND id = ?2";

    conn.query_row(sql, params![kind.as_str(), id], parse_document_row)
        .optional()?
        .map(into_document)
        .transpose()
}

fn write_document(conn: &Connection, kind: Kind, document: &Document) -> Result<u64, StoreError> {
    let body = serde_json::to_string(&document.body)?;
    let version = document.version + 1;

    let changed = if document.version == 0 {
        conn.execute(
            "INSERT OR IGNORE INTO documents (kind, id, version, body) VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), document.id, version as i64, body],
        )?
    } else {
        conn.execute(
            "UPDATE documents SET version = ?3, body = ?4, updated_at = CURRENT_TIMESTAMP WHERE kind = ?1 AND id = ?2 AND version = ?5",
            params![kind.as_str(), document.id, version as i64, body, document.version as i64],
        )?
    };

    if changed == 0 {
        return Err(StoreError::Conflict {
            kind,
            id: document.id,
        });
    }
    Ok(version)
}

fn json_path(field: &str) -> Result<String, StoreError> {
    let valid = !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::UnsupportedQuery {
            field: field.to_string(),
        });
    }
    Ok(format!("$.{field}"))
}

fn to_sql_value(field: &str, value: &Value) -> Result<SqlValue, StoreError> {
    let unsupported = || StoreError::UnsupportedQuery {
        field: field.to_string(),
    };

    match value {
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .ok_or_else(unsupported),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(unsupported()),
    }
}
