use anyhow::{bail, Context, Result};
use rusqlite::Connection;

use super::connection::DbConn;

/// Recreates the document tables. Every document is lost.
pub fn reset_database(conn: &mut DbConn) -> Result<()> {
    ensure_json_support(conn)?;

    let schema_sql = include_str!("schema.sql");
    let statements = split_sql_statements(schema_sql);

    for (idx, statement) in statements.iter().enumerate() {
        execute_sql(conn, statement)
            .with_context(|| format!("Failed to execute statement {}", idx + 1))?;
    }

    log::info!("Document store schema reset ({} statements)", statements.len());
    Ok(())
}

/// Queries on document fields go through `json_extract`, which needs JSON1
pub fn ensure_json_support(conn: &Connection) -> Result<()> {
    let extracted: Option<i64> = conn
        .query_row("SELECT json_extract('{\"id\": 1}', '$.id')", [], |row| row.get(0))
        .context("SQLite build lacks the JSON1 functions")?;
    if extracted != Some(1) {
        bail!("json_extract returned {:?} instead of 1", extracted);
    }
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn execute_sql(conn: &mut DbConn, sql: &str) -> Result<()> {
    conn.execute(sql, [])
        .context("Failed to execute SQL statement")
        .map(|_| ())
}
