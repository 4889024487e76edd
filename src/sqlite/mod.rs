// SQLite backend
//
// - params: conversion from RowValues to rusqlite values
// - query: result extraction and execution

pub mod params;
pub mod query;

use std::sync::Arc;

use rusqlite::Connection;

use crate::backend::Backend;
use crate::config::{ConnectOptions, DEFAULT_STATEMENT_CACHE_CAPACITY};
use crate::error::SqlSessionError;
use crate::results::QueryOutcome;
use crate::types::{BackendKind, RowValues};

pub use params::{Params as SqliteParams, row_value_to_sqlite_value};
pub use query::build_result_set;

/// Prepared handle: the SQL text of a statement compiled into the connection's statement cache.
#[derive(Debug, Clone)]
pub struct SqliteStatement {
    sql: Arc<str>,
}

impl SqliteStatement {
    /// Key of the statement in the connection's cache.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// A single rusqlite connection.
pub struct SqliteBackend {
    conn: Connection,
    /// Set once an insert has changed a row on this connection.
    inserted: bool,
    discarded: usize,
}

impl SqliteBackend {
    /// Open `database` (a path or `:memory:`).
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ConnectionError` if the database cannot be opened.
    pub fn open(database: &str) -> Result<Self, SqlSessionError> {
        let conn = Connection::open(database).map_err(|e| {
            SqlSessionError::ConnectionError(format!("failed to open {database}: {e}"))
        })?;
        conn.set_prepared_statement_cache_capacity(DEFAULT_STATEMENT_CACHE_CAPACITY);
        tracing::debug!(database, "sqlite connection opened");
        Ok(Self {
            conn,
            inserted: false,
            discarded: 0,
        })
    }

    /// Run a batch of `;`-separated statements with no bind values, e.g. schema setup.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::QueryError` if any statement fails.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), SqlSessionError> {
        self.conn.execute_batch(sql)?;
        if sql.split(';').any(is_insert) {
            self.inserted = true;
        }
        Ok(())
    }

    /// The underlying rusqlite connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// How many compiled statements `finalize` has dropped from the connection's cache.
    #[must_use]
    pub fn discarded_statements(&self) -> usize {
        self.discarded
    }

    fn note_insert(&mut self, sql: &str) {
        if is_insert(sql) && self.conn.changes() > 0 {
            self.inserted = true;
        }
    }
}

/// Whether `sql` starts with `INSERT` or `REPLACE`.
fn is_insert(sql: &str) -> bool {
    let head = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    head.eq_ignore_ascii_case("insert") || head.eq_ignore_ascii_case("replace")
}

impl Backend for SqliteBackend {
    type Statement = SqliteStatement;

    fn connect(options: &ConnectOptions) -> Result<Self, SqlSessionError> {
        if options.database.is_empty() {
            return Err(SqlSessionError::ConnectionError(
                "sqlite needs a database path or :memory:".into(),
            ));
        }
        Self::open(&options.database)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn supports_native_binding(&self) -> bool {
        true
    }

    fn execute_raw(&mut self, sql: &str) -> Result<QueryOutcome, SqlSessionError> {
        let outcome = {
            let mut stmt = self.conn.prepare(sql)?;
            query::run_statement(&mut stmt, &[])?
        };
        self.note_insert(sql);
        Ok(outcome)
    }

    fn prepare(&mut self, sql: &str) -> Result<SqliteStatement, SqlSessionError> {
        self.conn.prepare_cached(sql)?;
        Ok(SqliteStatement { sql: Arc::from(sql) })
    }

    fn execute_prepared(
        &mut self,
        statement: &SqliteStatement,
        values: &[RowValues],
    ) -> Result<QueryOutcome, SqlSessionError> {
        let params = params::Params::convert(values);
        let outcome = {
            let mut stmt = self.conn.prepare_cached(&statement.sql)?;
            query::run_statement(&mut stmt, params.as_values())?
        };
        self.note_insert(&statement.sql);
        Ok(outcome)
    }

    fn returns_rows(&mut self, sql: &str) -> Result<bool, SqlSessionError> {
        Ok(self.conn.prepare_cached(sql)?.column_count() > 0)
    }

    fn finalize(&mut self, statement: SqliteStatement) {
        if let Ok(stmt) = self.conn.prepare_cached(&statement.sql) {
            stmt.discard();
            self.discarded += 1;
            tracing::trace!(sql = %statement.sql, "sqlite statement discarded");
        }
    }

    fn set_statement_cache_capacity(&mut self, capacity: usize) {
        self.conn.set_prepared_statement_cache_capacity(capacity);
    }

    fn last_insert_id(&mut self) -> Result<Option<i64>, SqlSessionError> {
        Ok(self.inserted.then(|| self.conn.last_insert_rowid()))
    }

    fn close(self) -> Result<(), SqlSessionError> {
        self.conn
            .close()
            .map_err(|(_, e)| SqlSessionError::ConnectionError(format!("failed to close: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        let mut db = SqliteBackend::open(":memory:").unwrap();
        db.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO users (id, name) VALUES (1, 'John'), (2, 'Jane');",
        )
        .unwrap();
        db
    }

    #[test]
    fn prepared_select_returns_rows() {
        let mut db = backend();
        let stmt = db.prepare("SELECT id, name FROM users WHERE id > ?").unwrap();
        let out = db.execute_prepared(&stmt, &[RowValues::Int(1)]).unwrap();
        let rows = out.into_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.results[0].get("name"), Some(&RowValues::from("Jane")));
    }

    #[test]
    fn dml_reports_affected_and_last_id() {
        let mut db = backend();
        let out = db.execute_raw("INSERT INTO users (name) VALUES ('Joe')").unwrap();
        assert_eq!(out.affected(), 1);
        assert_eq!(db.last_insert_id().unwrap(), Some(3));
    }

    #[test]
    fn explicit_zero_rowid_is_reported() {
        let mut db = SqliteBackend::open(":memory:").unwrap();
        db.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        assert_eq!(db.last_insert_id().unwrap(), None);

        let stmt = db.prepare("INSERT INTO t (id) VALUES (?)").unwrap();
        db.execute_prepared(&stmt, &[RowValues::Int(0)]).unwrap();
        assert_eq!(db.last_insert_id().unwrap(), Some(0));
    }

    #[test]
    fn updates_do_not_count_as_inserts() {
        let mut db = SqliteBackend::open(":memory:").unwrap();
        db.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, n INTEGER)").unwrap();
        db.execute_raw("UPDATE t SET n = 1").unwrap();
        db.execute_raw("INSERT OR IGNORE INTO t (id, n) SELECT 1, 1 WHERE 0").unwrap();
        assert_eq!(db.last_insert_id().unwrap(), None);
        assert!(is_insert("  replace INTO t VALUES (1, 1)"));
        assert!(!is_insert("SELECT 'insert'"));
    }

    #[test]
    fn finalize_drops_the_compiled_statement() {
        let mut db = backend();
        let stmt = db.prepare("SELECT id FROM users WHERE id = ?").unwrap();
        db.finalize(stmt.clone());
        assert_eq!(db.discarded_statements(), 1);

        // the handle still works; the statement is compiled again on demand
        let rows = db.execute_prepared(&stmt, &[RowValues::Int(2)]).unwrap();
        assert_eq!(rows.into_rows().unwrap().len(), 1);

        db.finalize(SqliteStatement {
            sql: Arc::from("SELEC nonsense"),
        });
        assert_eq!(db.discarded_statements(), 1);
    }

    #[test]
    fn row_returning_statements_are_detected_without_running() {
        let mut db = backend();
        assert!(db.returns_rows("SELECT id FROM users").unwrap());
        assert!(!db.returns_rows("DELETE FROM users WHERE id > ?").unwrap());
        assert!(db.returns_rows("DELETE FROM users WHERE id > ? RETURNING id").unwrap());
        let rows = db.execute_raw("SELECT id FROM users").unwrap();
        assert_eq!(rows.into_rows().unwrap().len(), 2);
    }

    #[test]
    fn bad_sql_is_a_query_error() {
        let mut db = backend();
        let err = db.prepare("SELEC nonsense").unwrap_err();
        assert!(matches!(err, SqlSessionError::QueryError { .. }));
    }

    #[test]
    fn empty_database_is_a_connection_error() {
        let err = SqliteBackend::connect(&ConnectOptions::default()).err().unwrap();
        assert!(matches!(err, SqlSessionError::ConnectionError(_)));
    }
}
