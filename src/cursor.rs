use std::collections::HashMap;
use std::fmt;

use crate::results::{CustomDbRow, ResultSet};
use crate::types::Params;

/// Identity of one fetch loop: the query text plus its parameter fingerprint.
///
/// Compared by full content, so two different (query, parameters) pairs never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorKey {
    sql: String,
    params: String,
}

impl CursorKey {
    #[must_use]
    pub fn new(sql: &str, params: &Params) -> Self {
        Self {
            sql: sql.to_owned(),
            params: params.fingerprint(),
        }
    }

    /// Query text half of the key.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for CursorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sql, self.params)
    }
}

/// Position within one materialized result.
#[derive(Debug)]
struct Cursor {
    rows: ResultSet,
    position: usize,
    total: usize,
    /// Statement-cache key the rows came from, if the statement was cached.
    statement: Option<String>,
}

/// Result of advancing an open cursor.
#[derive(Debug)]
pub enum Advance {
    Row(CustomDbRow),
    /// The cursor was torn down; carries the statement it used, if any.
    Exhausted { statement: Option<String> },
}

/// Open cursors keyed by [`CursorKey`].
#[derive(Debug, Default)]
pub struct CursorMultiplexer {
    open: HashMap<CursorKey, Cursor>,
}

impl CursorMultiplexer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has a cursor with rows left.
    #[must_use]
    pub fn is_open(&self, key: &CursorKey) -> bool {
        self.open.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Start a cursor over `rows` and return its first row.
    ///
    /// An empty result opens nothing and returns `None`. Any cursor already open under `key`
    /// is replaced.
    pub fn open(
        &mut self,
        key: CursorKey,
        rows: ResultSet,
        statement: Option<String>,
    ) -> Option<CustomDbRow> {
        let first = rows.row(0)?;
        let total = rows.len();
        tracing::debug!(key = %key, total, "cursor opened");
        self.open.insert(
            key,
            Cursor {
                rows,
                position: 0,
                total,
                statement,
            },
        );
        Some(first)
    }

    /// Move the cursor for `key` one row forward; `None` if no cursor is open.
    pub fn advance(&mut self, key: &CursorKey) -> Option<Advance> {
        let cursor = self.open.get_mut(key)?;
        cursor.position += 1;
        if cursor.position < cursor.total {
            tracing::trace!(key = %key, row = cursor.position, "cursor advanced");
            if let Some(row) = cursor.rows.row(cursor.position) {
                return Some(Advance::Row(row));
            }
        }
        let statement = self.open.remove(key).and_then(|c| c.statement);
        tracing::debug!(key = %key, "cursor exhausted");
        Some(Advance::Exhausted { statement })
    }

    /// Drop the cursor for `key`, returning the statement it used.
    pub fn discard(&mut self, key: &CursorKey) -> Option<Option<String>> {
        let cursor = self.open.remove(key)?;
        tracing::debug!(key = %key, row = cursor.position, total = cursor.total, "cursor discarded");
        Some(cursor.statement)
    }

    /// Whether any open cursor still reads from `statement`.
    #[must_use]
    pub fn references_statement(&self, statement: &str) -> bool {
        self.open
            .values()
            .any(|c| c.statement.as_deref() == Some(statement))
    }

    /// Forget every cursor.
    pub fn clear(&mut self) {
        self.open.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::RowValues;

    fn rows(ids: &[i64]) -> ResultSet {
        let mut rs = ResultSet::with_capacity(ids.len());
        rs.set_column_names(Arc::new(vec!["id".into()]));
        for id in ids {
            rs.add_row_values(vec![RowValues::Int(*id)]);
        }
        rs
    }

    fn key(n: i64) -> CursorKey {
        CursorKey::new("SELECT * FROM t WHERE id > ?", &vec![RowValues::Int(n)].into())
    }

    fn id(row: &CustomDbRow) -> i64 {
        *row.get("id").and_then(RowValues::as_int).unwrap()
    }

    #[test]
    fn walks_rows_then_exhausts() {
        let mut mux = CursorMultiplexer::new();
        let first = mux.open(key(0), rows(&[1, 2, 3]), None).unwrap();
        assert_eq!(id(&first), 1);
        for expected in [2, 3] {
            match mux.advance(&key(0)) {
                Some(Advance::Row(row)) => assert_eq!(id(&row), expected),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(matches!(mux.advance(&key(0)), Some(Advance::Exhausted { .. })));
        assert!(!mux.is_open(&key(0)));
        assert!(mux.advance(&key(0)).is_none());
    }

    #[test]
    fn empty_result_opens_nothing() {
        let mut mux = CursorMultiplexer::new();
        assert!(mux.open(key(0), rows(&[]), None).is_none());
        assert!(mux.is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let mut mux = CursorMultiplexer::new();
        let stmt = Some("SELECT * FROM t WHERE id > ?".to_string());
        mux.open(key(0), rows(&[1, 2]), stmt.clone());
        mux.open(key(1), rows(&[2]), stmt);
        assert_eq!(mux.len(), 2);
        match mux.advance(&key(1)) {
            Some(Advance::Exhausted { statement }) => {
                assert!(mux.references_statement(statement.as_deref().unwrap()));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(mux.advance(&key(0)), Some(Advance::Row(_))));
        assert_eq!(mux.discard(&key(0)), Some(Some("SELECT * FROM t WHERE id > ?".into())));
        assert!(!mux.references_statement("SELECT * FROM t WHERE id > ?"));
    }
}
