//! In-process backend over plain tables of rows.
//!
//! Understands a small SQL subset, enough to drive sessions in tests and examples:
//!
//! - `INSERT INTO t SET c = op, ...` and `INSERT INTO t (c, ...) VALUES (op, ...)`
//! - `SELECT * FROM t [WHERE cond] [LIMIT n]`
//! - `UPDATE t SET c = op, ... WHERE cond`
//! - `DELETE FROM t [WHERE cond]`
//!
//! where `cond` is `c <cmp> op`, `c LIKE op` or `c IN (op, ...)` and `op` is `?`, a quoted string,
//! a number, `NULL` or `now()`. Comparisons are loose: `'4' = 4` holds. Anything else fails with
//! error code 1064.

mod compare;
mod statement;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::Backend;
use crate::config::ConnectOptions;
use crate::error::SqlSessionError;
use crate::results::{CustomDbRow, QueryOutcome, ResultSet};
use crate::types::{BackendKind, RowValues};

use compare::{like, loose_cmp, loose_eq};
use statement::{CompareOp, Condition, Operand, ParsedStatement};

type Row = Vec<(String, RowValues)>;

/// Prepared handle for [`MemoryBackend`]: the parsed statement.
#[derive(Debug, Clone)]
pub struct MemoryStatement {
    sql: Arc<str>,
    parsed: Arc<ParsedStatement>,
}

/// Tables held in memory, keyed by name.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    tables: BTreeMap<String, Vec<Row>>,
    native_binding: bool,
    last_insert_id: Option<i64>,
    prepare_count: usize,
    executed: Vec<String>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// An empty backend that binds natively.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            native_binding: true,
            last_insert_id: None,
            prepare_count: 0,
            executed: Vec::new(),
        }
    }

    /// A backend that reports no native binding, so sessions in `Auto` mode inline values.
    #[must_use]
    pub fn without_native_binding() -> Self {
        Self {
            native_binding: false,
            ..Self::new()
        }
    }

    /// Append rows to `table`, creating it if needed.
    pub fn seed<R, K, V>(&mut self, table: &str, rows: impl IntoIterator<Item = R>)
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        let stored = self.tables.entry(table.to_owned()).or_default();
        for row in rows {
            stored.push(row.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        }
    }

    /// Current contents of `table`; empty when the table does not exist.
    #[must_use]
    pub fn table_rows(&self, table: &str) -> Vec<CustomDbRow> {
        self.tables
            .get(table)
            .map(|rows| result_set(rows.iter().collect()).results)
            .unwrap_or_default()
    }

    /// Rows currently stored in `table`; 0 for a table that does not exist.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }

    /// How many statements have been prepared over the backend's lifetime.
    #[must_use]
    pub fn prepare_count(&self) -> usize {
        self.prepare_count
    }

    /// Every SQL text executed so far, raw and prepared, in order.
    #[must_use]
    pub fn executed_sql(&self) -> &[String] {
        &self.executed
    }

    fn run(
        &mut self,
        sql: &str,
        parsed: &ParsedStatement,
        values: &[RowValues],
    ) -> Result<QueryOutcome, SqlSessionError> {
        let expected = parsed.param_count();
        if expected != values.len() {
            return Err(SqlSessionError::query(
                2031,
                format!("statement expects {expected} bind values, got {}", values.len()),
            ));
        }
        self.executed.push(sql.to_owned());
        let mut binds = values.iter();

        match parsed {
            ParsedStatement::Insert { table, assignments } => {
                let row: Row = assignments
                    .iter()
                    .map(|(column, op)| (column.clone(), resolve(op, &mut binds)))
                    .collect();
                self.last_insert_id = column(&row, "id").and_then(RowValues::as_int).copied();
                self.tables.entry(table.clone()).or_default().push(row);
                tracing::trace!(table = %table, "memory insert");
                Ok(QueryOutcome::Affected(1))
            }
            ParsedStatement::Select {
                table,
                condition,
                limit,
            } => {
                let filter = condition.as_ref().map(|c| BoundCondition::new(c, &mut binds));
                let matched: Vec<&Row> = self
                    .tables
                    .get(table)
                    .into_iter()
                    .flatten()
                    .filter(|row| filter.as_ref().is_none_or(|f| f.matches(row)))
                    .take(limit.unwrap_or(usize::MAX))
                    .collect();
                Ok(QueryOutcome::Rows(result_set(matched)))
            }
            ParsedStatement::Update {
                table,
                assignments,
                condition,
            } => {
                let updates: Vec<(String, RowValues)> = assignments
                    .iter()
                    .map(|(column, op)| (column.clone(), resolve(op, &mut binds)))
                    .collect();
                let filter = BoundCondition::new(condition, &mut binds);
                let mut affected = 0;
                for row in self.tables.get_mut(table).into_iter().flatten() {
                    if !filter.matches(row) {
                        continue;
                    }
                    for (name, value) in &updates {
                        match row.iter_mut().find(|(c, _)| c == name) {
                            Some((_, slot)) => *slot = value.clone(),
                            None => row.push((name.clone(), value.clone())),
                        }
                    }
                    affected += 1;
                }
                Ok(QueryOutcome::Affected(affected))
            }
            ParsedStatement::Delete { table, condition } => {
                let filter = condition.as_ref().map(|c| BoundCondition::new(c, &mut binds));
                let Some(rows) = self.tables.get_mut(table) else {
                    return Ok(QueryOutcome::Affected(0));
                };
                let before = rows.len();
                rows.retain(|row| filter.as_ref().is_some_and(|f| !f.matches(row)));
                Ok(QueryOutcome::Affected(before - rows.len()))
            }
        }
    }
}

impl Backend for MemoryBackend {
    type Statement = MemoryStatement;

    fn connect(_options: &ConnectOptions) -> Result<Self, SqlSessionError> {
        Ok(Self::new())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn supports_native_binding(&self) -> bool {
        self.native_binding
    }

    fn execute_raw(&mut self, sql: &str) -> Result<QueryOutcome, SqlSessionError> {
        let parsed = ParsedStatement::parse(sql)?;
        self.run(sql, &parsed, &[])
    }

    fn prepare(&mut self, sql: &str) -> Result<MemoryStatement, SqlSessionError> {
        let parsed = ParsedStatement::parse(sql)?;
        self.prepare_count += 1;
        Ok(MemoryStatement {
            sql: Arc::from(sql),
            parsed: Arc::new(parsed),
        })
    }

    fn execute_prepared(
        &mut self,
        statement: &MemoryStatement,
        values: &[RowValues],
    ) -> Result<QueryOutcome, SqlSessionError> {
        let parsed = Arc::clone(&statement.parsed);
        self.run(&statement.sql, &parsed, values)
    }

    fn returns_rows(&mut self, sql: &str) -> Result<bool, SqlSessionError> {
        Ok(matches!(ParsedStatement::parse(sql)?, ParsedStatement::Select { .. }))
    }

    fn last_insert_id(&mut self) -> Result<Option<i64>, SqlSessionError> {
        Ok(self.last_insert_id)
    }

    fn close(self) -> Result<(), SqlSessionError> {
        Ok(())
    }
}

fn column<'r>(row: &'r Row, name: &str) -> Option<&'r RowValues> {
    row.iter().find(|(c, _)| c == name).map(|(_, v)| v)
}

fn resolve<'v>(op: &Operand, binds: &mut impl Iterator<Item = &'v RowValues>) -> RowValues {
    match op {
        Operand::Param => binds.next().cloned().unwrap_or(RowValues::Null),
        Operand::Value(value) => value.clone(),
        Operand::Now => RowValues::Text(
            chrono::Local::now()
                .naive_local()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
    }
}

/// A condition with its operands resolved against the bind values.
enum BoundCondition<'c> {
    Compare(&'c str, CompareOp, RowValues),
    Like(&'c str, RowValues),
    In(&'c str, Vec<RowValues>),
}

impl<'c> BoundCondition<'c> {
    fn new<'v>(condition: &'c Condition, binds: &mut impl Iterator<Item = &'v RowValues>) -> Self {
        match condition {
            Condition::Compare {
                column,
                op,
                operand,
            } => BoundCondition::Compare(column, *op, resolve(operand, binds)),
            Condition::Like { column, operand } => {
                BoundCondition::Like(column, resolve(operand, binds))
            }
            Condition::In { column, operands } => BoundCondition::In(
                column,
                operands.iter().map(|op| resolve(op, binds)).collect(),
            ),
        }
    }

    fn matches(&self, row: &Row) -> bool {
        match self {
            BoundCondition::Compare(name, op, rhs) => {
                let Some(lhs) = column(row, name) else {
                    return false;
                };
                let Some(ordering) = loose_cmp(lhs, rhs) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => ordering.is_eq(),
                    CompareOp::NotEq => ordering.is_ne(),
                    CompareOp::Lt => ordering.is_lt(),
                    CompareOp::Gt => ordering.is_gt(),
                    CompareOp::LtEq => ordering.is_le(),
                    CompareOp::GtEq => ordering.is_ge(),
                }
            }
            BoundCondition::Like(name, pattern) => {
                column(row, name).is_some_and(|value| like(value, pattern))
            }
            BoundCondition::In(name, candidates) => column(row, name)
                .is_some_and(|value| candidates.iter().any(|c| loose_eq(value, c))),
        }
    }
}

/// Build a result set whose columns are every column seen, in first-seen order.
fn result_set(rows: Vec<&Row>) -> ResultSet {
    let mut names: Vec<String> = Vec::new();
    for row in &rows {
        for (name, _) in *row {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    let mut rs = ResultSet::with_capacity(rows.len());
    rs.set_column_names(Arc::new(names.clone()));
    for row in rows {
        rs.add_row_values(
            names
                .iter()
                .map(|name| column(row, name).cloned().unwrap_or(RowValues::Null))
                .collect(),
        );
    }
    rs
}
