use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Statement, ToSql};

use crate::error::SqlSessionError;
use crate::results::{QueryOutcome, ResultSet};
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqlSessionError::QueryError` if the value cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlSessionError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Build a result set from a `SQLite` query.
///
/// # Errors
///
/// Returns `SqlSessionError::QueryError` if execution or row extraction fails.
pub fn build_result_set(stmt: &mut Statement, params: &[Value]) -> Result<ResultSet, SqlSessionError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut rows_iter = stmt.query(&param_refs[..])?;
    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Run `stmt`: statements with result columns yield rows, everything else an affected count.
///
/// # Errors
///
/// Returns `SqlSessionError::QueryError` if execution fails.
pub fn run_statement(stmt: &mut Statement, params: &[Value]) -> Result<QueryOutcome, SqlSessionError> {
    if stmt.column_count() > 0 {
        return build_result_set(stmt, params).map(QueryOutcome::Rows);
    }
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let affected = stmt.execute(&param_refs[..])?;
    Ok(QueryOutcome::Affected(affected))
}
