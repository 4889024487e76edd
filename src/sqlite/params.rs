use rusqlite::types::Value;

use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Null => Value::Null,
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Bind values converted for rusqlite, in placeholder order.
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[RowValues]) -> Self {
        Params(params.iter().map(row_value_to_sqlite_value).collect())
    }

    /// Borrow the underlying values.
    #[must_use]
    pub fn as_values(&self) -> &[Value] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_become_integers() {
        let params = Params::convert(&[RowValues::Bool(true), RowValues::Null, "x".into()]);
        assert_eq!(
            params.as_values(),
            &[Value::Integer(1), Value::Null, Value::Text("x".into())]
        );
    }
}
