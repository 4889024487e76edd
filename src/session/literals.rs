use super::Session;
use crate::backend::Backend;
use crate::types::{NamedParams, RowValues};

/// Escaping helpers for SQL assembled by hand, using the backend's [`Backend::escape`].
impl<B: Backend> Session<B> {
    /// Escape every value, without quotes.
    #[must_use]
    pub fn escape_values(&self, values: &[RowValues]) -> Vec<String> {
        values.iter().map(|value| self.backend.escape(value)).collect()
    }

    /// Escape and single-quote every value, ready to join into an `IN (...)` list.
    ///
    /// ```rust
    /// use sql_session::prelude::*;
    ///
    /// # fn main() -> Result<(), SqlSessionError> {
    /// let db = Session::with_backend(MemoryBackend::new(), SessionOptions::default())?;
    /// let list = db.quote_list(&[RowValues::from("a'b"), RowValues::Int(2)]).join(", ");
    /// assert_eq!(list, "'a''b', '2'");
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn quote_list(&self, values: &[RowValues]) -> Vec<String> {
        values
            .iter()
            .map(|value| format!("'{}'", self.backend.escape(value)))
            .collect()
    }

    /// One `` `name` = 'value' `` assignment per entry, in name order.
    ///
    /// Entries whose name is all digits are skipped. Backticks inside a name are doubled.
    #[must_use]
    pub fn set_clause(&self, values: &NamedParams) -> Vec<String> {
        values
            .iter()
            .filter(|(name, _)| !name.bytes().all(|b| b.is_ascii_digit()))
            .map(|(name, value)| {
                format!(
                    "`{}` = '{}'",
                    name.replace('`', "``"),
                    self.backend.escape(value)
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SessionOptions;
    use crate::memory::MemoryBackend;
    use crate::session::Session;
    use crate::types::{NamedParams, RowValues};

    fn session() -> Session<MemoryBackend> {
        Session::with_backend(MemoryBackend::new(), SessionOptions::default()).unwrap()
    }

    #[test]
    fn set_clause_skips_numeric_names() {
        let db = session();
        let values = NamedParams::new()
            .with("name", "O'Brien")
            .with("0", "positional")
            .with("age", 40)
            .with("odd`col", RowValues::Null);
        assert_eq!(
            db.set_clause(&values),
            vec!["`age` = '40'", "`name` = 'O''Brien'", "`odd``col` = ''"]
        );
        assert!(db.set_clause(&NamedParams::new().with("12", 1)).is_empty());
    }

    #[test]
    fn escape_values_keeps_order_and_leaves_quotes_off() {
        let db = session();
        let values = [RowValues::from("it's"), RowValues::Bool(true), RowValues::Int(-4)];
        let escaped = db.escape_values(&values);
        assert_eq!(escaped, vec!["it''s", "1", "-4"]);
        assert!(db.quote_list(&[]).is_empty());
    }
}
