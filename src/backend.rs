use crate::config::ConnectOptions;
use crate::error::SqlSessionError;
use crate::results::QueryOutcome;
use crate::types::{BackendKind, RowValues};

/// Capabilities a session needs from one physical connection.
///
/// Implementations are independent of each other; a session owns exactly one and never calls it
/// from more than one place at a time.
pub trait Backend {
    /// Backend-specific prepared statement handle, owned by the session's statement cache.
    type Statement;

    /// Open a connection.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ConnectionError` if the connection cannot be established.
    fn connect(options: &ConnectOptions) -> Result<Self, SqlSessionError>
    where
        Self: Sized;

    fn kind(&self) -> BackendKind;

    /// Whether `prepare`/`execute_prepared` accept bind values.
    fn supports_native_binding(&self) -> bool;

    /// Execute SQL text that carries no bind values.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::QueryError` if the backend rejects the statement.
    fn execute_raw(&mut self, sql: &str) -> Result<QueryOutcome, SqlSessionError>;

    /// Compile `sql` (with `?` sites) into a reusable handle.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::QueryError` if the statement does not compile.
    fn prepare(&mut self, sql: &str) -> Result<Self::Statement, SqlSessionError>;

    /// Bind `values` to `statement` in order and execute it.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::QueryError` if binding or execution fails.
    fn execute_prepared(
        &mut self,
        statement: &Self::Statement,
        values: &[RowValues],
    ) -> Result<QueryOutcome, SqlSessionError>;

    /// Whether `sql` produces a result set, decided without executing it.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::QueryError` if the statement does not compile.
    fn returns_rows(&mut self, sql: &str) -> Result<bool, SqlSessionError>;

    /// Release backend resources held by an evicted handle.
    fn finalize(&mut self, _statement: Self::Statement) {}

    /// Size any statement cache the backend keeps itself; called once with the session's
    /// capacity.
    fn set_statement_cache_capacity(&mut self, _capacity: usize) {}

    /// Whether a backslash escapes the next character inside quoted literals (MySQL's default).
    ///
    /// Placeholder scanning follows this, so `'it\'s ?'` holds no bind site. A backend that
    /// returns `true` should also escape backslashes in [`Backend::escape`].
    fn backslash_escapes(&self) -> bool {
        false
    }

    /// Render a value for inlining into SQL text, without surrounding quotes.
    fn escape(&self, value: &RowValues) -> String {
        standard_escape(value)
    }

    /// Row id produced by the most recent insert, if any.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::QueryError` if the backend cannot report it.
    fn last_insert_id(&mut self) -> Result<Option<i64>, SqlSessionError>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ConnectionError` if the backend fails to close cleanly.
    fn close(self) -> Result<(), SqlSessionError>
    where
        Self: Sized;
}

/// Standard SQL escaping: single quotes are doubled.
///
/// Booleans render as `1`/`0`, NULL as an empty string and blobs as their lossy UTF-8 text.
#[must_use]
pub fn standard_escape(value: &RowValues) -> String {
    match value {
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Text(s) => s.replace('\'', "''"),
        RowValues::Bool(b) => u8::from(*b).to_string(),
        RowValues::Null => String::new(),
        RowValues::Blob(bytes) => String::from_utf8_lossy(bytes).replace('\'', "''"),
    }
}
