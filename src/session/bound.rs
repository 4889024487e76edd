use super::Session;
use crate::backend::Backend;
use crate::bind::BindSpec;
use crate::cursor::CursorKey;
use crate::error::SqlSessionError;
use crate::results::{CustomDbRow, QueryOutcome};
use crate::types::Params;

/// Explicit bindings waiting for the one call that will consume them.
///
/// Every executing method takes `self` by value, so a binding is used exactly once. Dropping
/// the guard without calling anything discards the binding.
#[must_use = "a BoundCall does nothing until query, fetch_one or fetch_all is called"]
pub struct BoundCall<'s, B: Backend> {
    session: &'s mut Session<B>,
    spec: BindSpec,
}

impl<'s, B: Backend> BoundCall<'s, B> {
    pub(super) fn new(session: &'s mut Session<B>, spec: BindSpec) -> Self {
        Self { session, spec }
    }

    /// The tags and coerced values that the call will bind.
    #[must_use]
    pub fn spec(&self) -> &BindSpec {
        &self.spec
    }

    /// Execute `sql` with the bound values; see [`Session::query`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::query`].
    pub fn query(self, sql: &str) -> Result<QueryOutcome, SqlSessionError> {
        let BoundCall { session, spec } = self;
        let params = Params::Positional(spec.values);
        let key = CursorKey::new(sql, &params);
        session.cursors.discard(&key);
        session.run(&key, sql, &params, Some(&spec.types))
    }

    /// Execute `sql` with the bound values and collect every row.
    ///
    /// # Errors
    ///
    /// Same as [`Session::fetch_all`].
    pub fn fetch_all(self, sql: &str) -> Result<Vec<CustomDbRow>, SqlSessionError> {
        let BoundCall { session, spec } = self;
        let params = Params::Positional(spec.values);
        let key = CursorKey::new(sql, &params);
        session.run_rows(&key, sql, &params, Some(&spec.types))
    }

    /// Execute `sql` with the bound values and return the first row.
    ///
    /// # Errors
    ///
    /// Same as [`Session::fetch_one`].
    pub fn fetch_one(self, sql: &str) -> Result<Option<CustomDbRow>, SqlSessionError> {
        Ok(self.fetch_all(sql)?.into_iter().next())
    }
}
