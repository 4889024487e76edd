use std::collections::HashSet;

mod bound;
mod literals;

pub use bound::BoundCall;

use crate::backend::Backend;
use crate::bind::{BindSpec, BindType, IntoBindTypes};
use crate::config::{ConnectOptions, SessionOptions};
use crate::cursor::{Advance, CursorKey, CursorMultiplexer};
use crate::error::SqlSessionError;
use crate::placeholders::{
    BindingMode, LiteralSubstitution, NativeBinding, PlaceholderStrategy, RewrittenQuery,
};
use crate::results::{CustomDbRow, QueryOutcome};
use crate::statement_cache::StatementCache;
use crate::types::{Params, RowValues};

/// One backend connection plus its statement cache and open fetch loops.
///
/// Every method takes `&mut self`: a session is driven by one caller at a time. To share a
/// session across threads, wrap it in a `Mutex` (or similar) yourself.
///
/// ```rust
/// use sql_session::prelude::*;
///
/// # fn main() -> Result<(), SqlSessionError> {
/// let mut backend = MemoryBackend::new();
/// backend.seed("users", vec![
///     vec![("id".to_string(), RowValues::Int(1))],
///     vec![("id".to_string(), RowValues::Int(2))],
///     vec![("id".to_string(), RowValues::Int(3))],
/// ]);
/// let mut db = Session::with_backend(backend, SessionOptions::default())?;
///
/// let mut ids = Vec::new();
/// while let Some(row) = db.fetch("SELECT * FROM users WHERE id > ?", vec![RowValues::Int(1)])? {
///     ids.push(*row.get("id").and_then(RowValues::as_int).unwrap());
/// }
/// assert_eq!(ids, vec![2, 3]);
/// # Ok(())
/// # }
/// ```
pub struct Session<B: Backend> {
    backend: B,
    options: SessionOptions,
    statements: StatementCache<B::Statement>,
    cursors: CursorMultiplexer,
    active_loops: HashSet<CursorKey>,
}

impl<B: Backend> Session<B> {
    /// Connect a new backend with default session options.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ConnectionError` if the backend cannot connect.
    pub fn connect(options: &ConnectOptions) -> Result<Self, SqlSessionError> {
        Self::connect_with(options, SessionOptions::default())
    }

    /// Connect a new backend with explicit session options.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ConfigError` for invalid session options and
    /// `SqlSessionError::ConnectionError` if the backend cannot connect.
    pub fn connect_with(
        options: &ConnectOptions,
        session_options: SessionOptions,
    ) -> Result<Self, SqlSessionError> {
        session_options.validate()?;
        let backend = B::connect(options)?;
        Self::with_backend(backend, session_options)
    }

    /// Wrap an already connected backend.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ConfigError` for invalid session options.
    pub fn with_backend(mut backend: B, options: SessionOptions) -> Result<Self, SqlSessionError> {
        options.validate()?;
        backend.set_statement_cache_capacity(options.statement_cache_capacity);
        tracing::debug!(
            backend = ?backend.kind(),
            binding = ?options.binding_mode,
            capacity = options.statement_cache_capacity,
            "session opened"
        );
        Ok(Self {
            backend,
            statements: StatementCache::new(options.statement_cache_capacity),
            options,
            cursors: CursorMultiplexer::new(),
            active_loops: HashSet::new(),
        })
    }

    /// Execute a statement and return its rows or affected count.
    ///
    /// Re-issuing a (query, parameters) pair that has an open fetch loop discards that loop.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::MissingParameter`/`InvalidInput` before touching the backend,
    /// or the backend's `SqlSessionError::QueryError`.
    pub fn query(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<QueryOutcome, SqlSessionError> {
        let params = params.into();
        let key = CursorKey::new(sql, &params);
        if let Some(statement) = self.cursors.discard(&key) {
            tracing::debug!(key = %key, statement = ?statement, "query re-issued over an open cursor");
        }
        self.run(&key, sql, &params, None)
    }

    /// Fetch the next row of the loop identified by (query, parameters).
    ///
    /// The first call executes the query; later calls walk its rows; the call after the last
    /// row returns `Ok(None)` and forgets the loop, so the next call starts over.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ReentrantCursor` when called for a pair whose
    /// [`Session::for_each_row`] loop is running, `SqlSessionError::InvalidInput` before
    /// executing a statement that returns no rows, and otherwise the same errors as
    /// [`Session::query`]. Any failure clears the loop's state.
    pub fn fetch(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Option<CustomDbRow>, SqlSessionError> {
        let params = params.into();
        let key = CursorKey::new(sql, &params);
        if self.active_loops.contains(&key) {
            return Err(SqlSessionError::ReentrantCursor(format!(
                "fetch inside its own for_each_row loop: {key}"
            )));
        }

        match self.cursors.advance(&key) {
            Some(Advance::Row(row)) => return Ok(Some(row)),
            Some(Advance::Exhausted { statement }) => {
                self.release_if_unreferenced(statement);
                return Ok(None);
            }
            None => {}
        }

        let rewritten = self.rewrite(sql, &params)?;
        let executed = self
            .ensure_returns_rows(&rewritten.sql)
            .and_then(|()| self.dispatch(&rewritten, None));
        let (outcome, statement) = match executed {
            Ok(executed) => executed,
            Err(err) => {
                self.cursors.discard(&key);
                self.release_if_unreferenced(Some(rewritten.sql));
                return Err(err);
            }
        };

        match outcome {
            QueryOutcome::Rows(rows) => {
                let first = self.cursors.open(key, rows, statement.clone());
                if first.is_none() {
                    self.release_if_unreferenced(statement);
                }
                Ok(first)
            }
            QueryOutcome::Affected(_) => {
                self.release_if_unreferenced(statement);
                Err(SqlSessionError::InvalidInput(
                    "fetch requires a statement that returns rows".into(),
                ))
            }
        }
    }

    /// Execute a query and collect every row.
    ///
    /// Runs independently of any open fetch loop for the same pair.
    ///
    /// # Errors
    ///
    /// Same as [`Session::query`]; a statement that returns no rows is
    /// `SqlSessionError::InvalidInput`.
    pub fn fetch_all(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<CustomDbRow>, SqlSessionError> {
        let params = params.into();
        let key = CursorKey::new(sql, &params);
        let rows = self.run_rows(&key, sql, &params, None)?;
        Ok(rows)
    }

    /// Execute a query and return its first row, if any.
    ///
    /// # Errors
    ///
    /// Same as [`Session::fetch_all`].
    pub fn fetch_one(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Option<CustomDbRow>, SqlSessionError> {
        Ok(self.fetch_all(sql, params)?.into_iter().next())
    }

    /// Run `f` for every row of a fresh execution of (query, parameters).
    ///
    /// The session is handed back to `f`, so other queries and fetch loops can run inside it.
    /// Fetching the same pair from inside `f` fails with `SqlSessionError::ReentrantCursor`.
    /// Returns the number of rows visited.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ReentrantCursor` if the pair is already being iterated, the
    /// query's errors, or the first error returned by `f`.
    pub fn for_each_row<F>(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        mut f: F,
    ) -> Result<usize, SqlSessionError>
    where
        F: FnMut(&mut Self, CustomDbRow) -> Result<(), SqlSessionError>,
    {
        let params = params.into();
        let key = CursorKey::new(sql, &params);
        if self.active_loops.contains(&key) || self.cursors.is_open(&key) {
            return Err(SqlSessionError::ReentrantCursor(format!(
                "nested loop over the same query and parameters: {key}"
            )));
        }

        let rows = self.run_rows(&key, sql, &params, None)?;
        self.active_loops.insert(key.clone());
        let mut visited = 0;
        let mut result = Ok(());
        for row in rows {
            result = f(self, row);
            if result.is_err() {
                break;
            }
            visited += 1;
        }
        self.active_loops.remove(&key);
        result.map(|()| visited)
    }

    /// Attach explicit type tags and values to the next call.
    ///
    /// The returned [`BoundCall`] is consumed by its first executing method, so the binding can
    /// never leak into a later call.
    ///
    /// ```rust
    /// use sql_session::prelude::*;
    ///
    /// # fn main() -> Result<(), SqlSessionError> {
    /// let mut db = Session::with_backend(MemoryBackend::new(), SessionOptions::default())?;
    /// db.bind_param("is", vec![RowValues::Text("4".into()), RowValues::Text("Jess".into())])?
    ///     .query("INSERT INTO users SET id = ?, name = ?")?;
    /// let row = db.fetch_one("SELECT * FROM users WHERE id = ?", vec![RowValues::Int(4)])?;
    /// assert_eq!(row.unwrap().get("id"), Some(&RowValues::Int(4)));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::InvalidInput` if the tags do not parse, differ in count from the
    /// values, or cannot be applied to them.
    pub fn bind_param(
        &mut self,
        types: impl IntoBindTypes,
        values: Vec<RowValues>,
    ) -> Result<BoundCall<'_, B>, SqlSessionError> {
        let spec = BindSpec::new(types, values)?;
        Ok(BoundCall::new(self, spec))
    }

    /// Row id generated by the most recent insert.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it cannot report the id.
    pub fn last_insert_id(&mut self) -> Result<Option<i64>, SqlSessionError> {
        self.backend.last_insert_id()
    }

    /// Drop every open loop and cached statement, then close the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it fails to close.
    pub fn close(mut self) -> Result<(), SqlSessionError> {
        tracing::debug!(
            cursors = self.cursors.len(),
            statements = self.statements.len(),
            "closing session"
        );
        self.cursors.clear();
        self.active_loops.clear();
        self.statements.clear(&mut self.backend);
        self.backend.close()
    }

    /// Whether a fetch loop over (query, parameters) is open and has rows left.
    ///
    /// ```rust
    /// use sql_session::prelude::*;
    ///
    /// # fn main() -> Result<(), SqlSessionError> {
    /// let mut backend = MemoryBackend::new();
    /// backend.seed("t", vec![vec![("id", RowValues::Int(1))], vec![("id", RowValues::Int(2))]]);
    /// let mut db = Session::with_backend(backend, SessionOptions::default())?;
    /// let params = Params::from(vec![RowValues::Int(0)]);
    ///
    /// db.fetch("SELECT * FROM t WHERE id > ?", params.clone())?;
    /// assert!(db.has_open_cursor("SELECT * FROM t WHERE id > ?", &params));
    /// assert_eq!(db.open_cursor_count(), 1);
    /// assert_eq!(db.cached_statement_count(), 1);
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn has_open_cursor(&self, sql: &str, params: &Params) -> bool {
        self.cursors.is_open(&CursorKey::new(sql, params))
    }

    /// Number of fetch loops currently open.
    #[must_use]
    pub fn open_cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Number of prepared statements held by the session's cache.
    #[must_use]
    pub fn cached_statement_count(&self) -> usize {
        self.statements.len()
    }

    /// The configured binding mode, before it is resolved against the backend.
    #[must_use]
    pub fn binding_mode(&self) -> BindingMode {
        self.options.binding_mode
    }

    /// Options the session was opened with.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend, e.g. for schema setup.
    ///
    /// Statements run this way bypass the statement cache and leave open fetch loops alone.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Execute outside the cursor machinery; clears the key's cursor on failure.
    pub(crate) fn run(
        &mut self,
        key: &CursorKey,
        sql: &str,
        params: &Params,
        tags: Option<&[BindType]>,
    ) -> Result<QueryOutcome, SqlSessionError> {
        self.run_tracked(key, sql, params, tags, false)
            .map(|(outcome, _)| outcome)
    }

    /// Execute and materialize every row, releasing the statement like an exhausted loop.
    pub(crate) fn run_rows(
        &mut self,
        key: &CursorKey,
        sql: &str,
        params: &Params,
        tags: Option<&[BindType]>,
    ) -> Result<Vec<CustomDbRow>, SqlSessionError> {
        let (outcome, statement) = self.run_tracked(key, sql, params, tags, true)?;
        self.release_if_unreferenced(statement);
        match outcome {
            QueryOutcome::Rows(rows) => Ok(rows.results),
            QueryOutcome::Affected(_) => Err(SqlSessionError::InvalidInput(
                "statement returns no rows".into(),
            )),
        }
    }

    fn run_tracked(
        &mut self,
        key: &CursorKey,
        sql: &str,
        params: &Params,
        tags: Option<&[BindType]>,
        rows_only: bool,
    ) -> Result<(QueryOutcome, Option<String>), SqlSessionError> {
        let result = self.rewrite(sql, params).and_then(|rewritten| {
            if rows_only {
                self.ensure_returns_rows(&rewritten.sql)?;
            }
            self.dispatch(&rewritten, tags)
        });
        if result.is_err() {
            self.cursors.discard(key);
        }
        result
    }

    /// Reject statements without a result set before they run.
    fn ensure_returns_rows(&mut self, sql: &str) -> Result<(), SqlSessionError> {
        if self.backend.returns_rows(sql)? {
            Ok(())
        } else {
            Err(SqlSessionError::InvalidInput(
                "statement returns no rows".into(),
            ))
        }
    }

    fn rewrite(&self, sql: &str, params: &Params) -> Result<RewrittenQuery, SqlSessionError> {
        if sql.trim().is_empty() {
            return Err(SqlSessionError::InvalidInput("empty query text".into()));
        }
        let native = self
            .options
            .binding_mode
            .resolve(self.backend.supports_native_binding())?;
        let backslashes = self.backend.backslash_escapes();
        let escape = |value: &RowValues| self.backend.escape(value);
        let literal = LiteralSubstitution::new(&escape).with_backslash_escapes(backslashes);
        let binding = NativeBinding::default().with_backslash_escapes(backslashes);
        let strategy: &dyn PlaceholderStrategy = if native { &binding } else { &literal };
        strategy.rewrite(sql, params)
    }

    /// Execute rewritten SQL. Returns the statement-cache key when a cached statement ran.
    fn dispatch(
        &mut self,
        rewritten: &RewrittenQuery,
        tags: Option<&[BindType]>,
    ) -> Result<(QueryOutcome, Option<String>), SqlSessionError> {
        if rewritten.values.is_empty() {
            tracing::trace!(sql = %rewritten.sql, "direct execution");
            let outcome = self.backend.execute_raw(&rewritten.sql)?;
            return Ok((outcome, None));
        }
        let outcome = self.statements.execute(
            &mut self.backend,
            &rewritten.sql,
            &rewritten.values,
            tags,
        )?;
        Ok((outcome, Some(rewritten.sql.clone())))
    }

    fn release_if_unreferenced(&mut self, statement: Option<String>) {
        if let Some(sql) = statement {
            if !self.cursors.references_statement(&sql) {
                self.statements.release(&mut self.backend, &sql);
            }
        }
    }
}
