use std::collections::HashMap;

use crate::backend::Backend;
use crate::bind::{BindType, apply_bind_types, infer_bind_types};
use crate::error::SqlSessionError;
use crate::results::QueryOutcome;
use crate::types::RowValues;

struct CachedStatement<S> {
    handle: S,
    last_used: u64,
}

/// Prepared statements keyed by their executable SQL text.
///
/// Holds at most one handle per key and at most `capacity` handles overall; inserting past the
/// capacity evicts the least recently used handle.
pub struct StatementCache<S> {
    entries: HashMap<String, CachedStatement<S>>,
    capacity: usize,
    clock: u64,
}

impl<S> StatementCache<S> {
    /// An empty cache; a capacity of 0 is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// Whether a handle for `sql` is cached.
    #[must_use]
    pub fn contains(&self, sql: &str) -> bool {
        self.entries.contains_key(sql)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the cached handle for `sql`, preparing and storing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if preparation fails; nothing is cached in that case.
    pub fn acquire<B>(&mut self, backend: &mut B, sql: &str) -> Result<&S, SqlSessionError>
    where
        B: Backend<Statement = S>,
    {
        self.clock += 1;
        if self.entries.contains_key(sql) {
            tracing::trace!(sql, "statement cache hit");
        } else {
            let handle = backend.prepare(sql)?;
            if self.entries.len() >= self.capacity {
                self.evict_least_recent(backend);
            }
            tracing::debug!(sql, cached = self.entries.len() + 1, "prepared statement");
            self.entries.insert(
                sql.to_owned(),
                CachedStatement {
                    handle,
                    last_used: self.clock,
                },
            );
        }

        let Some(cached) = self.entries.get_mut(sql) else {
            return Err(SqlSessionError::query(-1, format!("statement not cached: {sql}")));
        };
        cached.last_used = self.clock;
        Ok(&cached.handle)
    }

    /// Bind `values` by tag and execute the cached statement for `sql`.
    ///
    /// Tags are inferred from the values when `tags` is `None`. A failed execution leaves the
    /// handle cached so the caller can retry with corrected values.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::InvalidInput` for tag/value mismatches and the backend's
    /// `SqlSessionError::QueryError` for prepare or execution failures.
    pub fn execute<B>(
        &mut self,
        backend: &mut B,
        sql: &str,
        values: &[RowValues],
        tags: Option<&[BindType]>,
    ) -> Result<QueryOutcome, SqlSessionError>
    where
        B: Backend<Statement = S>,
    {
        let inferred;
        let tags = match tags {
            Some(tags) => tags,
            None => {
                inferred = infer_bind_types(values);
                &inferred
            }
        };
        let bound = apply_bind_types(values, tags)?;
        let handle = self.acquire(backend, sql)?;
        if tracing::enabled!(tracing::Level::TRACE) {
            let codes: String = tags.iter().map(|t| t.code()).collect();
            tracing::trace!(sql, types = %codes, "executing prepared statement");
        }
        backend.execute_prepared(handle, &bound)
    }

    /// Evict the handle for `sql`. Returns whether one was cached.
    pub fn release<B>(&mut self, backend: &mut B, sql: &str) -> bool
    where
        B: Backend<Statement = S>,
    {
        match self.entries.remove(sql) {
            Some(cached) => {
                tracing::debug!(sql, "released statement");
                backend.finalize(cached.handle);
                true
            }
            None => false,
        }
    }

    /// Evict every handle.
    pub fn clear<B>(&mut self, backend: &mut B)
    where
        B: Backend<Statement = S>,
    {
        for (_, cached) in self.entries.drain() {
            backend.finalize(cached.handle);
        }
    }

    fn evict_least_recent<B>(&mut self, backend: &mut B)
    where
        B: Backend<Statement = S>,
    {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, cached)| cached.last_used)
            .map(|(sql, _)| sql.clone());
        if let Some(sql) = oldest {
            tracing::debug!(sql = %sql, "evicting least recently used statement");
            self.release(backend, &sql);
        }
    }
}
