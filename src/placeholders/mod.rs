use clap::ValueEnum;
use serde::{Deserialize, Serialize};

mod scanner;

use scanner::{Token, tokenize};

use crate::error::SqlSessionError;
use crate::types::{Params, RowValues};

/// How a session turns placeholders into executable SQL.
///
/// # Examples
/// ```rust
/// use sql_session::prelude::*;
///
/// let options = SessionOptions::default().with_binding_mode(BindingMode::Literal);
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum BindingMode {
    /// Bind natively when the backend supports it, otherwise inline escaped literals.
    #[default]
    Auto,
    /// Always bind natively; fails on backends without native binding.
    Native,
    /// Always inline escaped literals.
    Literal,
}

impl BindingMode {
    /// Resolve to `true` for native binding, `false` for literal substitution.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::InvalidInput` when native binding is forced on a backend
    /// that cannot bind.
    pub fn resolve(self, native_supported: bool) -> Result<bool, SqlSessionError> {
        match self {
            BindingMode::Auto => Ok(native_supported),
            BindingMode::Native if native_supported => Ok(true),
            BindingMode::Native => Err(SqlSessionError::InvalidInput(
                "backend does not support native parameter binding".into(),
            )),
            BindingMode::Literal => Ok(false),
        }
    }
}

/// Executable SQL plus the values to bind to its `?` sites, in order.
///
/// Literal substitution always produces an empty value list.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenQuery {
    pub sql: String,
    pub values: Vec<RowValues>,
}

/// One way of resolving `:name`, `?` and `??` placeholders.
pub trait PlaceholderStrategy {
    /// Rewrite `sql` against `params`.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::MissingParameter` or `SqlSessionError::InvalidInput` when the
    /// parameter set does not fit the placeholders. No backend is touched.
    fn rewrite(&self, sql: &str, params: &Params) -> Result<RewrittenQuery, SqlSessionError>;
}

/// Rewrites every placeholder to `?` and collects values in text order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBinding {
    backslash_escapes: bool,
}

impl NativeBinding {
    /// Treat `\` inside quoted literals as an escape character, as MySQL does by default.
    #[must_use]
    pub fn with_backslash_escapes(mut self, enabled: bool) -> Self {
        self.backslash_escapes = enabled;
        self
    }
}

impl PlaceholderStrategy for NativeBinding {
    fn rewrite(&self, sql: &str, params: &Params) -> Result<RewrittenQuery, SqlSessionError> {
        let tokens = tokenize(sql, self.backslash_escapes);
        let mut out = String::with_capacity(sql.len());
        let mut values = Vec::new();
        let mut positional = match params {
            Params::Positional(values) => Some(values.iter()),
            Params::Named(_) => None,
        };
        let mut numbered = false;
        let mut sites = 0usize;

        for token in tokens {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Numbered(text) => {
                    numbered = true;
                    out.push_str(text);
                }
                Token::Named(name) => {
                    let value = match params {
                        Params::Named(named) => named.get(name),
                        Params::Positional(_) => None,
                    }
                    .ok_or_else(|| SqlSessionError::MissingParameter(name.to_string()))?;
                    out.push('?');
                    values.push(value.clone());
                }
                Token::Positional | Token::Raw => {
                    sites += 1;
                    let Some(iter) = positional.as_mut() else {
                        return Err(SqlSessionError::InvalidInput(
                            "positional placeholder used with named parameters".into(),
                        ));
                    };
                    let value = iter.next().ok_or_else(|| {
                        SqlSessionError::InvalidInput(format!(
                            "query has more placeholders than the {} supplied values",
                            params_len(params)
                        ))
                    })?;
                    out.push('?');
                    values.push(value.clone());
                }
            }
        }

        if let Params::Positional(supplied) = params {
            if numbered && sites == 0 {
                // ?N placeholders index the supplied values directly
                values.clone_from(supplied);
            } else if sites != supplied.len() {
                return Err(SqlSessionError::InvalidInput(format!(
                    "query has {sites} placeholders but {} values were supplied",
                    supplied.len()
                )));
            }
        }

        tracing::trace!(sql = %out, binds = values.len(), "native rewrite");
        Ok(RewrittenQuery { sql: out, values })
    }
}

/// Inlines escaped values into the SQL text.
///
/// `?` becomes a quoted value, `??` an unquoted one and `:name` a quoted value. With no
/// positional values every `?`/`??` becomes `''`; an unknown `:name` also becomes `''`.
pub struct LiteralSubstitution<'e> {
    escape: &'e dyn Fn(&RowValues) -> String,
    backslash_escapes: bool,
}

impl<'e> LiteralSubstitution<'e> {
    /// `escape` renders one value without quotes, usually [`crate::Backend::escape`].
    #[must_use]
    pub fn new(escape: &'e dyn Fn(&RowValues) -> String) -> Self {
        Self {
            escape,
            backslash_escapes: false,
        }
    }

    /// Same as [`NativeBinding::with_backslash_escapes`].
    #[must_use]
    pub fn with_backslash_escapes(mut self, enabled: bool) -> Self {
        self.backslash_escapes = enabled;
        self
    }

    fn quoted(&self, value: &RowValues) -> String {
        format!("'{}'", (self.escape)(value))
    }

    fn unquoted(&self, value: &RowValues) -> String {
        if value.is_null() {
            "NULL".to_string()
        } else {
            (self.escape)(value)
        }
    }
}

impl PlaceholderStrategy for LiteralSubstitution<'_> {
    fn rewrite(&self, sql: &str, params: &Params) -> Result<RewrittenQuery, SqlSessionError> {
        let tokens = tokenize(sql, self.backslash_escapes);
        let mut out = String::with_capacity(sql.len());
        let supplied: &[RowValues] = match params {
            Params::Positional(values) => values,
            Params::Named(_) => &[],
        };
        let mut positional = supplied.iter();
        let mut sites = 0usize;

        for token in tokens {
            match token {
                Token::Text(text) | Token::Numbered(text) => out.push_str(text),
                Token::Named(name) => {
                    let value = match params {
                        Params::Named(named) => named.get(name),
                        Params::Positional(_) => None,
                    };
                    match value {
                        Some(value) => out.push_str(&self.quoted(value)),
                        None => out.push_str("''"),
                    }
                }
                Token::Positional | Token::Raw if supplied.is_empty() => {
                    sites += 1;
                    out.push_str("''");
                }
                Token::Positional => {
                    sites += 1;
                    if let Some(value) = positional.next() {
                        out.push_str(&self.quoted(value));
                    }
                }
                Token::Raw => {
                    sites += 1;
                    if let Some(value) = positional.next() {
                        out.push_str(&self.unquoted(value));
                    }
                }
            }
        }

        if !supplied.is_empty() && sites != supplied.len() {
            return Err(SqlSessionError::InvalidInput(format!(
                "query has {sites} placeholders but {} values were supplied",
                supplied.len()
            )));
        }

        tracing::trace!(sql = %out, "literal rewrite");
        Ok(RewrittenQuery {
            sql: out,
            values: Vec::new(),
        })
    }
}

fn params_len(params: &Params) -> usize {
    match params {
        Params::Positional(values) => values.len(),
        Params::Named(named) => named.len(),
    }
}
