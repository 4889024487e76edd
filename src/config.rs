use serde::{Deserialize, Serialize};

use crate::error::SqlSessionError;
use crate::placeholders::BindingMode;

const DEFAULT_PORT: u16 = 3306;
pub(crate) const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;

/// Where and how to connect.
///
/// Networked backends use every field; `SQLite` only reads `database` (a file path or
/// `:memory:`) and the in-memory backend reads nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            port: DEFAULT_PORT,
        }
    }
}

impl ConnectOptions {
    /// Options with only `database` set.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Start a builder for networked backends.
    #[must_use]
    pub fn builder(database: impl Into<String>) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(database)
    }

    /// Parse options from a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::ConfigError` if the document is not valid.
    pub fn from_json(json: &str) -> Result<Self, SqlSessionError> {
        serde_json::from_str(json)
            .map_err(|e| SqlSessionError::ConfigError(format!("invalid connect options: {e}")))
    }
}

/// Fluent builder for [`ConnectOptions`].
#[derive(Debug, Clone)]
pub struct ConnectOptionsBuilder {
    opts: ConnectOptions,
}

impl ConnectOptionsBuilder {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            opts: ConnectOptions::new(database),
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = host.into();
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.opts.user = user.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = password.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    /// Build the options.
    #[must_use]
    pub fn finish(self) -> ConnectOptions {
        self.opts
    }
}

/// Per-session behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub binding_mode: BindingMode,
    /// Upper bound on cached prepared statements; the least recently used is evicted beyond it.
    pub statement_cache_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            binding_mode: BindingMode::default(),
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
        }
    }
}

impl SessionOptions {
    /// Choose between native binding and literal substitution.
    #[must_use]
    pub fn with_binding_mode(mut self, binding_mode: BindingMode) -> Self {
        self.binding_mode = binding_mode;
        self
    }

    /// Bound the prepared statement cache; must be at least 1.
    #[must_use]
    pub fn with_statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// # Errors
    ///
    /// Returns `SqlSessionError::ConfigError` for a zero cache capacity.
    pub fn validate(&self) -> Result<(), SqlSessionError> {
        if self.statement_cache_capacity == 0 {
            return Err(SqlSessionError::ConfigError(
                "statement_cache_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
