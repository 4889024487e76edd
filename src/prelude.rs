//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::backend::Backend;
pub use crate::bind::BindType;
pub use crate::config::{ConnectOptions, SessionOptions};
pub use crate::error::SqlSessionError;
pub use crate::memory::MemoryBackend;
pub use crate::placeholders::BindingMode;
pub use crate::results::{CustomDbRow, QueryOutcome, ResultSet};
pub use crate::session::{BoundCall, Session};
pub use crate::types::{BackendKind, NamedParams, Params, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteBackend;
