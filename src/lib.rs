//! Single-connection SQL sessions with uniform placeholders.
//!
//! A [`Session`] owns one backend connection and accepts the same placeholder syntax whatever
//! the backend underneath: positional `?`, raw `??` and named `:name`. Queries with bind values
//! run through a per-session prepared statement cache, and [`Session::fetch`] lets any number
//! of row-by-row loops over different (query, parameters) pairs run interleaved on the same
//! connection.
//!
//! ```rust
//! use sql_session::prelude::*;
//!
//! # fn main() -> Result<(), SqlSessionError> {
//! let mut db = Session::with_backend(MemoryBackend::new(), SessionOptions::default())?;
//! db.query(
//!     "INSERT INTO users SET id = :id, name = :name",
//!     NamedParams::new().with("id", 1).with("name", "O'Reilly"),
//! )?;
//! let row = db.fetch_one("SELECT * FROM users WHERE name = ?", vec![RowValues::from("O'Reilly")])?;
//! assert_eq!(row.unwrap().get("id"), Some(&RowValues::Int(1)));
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod bind;
pub mod config;
pub mod cursor;
pub mod error;
pub mod memory;
pub mod placeholders;
pub mod prelude;
pub mod results;
pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod statement_cache;
pub mod types;

pub use backend::{Backend, standard_escape};
pub use bind::{BindSpec, BindType, IntoBindTypes};
pub use config::{ConnectOptions, ConnectOptionsBuilder, SessionOptions};
pub use error::SqlSessionError;
pub use memory::MemoryBackend;
pub use placeholders::{BindingMode, PlaceholderStrategy, RewrittenQuery};
pub use results::{CustomDbRow, QueryOutcome, ResultSet};
pub use session::{BoundCall, Session};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
pub use types::{BackendKind, NamedParams, Params, RowValues};
