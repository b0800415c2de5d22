//! `conesim-dataset` – recorded driving sessions.
//!
//! # Modules
//!
//! - [`session`] – [`SessionDatabase`][session::SessionDatabase]: one SQLite
//!   file per session, one table per message stream.
//! - [`integrity`] – [`IntegrityChecker`][integrity::IntegrityChecker]: flags
//!   sessions whose expected streams are missing or empty.

use thiserror::Error;

pub mod integrity;
pub mod session;

pub use integrity::{DEFAULT_STREAMS, Finding, IntegrityChecker, IntegrityReport};
pub use session::SessionDatabase;

/// Errors from session database access.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stream `{0}` not found")]
    MissingStream(String),
    #[error("invalid stream id `{0}`")]
    InvalidStream(String),
}
