//! Centralized error handling for sheetstore.
//!
//! Every fallible library operation returns [`Result<T>`], whose error side is
//! the [`SheetError`] taxonomy:
//!
//! - [`SheetError::NotFound`]: a registry entry or physical table is absent
//! - [`SheetError::InvalidInput`]: the upload itself is unusable (no data rows,
//!   no year-like columns, malformed archive, disallowed file type)
//! - [`SheetError::Conflict`]: a generated table name already exists
//! - [`SheetError::Storage`]: table creation, bulk load or a query failed in
//!   the underlying store
//!
//! ## Conversions
//!
//! `From` impls let `?` classify foreign errors. The sqlx conversion inspects
//! the Postgres SQLSTATE so that name collisions surface as `Conflict`:
//!
//! ```no_run
//! use sheetstore::error::{Result, SheetError};
//!
//! fn check(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(SheetError::InvalidInput("empty table name".to_owned()));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Context Extension Trait
//!
//! [`ResultExt`] prefixes a message onto an error without losing its
//! category:
//!
//! ```no_run
//! use sheetstore::error::ResultExt as _;
//!
//! fn read(path: &str) -> sheetstore::error::Result<Vec<u8>> {
//!     std::fs::read(path).with_context(|| format!("Failed to read {path}"))
//! }
//! ```

use thiserror::Error;

/// SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for `duplicate_table`.
const PG_DUPLICATE_TABLE: &str = "42P07";

/// Main error type for sheetstore operations.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Registry entry or table absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The upload or request cannot be processed as given
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generated table name collides with an existing one
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Failure reported by the relational store or while preparing data for it
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Local I/O (reading the uploaded file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SheetError {
    /// Short machine-friendly name of the category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage_failure",
            Self::Io(_) => "io",
        }
    }

    /// Rebuilds the same category with a new message.
    fn with_message(self, msg: String) -> Self {
        match self {
            Self::NotFound(_) => Self::NotFound(msg),
            Self::InvalidInput(_) => Self::InvalidInput(msg),
            Self::Conflict(_) => Self::Conflict(msg),
            Self::Storage(_) | Self::Io(_) => Self::Storage(msg),
        }
    }

    /// Message without the category prefix added by `Display`.
    fn detail(&self) -> String {
        match self {
            Self::NotFound(m) | Self::InvalidInput(m) | Self::Conflict(m) | Self::Storage(m) => {
                m.clone()
            }
            Self::Io(e) => e.to_string(),
        }
    }
}

impl From<sqlx::Error> for SheetError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(PG_UNIQUE_VIOLATION | PG_DUPLICATE_TABLE) => {
                    Self::Conflict(db.message().to_owned())
                }
                _ => Self::Storage(err.to_string()),
            },
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<polars::error::PolarsError> for SheetError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<calamine::Error> for SheetError {
    fn from(err: calamine::Error) -> Self {
        Self::InvalidInput(format!("unreadable spreadsheet: {err}"))
    }
}

impl From<zip::result::ZipError> for SheetError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::InvalidInput(format!("malformed archive: {err}"))
    }
}

impl From<serde_json::Error> for SheetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("corrupt stored metadata: {err}"))
    }
}

// Collaborators that speak plain strings (HTTP layers, CLI output)
impl From<SheetError> for String {
    fn from(err: SheetError) -> Self {
        err.to_string()
    }
}

/// Result type alias for sheetstore operations.
pub type Result<T> = std::result::Result<T, SheetError>;

/// Extension trait to add context to results while keeping the error category.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SheetError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: SheetError = e.into();
            let detail = format!("{}: {}", msg.into(), err.detail());
            err.with_message(detail)
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: SheetError = e.into();
            let detail = format!("{}: {}", f(), err.detail());
            err.with_message(detail)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SheetError::InvalidInput("no data rows".to_owned());
        assert_eq!(err.to_string(), "Invalid input: no data rows");
    }

    #[test]
    fn test_error_conversion_to_string() {
        let err = SheetError::NotFound("table abc123".to_owned());
        let s: String = err.into();
        assert_eq!(s, "Not found: table abc123");
    }

    #[test]
    fn test_context_keeps_category() {
        let result: std::result::Result<(), SheetError> =
            Err(SheetError::Conflict("duplicate table".to_owned()));

        let err = result.context("Failed to create table").unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert_eq!(
            err.to_string(),
            "Conflict: Failed to create table: duplicate table"
        );
    }

    #[test]
    fn test_io_context_becomes_storage() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file.xlsx",
        ));

        let err = result.context("Failed to read upload").unwrap_err();
        assert!(err.to_string().contains("Failed to read upload"));
        assert!(err.to_string().contains("file.xlsx"));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: SheetError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), "not_found");
    }
}
