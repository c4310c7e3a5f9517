//! Turning uploaded bytes into sanitized, in-memory tables.
//!
//! - [`naming`]: identifier sanitization shared by every generated name
//! - [`extract`]: workbook parsing into a polars text frame
//! - [`archive`]: ZIP expansion with per-member failure isolation

pub mod archive;
pub mod extract;
pub mod naming;

pub use archive::{ArchiveMember, ArchiveReport, MemberFailure, expand_archive, process_members};
pub use extract::{ExtractedSheet, extract_workbook, generate_table_id};
pub use naming::{sanitize_column_name, sanitize_identifier};

/// What kind of upload a file name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Spreadsheet,
    Archive,
}

impl UploadKind {
    /// Classifies an upload by file name; `None` for disallowed types.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if archive::is_spreadsheet_name(name) {
            return Some(Self::Spreadsheet);
        }
        let is_zip = std::path::Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        is_zip.then_some(Self::Archive)
    }
}
