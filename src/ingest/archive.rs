//! ZIP bundle expansion with per-member failure isolation.

use crate::error::{Result, SheetError};
use serde::Serialize;
use std::future::Future;
use std::io::{Cursor, Read as _};

/// File extensions treated as spreadsheets, compared case-insensitively.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// True when `name` ends in one of [`SPREADSHEET_EXTENSIONS`].
pub fn is_spreadsheet_name(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// A qualifying archive member, decompressed or with the reason it could not be.
#[derive(Debug)]
pub struct ArchiveMember {
    pub name: String,
    pub contents: Result<Vec<u8>>,
}

/// Per-member failure reported back to the caller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MemberFailure {
    pub member: String,
    pub error: String,
}

/// Outcome of processing a bundle.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport<T> {
    /// Every qualifying member, in archive order.
    pub extracted: Vec<String>,
    pub uploaded: Vec<T>,
    pub failed: Vec<MemberFailure>,
}

impl<T> ArchiveReport<T> {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn is_skipped_entry(name: &str) -> bool {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    name.starts_with("__MACOSX/") || file_name.starts_with("~$")
}

/// Lists and decompresses the spreadsheet members of a ZIP held in memory.
///
/// # Errors
///
/// `InvalidInput` when the bytes are not a ZIP archive or hold no spreadsheet
/// members. A member that cannot be opened or decompressed is recorded with
/// its error instead.
pub fn expand_archive(bytes: &[u8]) -> Result<Vec<ArchiveMember>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut members = Vec::new();

    for idx in 0..archive.len() {
        let Some(name) = archive.name_for_index(idx).map(str::to_owned) else {
            continue;
        };
        if name.ends_with('/') || is_skipped_entry(&name) || !is_spreadsheet_name(&name) {
            continue;
        }

        // Encrypted or unsupported entries fail to open; they are still
        // members of the batch and get reported as such.
        let contents = match archive.by_index(idx) {
            Ok(mut entry) => {
                let mut buf = Vec::new();
                match entry.read_to_end(&mut buf) {
                    Ok(_) => Ok(buf),
                    Err(e) => Err(SheetError::InvalidInput(format!(
                        "failed to decompress '{name}': {e}"
                    ))),
                }
            }
            Err(e) => Err(SheetError::InvalidInput(format!(
                "cannot open archive member '{name}': {e}"
            ))),
        };
        members.push(ArchiveMember { name, contents });
    }

    if members.is_empty() {
        return Err(SheetError::InvalidInput(
            "archive contains no spreadsheet files".to_owned(),
        ));
    }

    tracing::info!("Archive expanded into {} spreadsheet members", members.len());
    Ok(members)
}

/// Runs `handler` for every member in order, collecting successes and
/// failures. A failing member never stops the remaining ones.
pub async fn process_members<T, F, Fut>(
    members: Vec<ArchiveMember>,
    mut handler: F,
) -> ArchiveReport<T>
where
    F: FnMut(String, Vec<u8>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut report = ArchiveReport {
        extracted: members.iter().map(|m| m.name.clone()).collect(),
        uploaded: Vec::new(),
        failed: Vec::new(),
    };

    for member in members {
        let outcome = match member.contents {
            Ok(bytes) => handler(member.name.clone(), bytes).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => report.uploaded.push(value),
            Err(e) => {
                tracing::error!("Archive member '{}' failed: {e}", member.name);
                report.failed.push(MemberFailure {
                    member: member.name,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}
