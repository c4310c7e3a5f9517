//! End-to-end upload flows.
//!
//! A single spreadsheet runs through extract → materialize → bulk load →
//! derive, and the caller gets one combined outcome. An archive runs that
//! same flow once per member and collects the per-member results.
//!
//! Materialization and loading are separate transactions. If the load or the
//! derivation fails, the table and its provisional registry row stay behind;
//! [`crate::metadata::refresh`] can enrich such an entry later.

use crate::config::ExtractSettings;
use crate::error::{Result, ResultExt as _, SheetError};
use crate::ingest::{self, ArchiveReport, UploadKind};
use crate::metadata;
use crate::store::{self, Store};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Data uploaded successfully";

/// Result of one successfully uploaded spreadsheet.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub message: String,
    pub table_id: String,
    pub table_name: String,
    pub rows: u64,
}

/// Either flow's result, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    Single(UploadResponse),
    Archive(ArchiveReport<UploadResponse>),
}

impl UploadOutcome {
    pub fn is_complete_success(&self) -> bool {
        match self {
            Self::Single(_) => true,
            Self::Archive(report) => report.is_complete_success(),
        }
    }
}

/// Uploads one spreadsheet held in memory.
///
/// `name` is only used for logging.
pub async fn upload_spreadsheet(
    store: &Store,
    settings: &ExtractSettings,
    name: &str,
    bytes: &[u8],
) -> Result<UploadResponse> {
    let started = Instant::now();
    let sheet = ingest::extract_workbook(bytes, settings)
        .with_context(|| format!("Failed to extract '{name}'"))?;
    let columns = sheet.columns();
    tracing::info!(
        "Extracted '{name}': {} rows, {} columns -> {}",
        sheet.row_count(),
        columns.len(),
        sheet.table_name
    );

    store::materialize(store, &sheet.table_id, &sheet.table_name, &columns).await?;

    let rows = store::bulk_load(store, &sheet.table_name, &sheet.frame)
        .await
        .inspect_err(|e| {
            tracing::warn!("Entry {} left provisional after load failure: {e}", sheet.table_id);
        })?;

    metadata::derive(store, &sheet.table_id)
        .await
        .inspect_err(|e| {
            tracing::warn!(
                "Entry {} left provisional after derivation failure: {e}",
                sheet.table_id
            );
        })?;

    tracing::info!(
        "Uploaded '{name}' as {} in {:?}",
        sheet.table_name,
        started.elapsed()
    );

    Ok(UploadResponse {
        message: UPLOAD_SUCCESS_MESSAGE.to_owned(),
        table_id: sheet.table_id,
        table_name: sheet.table_name,
        rows,
    })
}

/// Uploads every spreadsheet member of a ZIP held in memory.
///
/// # Errors
///
/// `InvalidInput` only when the archive itself is unusable. Member failures
/// are reported in [`ArchiveReport::failed`].
pub async fn upload_archive(
    store: &Store,
    settings: &ExtractSettings,
    bytes: &[u8],
) -> Result<ArchiveReport<UploadResponse>> {
    let members = ingest::expand_archive(bytes)?;

    let report = ingest::process_members(members, |name, contents| async move {
        upload_spreadsheet(store, settings, &name, &contents).await
    })
    .await;

    tracing::info!(
        "Archive processed: {} uploaded, {} failed",
        report.uploaded.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Reads a file from disk and dispatches on its extension.
///
/// # Errors
///
/// `InvalidInput` for extensions other than spreadsheets and `.zip`, `Storage`
/// when the file cannot be read, otherwise whatever the chosen flow reports.
pub async fn upload_path(
    store: &Store,
    settings: &ExtractSettings,
    path: &Path,
) -> Result<UploadOutcome> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let Some(kind) = UploadKind::from_file_name(&name) else {
        return Err(SheetError::InvalidInput(format!(
            "disallowed file type: '{name}'"
        )));
    };

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    match kind {
        UploadKind::Spreadsheet => upload_spreadsheet(store, settings, &name, &bytes)
            .await
            .map(UploadOutcome::Single),
        UploadKind::Archive => upload_archive(store, settings, &bytes)
            .await
            .map(UploadOutcome::Archive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::MemberFailure;
    use anyhow::Result;

    fn response(id: &str) -> UploadResponse {
        UploadResponse {
            message: UPLOAD_SUCCESS_MESSAGE.to_owned(),
            table_id: id.to_owned(),
            table_name: format!("eu_cars_{id}"),
            rows: 3,
        }
    }

    #[test]
    fn test_single_outcome_serializes_flat() -> Result<()> {
        let value = serde_json::to_value(UploadOutcome::Single(response("ab12cd34")))?;
        assert_eq!(value["message"], "Data uploaded successfully");
        assert_eq!(value["table_name"], "eu_cars_ab12cd34");
        assert_eq!(value["rows"], 3);
        Ok(())
    }

    #[test]
    fn test_archive_outcome_reports_failures() -> Result<()> {
        let outcome = UploadOutcome::Archive(ArchiveReport {
            extracted: vec!["a.xlsx".to_owned(), "b.xlsx".to_owned()],
            uploaded: vec![response("ab12cd34")],
            failed: vec![MemberFailure {
                member: "b.xlsx".to_owned(),
                error: "Invalid input: the uploaded file contains no valid data".to_owned(),
            }],
        });
        assert!(!outcome.is_complete_success());

        let value = serde_json::to_value(&outcome)?;
        assert_eq!(value["extracted"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["failed"][0]["member"], "b.xlsx");
        Ok(())
    }
}
