//! Reads of the dataset registry (`meta_table`).

use super::Store;
use crate::error::{Result, SheetError};
use crate::metadata::SegmentTree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw registry row as stored; derived fields are serialized JSON text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegistryRow {
    pub id: String,
    pub table_name: String,
    pub region: Option<String>,
    pub segment_subsegment: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Table created, derived metadata not yet written.
    Provisional,
    Enriched,
}

impl RegistryRow {
    pub fn state(&self) -> EntryState {
        if self.start_year.is_some() && self.region.is_some() {
            EntryState::Enriched
        } else {
            EntryState::Provisional
        }
    }
}

/// Registry entry with its derived fields decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableMetadata {
    pub id: String,
    pub table_name: String,
    pub region: Vec<String>,
    pub segment_subsegment: SegmentTree,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub state: EntryState,
}

impl TryFrom<RegistryRow> for TableMetadata {
    type Error = SheetError;

    fn try_from(row: RegistryRow) -> Result<Self> {
        let state = row.state();
        let region = match row.region.as_deref() {
            Some(json) => serde_json::from_str(json)?,
            None => Vec::new(),
        };
        let segment_subsegment = match row.segment_subsegment.as_deref() {
            Some(json) => serde_json::from_str(json)?,
            None => SegmentTree::default(),
        };

        Ok(Self {
            id: row.id,
            table_name: row.table_name,
            region,
            segment_subsegment,
            start_year: row.start_year,
            end_year: row.end_year,
            created_at: row.created_at,
            state,
        })
    }
}

/// Request body for region listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionsRequest {
    pub table_id: String,
}

const SELECT_ENTRY: &str = "SELECT id, table_name, region, segment_subsegment, start_year, \
                            end_year, created_at FROM meta_table";

/// Loads the raw registry row.
///
/// # Errors
///
/// `NotFound` when no entry has this id.
pub async fn fetch_row(store: &Store, table_id: &str) -> Result<RegistryRow> {
    sqlx::query_as::<_, RegistryRow>(&format!("{SELECT_ENTRY} WHERE id = $1"))
        .bind(table_id)
        .fetch_optional(store.pool())
        .await?
        .ok_or_else(|| SheetError::NotFound(format!("Table not found: {table_id}")))
}

/// Registry entry with `region` and `segment_subsegment` decoded.
pub async fn fetch(store: &Store, table_id: &str) -> Result<TableMetadata> {
    fetch_row(store, table_id).await?.try_into()
}

/// All registry entries, newest first.
pub async fn list(store: &Store) -> Result<Vec<TableMetadata>> {
    let rows = sqlx::query_as::<_, RegistryRow>(&format!(
        "{SELECT_ENTRY} ORDER BY created_at DESC, id"
    ))
    .fetch_all(store.pool())
    .await?;

    rows.into_iter().map(TableMetadata::try_from).collect()
}

/// Stored region list for a dataset; empty while the entry is provisional.
pub async fn regions(store: &Store, request: &RegionsRequest) -> Result<Vec<String>> {
    Ok(fetch(store, &request.table_id).await?.region)
}
