//! Post-load metadata derivation.
//!
//! Once a dataset's rows are in place, this module computes the fields that
//! turn a provisional registry entry into an enriched one:
//!
//! - the distinct values of the `region` column,
//! - the segment hierarchy over every column whose name contains `segment`,
//!   in physical column order,
//! - the first and last year among the `year_dddd` columns.
//!
//! All four are written with a single `UPDATE`; if any step fails nothing is
//! written and the entry stays provisional.

pub mod hierarchy;

pub use hierarchy::{DistinctSource, SegmentTree, build_hierarchy};

use crate::error::{Result, ResultExt as _, SheetError};
use crate::ingest::naming::parse_year_column;
use crate::store::registry::{self, EntryState, TableMetadata};
use crate::store::{Store, quote_ident};

/// Column whose distinct values become the dataset's region list.
pub const REGION_COLUMN: &str = "region";
/// Keyword selecting hierarchy columns.
pub const SEGMENT_KEYWORD: &str = "segment";
/// Keyword selecting year columns.
pub const YEAR_KEYWORD: &str = "year";

/// [`DistinctSource`] backed by a physical dataset table.
pub struct PgDistinctSource<'a> {
    store: &'a Store,
    table_name: &'a str,
}

impl<'a> PgDistinctSource<'a> {
    pub fn new(store: &'a Store, table_name: &'a str) -> Self {
        Self { store, table_name }
    }
}

/// `SELECT DISTINCT` over one column with positional equality filters.
pub fn distinct_sql(table_name: &str, column: &str, filters: &[(String, String)]) -> String {
    let column = quote_ident(column);
    let mut conditions = vec![format!("{column} IS NOT NULL")];
    conditions.extend(
        filters
            .iter()
            .enumerate()
            .map(|(idx, (filter_column, _))| format!("{} = ${}", quote_ident(filter_column), idx + 1)),
    );
    format!(
        "SELECT DISTINCT {column} FROM {} WHERE {}",
        quote_ident(table_name),
        conditions.join(" AND ")
    )
}

impl DistinctSource for PgDistinctSource<'_> {
    async fn distinct(&mut self, column: &str, filters: &[(String, String)]) -> Result<Vec<String>> {
        let sql = distinct_sql(self.table_name, column, filters);
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for (_, value) in filters {
            query = query.bind(value.as_str());
        }
        query
            .fetch_all(self.store.pool())
            .await
            .with_context(|| format!("Failed to read distinct '{column}' from '{}'", self.table_name))
    }
}

/// Non-null distinct values of `column`, in whatever order the store returns.
pub async fn distinct_values(store: &Store, table_name: &str, column: &str) -> Result<Vec<String>> {
    PgDistinctSource::new(store, table_name)
        .distinct(column, &[])
        .await
}

/// Physical column names containing `keyword`, left to right.
pub async fn columns_like(store: &Store, table_name: &str, keyword: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT column_name::TEXT FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1 \
         AND strpos(column_name, $2) > 0 \
         ORDER BY ordinal_position",
    )
    .bind(table_name)
    .bind(keyword)
    .fetch_all(store.pool())
    .await
    .with_context(|| format!("Failed to list '{keyword}' columns of '{table_name}'"))
}

/// First and last year among the `year_dddd` names in `columns`.
///
/// # Errors
///
/// `InvalidInput` when no column is year-like.
pub fn year_range(columns: &[String]) -> Result<(i32, i32)> {
    let mut years: Vec<&String> = columns
        .iter()
        .filter(|c| parse_year_column(c).is_some())
        .collect();
    years.sort();

    let first = years.first().and_then(|c| parse_year_column(c));
    let last = years.last().and_then(|c| parse_year_column(c));
    match (first, last) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(SheetError::InvalidInput(
            "No year-based columns found.".to_owned(),
        )),
    }
}

/// Computes and stores derived metadata for a loaded dataset.
///
/// # Errors
///
/// `NotFound` when the entry or its table is missing, `InvalidInput` when
/// the table has no `region` or year columns, `Storage` for query failures.
pub async fn derive(store: &Store, table_id: &str) -> Result<TableMetadata> {
    let row = registry::fetch_row(store, table_id).await?;
    let table_name = row.table_name.as_str();

    if !store.table_exists(table_name).await? {
        return Err(SheetError::NotFound(format!(
            "Data table '{table_name}' for entry {table_id} does not exist"
        )));
    }

    let region_columns = columns_like(store, table_name, REGION_COLUMN).await?;
    if !region_columns.iter().any(|c| c == REGION_COLUMN) {
        return Err(SheetError::InvalidInput(format!(
            "table '{table_name}' has no '{REGION_COLUMN}' column"
        )));
    }
    let regions = distinct_values(store, table_name, REGION_COLUMN).await?;

    let segment_columns = columns_like(store, table_name, SEGMENT_KEYWORD).await?;
    let mut source = PgDistinctSource::new(store, table_name);
    let tree = build_hierarchy(&mut source, &segment_columns).await?;

    let year_columns = columns_like(store, table_name, YEAR_KEYWORD).await?;
    let (start_year, end_year) = year_range(&year_columns)?;

    let updated = sqlx::query(
        "UPDATE meta_table SET region = $1, segment_subsegment = $2, \
         start_year = $3, end_year = $4 WHERE id = $5",
    )
    .bind(serde_json::to_string(&regions)?)
    .bind(serde_json::to_string(&tree)?)
    .bind(start_year)
    .bind(end_year)
    .bind(table_id)
    .execute(store.pool())
    .await
    .context("Error saving metadata")?;

    if updated.rows_affected() == 0 {
        return Err(SheetError::NotFound(format!("Table not found: {table_id}")));
    }

    tracing::info!(
        "Enriched {table_name}: {} regions, {} segment levels over {} top-level values, years {start_year}-{end_year}",
        regions.len(),
        segment_columns.len(),
        tree.len()
    );

    Ok(TableMetadata {
        id: row.id,
        table_name: row.table_name,
        region: regions,
        segment_subsegment: tree,
        start_year: Some(start_year),
        end_year: Some(end_year),
        created_at: row.created_at,
        state: EntryState::Enriched,
    })
}

/// Recomputes derived metadata for an existing entry, e.g. one left
/// provisional by an earlier failure.
pub async fn refresh(store: &Store, table_id: &str) -> Result<TableMetadata> {
    tracing::info!("Refreshing metadata for {table_id}");
    derive(store, table_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| (*c).to_owned()).collect()
    }

    #[test]
    fn test_year_range() {
        assert_eq!(
            year_range(&names(&["year_2020", "year_2021"])).ok(),
            Some((2020, 2021))
        );
        assert_eq!(
            year_range(&names(&["year_2024", "year_2019", "yearly_note", "year_2022"])).ok(),
            Some((2019, 2024))
        );
        assert_eq!(year_range(&names(&["year_2030"])).ok(), Some((2030, 2030)));
    }

    #[test]
    fn test_year_range_requires_year_columns() {
        let err = year_range(&names(&["yearly_note"])).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(year_range(&[]).is_err());
    }

    #[test]
    fn test_distinct_sql() {
        assert_eq!(
            distinct_sql("t", "segment", &[]),
            "SELECT DISTINCT \"segment\" FROM \"t\" WHERE \"segment\" IS NOT NULL"
        );
        let filters = vec![
            ("segment".to_owned(), "Cars".to_owned()),
            ("sub_segment".to_owned(), "EV".to_owned()),
        ];
        assert_eq!(
            distinct_sql("t", "sub_sub_segment", &filters),
            "SELECT DISTINCT \"sub_sub_segment\" FROM \"t\" WHERE \"sub_sub_segment\" IS NOT NULL \
             AND \"segment\" = $1 AND \"sub_segment\" = $2"
        );
    }
}
