//! Per-segment yearly sums for plotting.
//!
//! Year columns are rediscovered from the live table on every request, so a
//! dataset whose registry entry is still provisional can be graphed too.

use crate::error::{Result, ResultExt as _, SheetError};
use crate::ingest::naming::parse_year_column;
use crate::metadata::{REGION_COLUMN, SEGMENT_KEYWORD};
use crate::store::{Store, quote_ident, registry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::{Column as _, Row as _};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphRequest {
    pub table_id: String,
    pub region: String,
}

/// One year of the series: `{"year": "2020", "<segment>": <sum>, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearPoint {
    pub year: String,
    #[serde(flatten)]
    pub values: IndexMap<String, Option<f64>>,
}

/// A year column paired with the 4-digit key it contributes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearColumn {
    pub column: String,
    pub year: String,
}

/// Year columns among `columns`, left to right.
pub fn year_columns<S: AsRef<str>>(columns: &[S]) -> Vec<YearColumn> {
    columns
        .iter()
        .filter_map(|c| {
            let column = c.as_ref();
            parse_year_column(column).map(|year| YearColumn {
                column: column.to_owned(),
                year: year.to_string(),
            })
        })
        .collect()
}

/// Cell text that casts cleanly to `NUMERIC`: plain decimals with an
/// optional sign and exponent.
pub const NUMERIC_PATTERN: &str = r"^[-+]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][-+]?[0-9]+)?$";

/// Grouped-sum query; `$1` is the region.
///
/// Cells that are blank or not numbers (`n/a`, `-`, `1,200`) are treated as
/// missing, so one stray marker cannot fail the whole query.
pub fn aggregation_sql(table_name: &str, years: &[YearColumn]) -> String {
    let segment = quote_ident(SEGMENT_KEYWORD);
    let sums = years
        .iter()
        .map(|y| {
            let col = quote_ident(&y.column);
            format!(
                "ROUND(SUM(CASE WHEN TRIM({col}) ~ '{NUMERIC_PATTERN}' \
                 THEN TRIM({col})::NUMERIC END), 3)::FLOAT8 AS {col}"
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {segment}, {sums} FROM {} WHERE {} = $1 AND {segment} IS NOT NULL GROUP BY {segment}",
        quote_ident(table_name),
        quote_ident(REGION_COLUMN),
    )
}

/// Turns `(segment, sums)` rows into one point per year.
///
/// Years appear in order of first encounter. When two columns share a year,
/// the later column wins for each segment.
pub fn pivot_rows(years: &[YearColumn], rows: Vec<(String, Vec<Option<f64>>)>) -> Vec<YearPoint> {
    let mut points: IndexMap<&str, IndexMap<String, Option<f64>>> = IndexMap::new();

    for (segment, sums) in rows {
        for (year, value) in years.iter().zip(sums) {
            points
                .entry(year.year.as_str())
                .or_default()
                .insert(segment.clone(), value);
        }
    }

    points
        .into_iter()
        .map(|(year, values)| YearPoint {
            year: year.to_owned(),
            values,
        })
        .collect()
}

async fn sample_columns(store: &Store, table_name: &str) -> Result<Vec<String>> {
    let sample = sqlx::query(&format!("SELECT * FROM {} LIMIT 1", quote_ident(table_name)))
        .fetch_optional(store.pool())
        .await
        .with_context(|| format!("Failed to sample '{table_name}'"))?;

    let Some(row) = sample else {
        return Err(SheetError::InvalidInput(format!(
            "table '{table_name}' has no rows"
        )));
    };
    Ok(row.columns().iter().map(|c| c.name().to_owned()).collect())
}

/// Sums every year column per segment for one region.
///
/// # Errors
///
/// `NotFound` for an unknown id, `InvalidInput` when the table is empty or
/// lacks year, `segment` or `region` columns.
pub async fn graph_data(store: &Store, request: &GraphRequest) -> Result<Vec<YearPoint>> {
    let entry = registry::fetch_row(store, &request.table_id).await?;
    let table_name = entry.table_name.as_str();

    let columns = sample_columns(store, table_name).await?;
    let years = year_columns(columns.as_slice());
    if years.is_empty() {
        return Err(SheetError::InvalidInput(
            "No year-based columns found.".to_owned(),
        ));
    }
    for required in [SEGMENT_KEYWORD, REGION_COLUMN] {
        if !columns.iter().any(|c| c == required) {
            return Err(SheetError::InvalidInput(format!(
                "table '{table_name}' has no '{required}' column"
            )));
        }
    }

    let rows = sqlx::query(&aggregation_sql(table_name, &years))
        .bind(&request.region)
        .fetch_all(store.pool())
        .await
        .with_context(|| format!("Failed to aggregate '{table_name}'"))?;

    let mut grouped = Vec::with_capacity(rows.len());
    for row in &rows {
        let segment: String = row.try_get(0)?;
        let sums = (1..=years.len())
            .map(|idx| row.try_get::<Option<f64>, _>(idx))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        grouped.push((segment, sums));
    }

    tracing::debug!(
        "Aggregated {} segments over {} year columns in {table_name}",
        grouped.len(),
        years.len()
    );
    Ok(pivot_rows(&years, grouped))
}
