//! Spreadsheet parsing into an in-memory text frame.
//!
//! A workbook carries two sheets: a key/value metadata sheet naming the region
//! and market, and a data sheet whose header sits below a fixed block of
//! title rows. Every cell is kept as text; typing happens later in SQL.

use super::naming::{sanitize_column_names, table_name};
use crate::config::ExtractSettings;
use crate::error::{Result, SheetError};
use calamine::{
    Data, ExcelDateTime, Range, Reader as _, Sheets, open_workbook_auto_from_rs,
};
use polars::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use uuid::Uuid;

/// Metadata key holding the dataset's region.
pub const REGION_KEY: &str = "region";
/// Metadata key holding the dataset's market name.
pub const MARKET_NAME_KEY: &str = "market name";

/// Number of characters in a generated dataset id.
const TABLE_ID_LEN: usize = 8;

type Workbook<'a> = Sheets<Cursor<&'a [u8]>>;

/// One parsed spreadsheet, ready to be materialized.
#[derive(Debug, Clone)]
pub struct ExtractedSheet {
    pub table_id: String,
    pub table_name: String,
    pub region: String,
    pub market_name: String,
    /// Sanitized columns, `Option<String>` cells, original row order.
    pub frame: DataFrame,
}

impl ExtractedSheet {
    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }
}

/// Generates a short random dataset id.
///
/// Collisions are not checked against the registry; the unique constraint on
/// the table name catches the rare one.
pub fn generate_table_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(TABLE_ID_LEN)
        .collect()
}

/// Parses a workbook held in memory.
///
/// # Errors
///
/// `InvalidInput` when the bytes are not a readable workbook, the data sheet
/// is missing, or no data remains after dropping empty rows and columns.
pub fn extract_workbook(bytes: &[u8], settings: &ExtractSettings) -> Result<ExtractedSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let metadata = read_metadata(&mut workbook, &settings.metadata_sheet)?;
    let region = metadata.get(REGION_KEY).cloned().unwrap_or_default();
    let market_name = metadata.get(MARKET_NAME_KEY).cloned().unwrap_or_default();

    let data_sheet = find_sheet(&workbook, &settings.data_sheet).ok_or_else(|| {
        SheetError::InvalidInput(format!("workbook has no '{}' sheet", settings.data_sheet))
    })?;
    let range = workbook.worksheet_range(&data_sheet)?;
    let (header, rows) = split_header(&range, settings.skip_rows)?;
    let frame = build_frame(&header, rows)?;

    let table_id = generate_table_id();
    let table_name = table_name(&region, &market_name, &table_id);

    tracing::debug!(
        "Extracted {} rows x {} columns for {table_name}",
        frame.height(),
        frame.width()
    );

    Ok(ExtractedSheet {
        table_id,
        table_name,
        region,
        market_name,
        frame,
    })
}

fn find_sheet(workbook: &Workbook<'_>, wanted: &str) -> Option<String> {
    workbook
        .sheet_names()
        .into_iter()
        .find(|name| name.trim().eq_ignore_ascii_case(wanted.trim()))
}

/// Reads the key/value metadata sheet. Keys are lowercased; rows missing a
/// key or a value are skipped.
fn read_metadata(workbook: &mut Workbook<'_>, sheet: &str) -> Result<HashMap<String, String>> {
    let Some(name) = find_sheet(workbook, sheet) else {
        tracing::warn!("Workbook has no '{sheet}' sheet, region and market name left empty");
        return Ok(HashMap::new());
    };

    let range = workbook.worksheet_range(&name)?;
    Ok(range
        .rows()
        .filter_map(|row| {
            let key = row.first().and_then(cell_text)?;
            let value = row.get(1).and_then(cell_text)?;
            Some((key.trim().to_lowercase(), value.trim().to_owned()))
        })
        .collect())
}

/// Converts a cell to its stored text form. Blank cells are missing values.
pub(crate) fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(dt) => Some(date_text(dt)),
        other => Some(other.to_string()),
    }
}

/// Date cells become ISO dates (`2023-07-16`, or `2023-07-16 12:00:00` with a
/// time part) and durations `H:MM:SS`, instead of the raw serial number.
fn date_text(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        if let Some(duration) = dt.as_duration() {
            let secs = duration.num_seconds();
            let sign = if secs < 0 { "-" } else { "" };
            let secs = secs.abs();
            return format!("{sign}{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
        }
    } else if let Some(datetime) = dt.as_datetime() {
        let format = if datetime.time() == chrono::NaiveTime::MIN {
            "%Y-%m-%d"
        } else {
            "%Y-%m-%d %H:%M:%S"
        };
        return datetime.format(format).to_string();
    }
    dt.to_string()
}

type TextRow = Vec<Option<String>>;

/// Skips the title block and returns `(header, data rows)`.
///
/// `skip_rows` counts from the top of the sheet, while calamine ranges start
/// at the first used cell, so the offset is adjusted by the range origin.
fn split_header(range: &Range<Data>, skip_rows: usize) -> Result<(TextRow, Vec<TextRow>)> {
    let origin = range.start().map_or(0, |(row, _)| row as usize);
    let skip = skip_rows.saturating_sub(origin);

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<TextRow>());
    let header = rows
        .nth(skip)
        .ok_or_else(|| SheetError::InvalidInput("data sheet has no header row".to_owned()))?;

    Ok((header, rows.collect()))
}

/// Builds the text frame: drops blank rows and all-empty columns, then
/// sanitizes the surviving headers.
pub(crate) fn build_frame(header: &[Option<String>], rows: Vec<TextRow>) -> Result<DataFrame> {
    let rows: Vec<TextRow> = rows
        .into_iter()
        .filter(|row| row.iter().any(Option::is_some))
        .collect();
    if rows.is_empty() {
        return Err(SheetError::InvalidInput(
            "the uploaded file contains no valid data".to_owned(),
        ));
    }

    let width = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let columns: Vec<Column> = (0..width)
        .map(|idx| {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| row.get(idx).cloned().flatten())
                .collect();
            Column::from(Series::new(format!("column_{idx}").into(), values))
        })
        .collect();

    let raw = DataFrame::new(columns)?;
    let (kept_headers, mut kept): (Vec<String>, Vec<Column>) = raw
        .take_columns()
        .into_iter()
        .enumerate()
        .filter(|(_, column)| column.null_count() < column.len())
        .map(|(idx, column)| {
            let header = header.get(idx).cloned().flatten().unwrap_or_default();
            (header, column)
        })
        .unzip();

    if kept.is_empty() {
        return Err(SheetError::InvalidInput(
            "the uploaded file contains no valid data".to_owned(),
        ));
    }

    for (column, name) in kept.iter_mut().zip(sanitize_column_names(&kept_headers)) {
        column.rename(name.into());
    }

    Ok(DataFrame::new(kept)?)
}
