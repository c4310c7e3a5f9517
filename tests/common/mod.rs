//! Fixture builders shared by the integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use std::io::{Cursor, Write as _};
use zip::write::SimpleFileOptions;

/// Title rows written above the data header, matching the default settings.
pub const TITLE_ROWS: u32 = 5;

/// A workbook with a key/value `Metadata` sheet and a `Data` sheet.
pub struct SheetFixture<'a> {
    pub metadata: Vec<(&'a str, &'a str)>,
    pub header: Vec<&'a str>,
    pub rows: Vec<Vec<&'a str>>,
}

impl<'a> SheetFixture<'a> {
    pub fn new(region: &'a str, market: &'a str) -> Self {
        Self {
            metadata: vec![("Region", region), ("Market Name", market)],
            header: vec!["Region", "Segment", "Sub Segment", "2020", "2021"],
            rows: Vec::new(),
        }
    }

    pub fn header(mut self, header: &[&'a str]) -> Self {
        self.header = header.to_vec();
        self
    }

    pub fn row(mut self, cells: &[&'a str]) -> Self {
        self.rows.push(cells.to_vec());
        self
    }

    /// Serializes the workbook. Numeric-looking cells are written as numbers,
    /// the way a spreadsheet application stores them.
    pub fn to_xlsx(&self) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();

        let meta = workbook.add_worksheet();
        meta.set_name("Metadata")?;
        for (idx, (key, value)) in self.metadata.iter().enumerate() {
            let r = u32::try_from(idx).unwrap_or(u32::MAX);
            meta.write_string(r, 0, *key)?;
            meta.write_string(r, 1, *value)?;
        }

        let data = workbook.add_worksheet();
        data.set_name("Data")?;
        data.write_string(0, 0, "Market report")?;
        data.write_string(2, 0, "Values in USD million")?;
        write_row(data, TITLE_ROWS, &self.header)?;
        for (idx, cells) in self.rows.iter().enumerate() {
            let r = TITLE_ROWS + 1 + u32::try_from(idx).unwrap_or(u32::MAX - TITLE_ROWS - 1);
            write_row(data, r, cells)?;
        }

        workbook.save_to_buffer()
    }
}

fn write_row(sheet: &mut Worksheet, row: u32, cells: &[&str]) -> Result<(), XlsxError> {
    for (idx, cell) in cells.iter().enumerate() {
        let col = u16::try_from(idx).unwrap_or(u16::MAX);
        if cell.is_empty() {
            continue;
        }
        match cell.parse::<f64>() {
            Ok(number) => sheet.write_number(row, col, number)?,
            Err(_) => sheet.write_string(row, col, *cell)?,
        };
    }
    Ok(())
}

/// The three-row car market used across tests.
pub fn car_market(region: &str) -> SheetFixture<'_> {
    SheetFixture::new(region, "Passenger Cars")
        .row(&[region, "Cars", "EV", "10", "12"])
        .row(&[region, "Cars", "ICE", "20", "18.5"])
        .row(&[region, "Bikes", "E-Bike", "5", ""])
}

/// Builds a ZIP archive in memory.
pub fn zip_of(entries: &[(&str, Vec<u8>)]) -> anyhow::Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default())?;
        writer.write_all(data)?;
    }
    Ok(writer.finish()?.into_inner())
}
