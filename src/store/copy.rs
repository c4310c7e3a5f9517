//! Bulk loading through Postgres `COPY ... FROM STDIN`.

use super::{Store, quote_ident};
use crate::error::{Result, ResultExt as _, SheetError};
use polars::prelude::*;
use sqlx::postgres::{PgConnection, PgCopyIn};

/// Rows serialized per `COPY` message, keeping peak memory flat on large sheets.
pub const COPY_CHUNK_ROWS: usize = 10_000;

/// `COPY` statement with an explicit column list, so the CSV stream lines up
/// with the frame rather than with the table's physical order.
pub fn copy_statement(table_name: &str, columns: &[String]) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "COPY {} ({column_list}) FROM STDIN WITH (FORMAT csv, NULL '')",
        quote_ident(table_name)
    )
}

/// Serializes one slice of the frame as header-less CSV; nulls become empty
/// unquoted fields.
pub fn serialize_chunk(frame: &DataFrame, offset: usize, len: usize) -> Result<Vec<u8>> {
    let mut chunk = frame.slice(offset as i64, len);
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(false)
        .with_separator(b',')
        .with_null_value(String::new())
        .finish(&mut chunk)
        .context("Failed to serialize dataframe chunk to CSV")?;
    Ok(buf)
}

async fn abort_copy(writer: PgCopyIn<&mut PgConnection>, reason: &SheetError) {
    if let Err(e) = writer.abort(reason.to_string()).await {
        tracing::debug!("COPY abort acknowledged: {e}");
    }
}

/// Streams every row of `frame` into `table_name`.
///
/// The copy runs inside a transaction that commits only after the server
/// accepted the whole stream, so a failure leaves no rows behind.
///
/// # Errors
///
/// `Storage` when serialization fails or the server rejects the stream.
pub async fn bulk_load(store: &Store, table_name: &str, frame: &DataFrame) -> Result<u64> {
    let columns: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let statement = copy_statement(table_name, &columns);
    let height = frame.height();

    let mut tx = store.pool().begin().await?;
    let mut writer = tx
        .copy_in_raw(&statement)
        .await
        .context("Failed to initiate COPY command")?;

    for offset in (0..height).step_by(COPY_CHUNK_ROWS) {
        let len = COPY_CHUNK_ROWS.min(height - offset);

        let buf = match serialize_chunk(frame, offset, len) {
            Ok(buf) => buf,
            Err(e) => {
                abort_copy(writer, &e).await;
                return Err(e);
            }
        };

        if let Err(e) = writer.send(buf).await {
            let err = SheetError::from(e);
            abort_copy(writer, &err).await;
            return Err(err).context("Failed to send data chunk via COPY");
        }
    }

    let rows = writer
        .finish()
        .await
        .context("Failed to finish COPY command")?;
    tx.commit()
        .await
        .with_context(|| format!("Failed to commit bulk load into '{table_name}'"))?;

    tracing::info!("Copied {rows} rows into {table_name}");
    Ok(rows)
}
