//! Physical table creation for a new dataset.

use super::{Store, quote_ident};
use crate::error::{Result, ResultExt as _, SheetError};
use crate::ingest::naming::{ROW_KEY_COLUMN, is_usable_identifier};

/// Builds the `CREATE TABLE` statement: a serial row key followed by one
/// `TEXT` column per data column.
///
/// Names are embedded in the statement text rather than bound, so only
/// sanitizer output should reach this function.
pub fn create_table_sql(table_name: &str, columns: &[String]) -> String {
    let mut definitions = vec![format!("{} SERIAL PRIMARY KEY", quote_ident(ROW_KEY_COLUMN))];
    definitions.extend(columns.iter().map(|c| format!("{} TEXT", quote_ident(c))));
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(table_name),
        definitions.join(", ")
    )
}

fn validate_names(table_name: &str, columns: &[String]) -> Result<()> {
    if !is_usable_identifier(table_name) {
        return Err(SheetError::InvalidInput(format!(
            "unusable table name '{table_name}'"
        )));
    }
    if columns.is_empty() {
        return Err(SheetError::InvalidInput(
            "cannot create a table without data columns".to_owned(),
        ));
    }
    if let Some(bad) = columns
        .iter()
        .find(|c| !is_usable_identifier(c) || c.as_str() == ROW_KEY_COLUMN)
    {
        return Err(SheetError::InvalidInput(format!(
            "unusable column name '{bad}'"
        )));
    }
    Ok(())
}

/// Creates the dataset table and its provisional registry entry in one
/// transaction.
///
/// Either both exist afterwards or neither does.
///
/// # Errors
///
/// `Conflict` when the table name is already taken, `Storage` for any other
/// database failure, `InvalidInput` for degenerate names.
pub async fn materialize(
    store: &Store,
    table_id: &str,
    table_name: &str,
    columns: &[String],
) -> Result<()> {
    validate_names(table_name, columns)?;

    let mut tx = store.pool().begin().await?;

    sqlx::query(&create_table_sql(table_name, columns))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Error creating table '{table_name}'"))?;

    sqlx::query("INSERT INTO meta_table (id, table_name) VALUES ($1, $2)")
        .bind(table_id)
        .bind(table_name)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Error registering table '{table_name}'"))?;

    // Dropping `tx` on the error paths above rolls both statements back.
    tx.commit()
        .await
        .with_context(|| format!("Error committing table '{table_name}'"))?;

    tracing::info!(
        "Created table {table_name} with {} text columns (id {table_id})",
        columns.len()
    );
    Ok(())
}
