use std::io::Write;
use std::path::Path;

use chrono::SecondsFormat;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::domain::comparison::ComparisonTable;
use crate::domain::meter::BUCKET_START_COLUMN;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode comparison csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush comparison csv: {0}")]
    Buffer(String),
    #[error("failed to write comparison csv to {path}: {error}")]
    Io {
        path: String,
        #[source]
        error: std::io::Error,
    },
}

/// Renders `table` as CSV: `bucket_start` in RFC 3339 UTC, then one column per meter.
/// Absent readings are written as empty fields.
pub fn render_csv(table: &ComparisonTable) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push(BUCKET_START_COLUMN);
    header.extend(table.columns.iter().map(String::as_str));
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.bucket_start.to_rfc3339_opts(SecondsFormat::Secs, true));
        record.extend(
            row.values
                .iter()
                .map(|value| value.map(|quantity| quantity.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|err| ExportError::Buffer(err.error().to_string()))
}

/// Renders the table, writes it to a sibling temp file and renames that over `path`.
/// A failure at any step leaves an existing `path` untouched.
pub fn write_csv(table: &ComparisonTable, path: &Path) -> Result<(), ExportError> {
    let bytes = render_csv(table)?;
    let io_error = |error| ExportError::Io {
        path: path.display().to_string(),
        error,
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(directory).map_err(io_error)?;
    staged.write_all(&bytes).map_err(io_error)?;
    staged.as_file().sync_all().map_err(io_error)?;
    staged
        .persist(path)
        .map_err(|persist| io_error(persist.error))?;

    tracing::info!(
        path = %path.display(),
        rows = table.rows.len(),
        columns = table.columns.len(),
        "wrote comparison csv"
    );
    Ok(())
}
