//! Reading and writing [`Table`]s as comma-separated text.

use crate::domain::model::Table;
use crate::utils::error::{EtlError, Result};

/// Parse CSV bytes into a [`Table`]. `path` is only used for error messages.
///
/// The first non-blank line is the header. Rows shorter than the header are
/// padded with empty cells; longer rows are rejected.
pub fn read_table(path: &str, data: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::parse(path, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(EtlError::parse(path, "no header row found"));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| EtlError::parse(path, e.to_string()))?;
        if record.len() > headers.len() {
            // 第 1 列是標頭，所以資料列從第 2 列起算
            return Err(EtlError::parse(
                path,
                format!(
                    "row {} has {} fields but the header has {}",
                    index + 2,
                    record.len(),
                    headers.len()
                ),
            ));
        }

        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(Table::new(headers, rows))
}

/// Serialize a [`Table`] back to CSV bytes, header first, no index column.
pub fn write_table(path: &str, table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(&table.headers)
        .map_err(|e| EtlError::parse(path, e.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| EtlError::parse(path, e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::io(path, e.into_error()))
}
