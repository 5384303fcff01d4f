use crate::core::csv_table::{read_table, write_table};
use crate::core::Storage;
use crate::domain::model::Table;
use crate::utils::error::Result;

/// Canonical column name: trimmed, lowercase, spaces replaced by underscores.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// 只改標頭，資料列原封不動
pub fn normalize_headers(mut table: Table) -> Table {
    table.headers = table.headers.iter().map(|h| normalize_header(h)).collect();
    table
}

/// Reads the raw CSV, normalizes its headers and writes the staging artifact.
#[derive(Debug, Clone)]
pub struct Extractor<S: Storage> {
    storage: S,
    output_path: String,
}

impl<S: Storage> Extractor<S> {
    pub fn new(storage: S, output_path: impl Into<String>) -> Self {
        Self {
            storage,
            output_path: output_path.into(),
        }
    }

    pub async fn run(&self, raw_path: &str) -> Result<String> {
        tracing::debug!("Reading raw input from {}", raw_path);
        let data = self.storage.read_file(raw_path).await?;
        let table = read_table(raw_path, &data)?;
        let rows = table.row_count();

        let staged = normalize_headers(table);
        tracing::debug!("Normalized headers: {}", staged.headers.join(","));

        let bytes = write_table(&self.output_path, &staged)?;
        self.storage.write_file(&self.output_path, &bytes).await?;

        tracing::info!(rows, output = %self.output_path, "Extract stage wrote staging file");
        Ok(self.output_path.clone())
    }
}
