use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 一份表格資料：標頭列加上資料列，每個儲存格保留原始文字
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// First column whose header equals `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Result of parsing a single timestamp cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampCell {
    Parsed(NaiveDateTime),
    Missing,
}

impl TimestampCell {
    pub fn value(self) -> Option<NaiveDateTime> {
        match self {
            TimestampCell::Parsed(ts) => Some(ts),
            TimestampCell::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, TimestampCell::Missing)
    }
}

/// Fully qualified warehouse table: `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(rename = "projectId")]
    pub project: String,
    #[serde(rename = "datasetId")]
    pub dataset: String,
    #[serde(rename = "tableId")]
    pub table: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// 遠端載入作業的狀態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed { reason: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub job_id: String,
    pub project: String,
    pub location: Option<String>,
    pub state: JobState,
}

/// 轉換階段的計數
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSummary {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Non-empty values that could not be parsed, per timestamp column
    /// present in the input, in column order.
    pub unparsed: Vec<(String, usize)>,
    pub duration_computed: bool,
}

impl TransformSummary {
    pub fn rows_dropped(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_out)
    }

    pub fn unparsed_in(&self, column: &str) -> usize {
        self.unparsed
            .iter()
            .find(|(name, _)| name == column)
            .map_or(0, |(_, count)| *count)
    }

    pub fn unparsed_total(&self) -> usize {
        self.unparsed.iter().map(|(_, count)| count).sum()
    }
}

/// The processed artifact plus the counters that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub path: String,
    pub summary: TransformSummary,
}

/// What one complete pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub staged_path: String,
    pub processed_path: String,
    pub destination: String,
    pub transform: TransformSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_display_and_json() {
        let table = TableRef {
            project: "demo-project".to_string(),
            dataset: "demo_ds".to_string(),
            table: "nyc_taxi".to_string(),
        };
        assert_eq!(table.to_string(), "demo-project.demo_ds.nyc_taxi");

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["projectId"], "demo-project");
        assert_eq!(json["datasetId"], "demo_ds");
        assert_eq!(json["tableId"], "nyc_taxi");
    }

    #[test]
    fn test_column_index_uses_first_match() {
        let table = Table::new(
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
            vec![],
        );
        assert_eq!(table.column_index("a"), Some(0));
        assert_eq!(table.column_index("c"), None);
    }

    #[test]
    fn test_transform_summary_counters() {
        let summary = TransformSummary {
            rows_in: 5,
            rows_out: 2,
            unparsed: vec![("pickup_datetime".to_string(), 1), ("dropoff_datetime".to_string(), 2)],
            duration_computed: true,
        };
        assert_eq!(summary.rows_dropped(), 3);
        assert_eq!(summary.unparsed_in("dropoff_datetime"), 2);
        assert_eq!(summary.unparsed_in("fare"), 0);
        assert_eq!(summary.unparsed_total(), 3);
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed {
            reason: "boom".to_string()
        }
        .is_terminal());
    }
}
