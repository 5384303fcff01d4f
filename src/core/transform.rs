use crate::core::csv_table::{read_table, write_table};
use crate::core::Storage;
use crate::domain::model::{Table, TimestampCell, TransformOutput, TransformSummary};
use crate::utils::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub const PICKUP_COLUMN: &str = "pickup_datetime";
pub const DROPOFF_COLUMN: &str = "dropoff_datetime";
pub const DURATION_COLUMN: &str = "trip_duration_minutes";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse one cell. Anything unrecognised (including an empty cell) is
/// [`TimestampCell::Missing`]; this never fails.
pub fn parse_timestamp(raw: &str) -> TimestampCell {
    let value = raw.trim();
    if value.is_empty() {
        return TimestampCell::Missing;
    }

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return TimestampCell::Parsed(ts);
        }
    }

    // 帶時區的值一律換算成 UTC
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return TimestampCell::Parsed(ts.naive_utc());
    }
    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(value, format) {
            return TimestampCell::Parsed(ts.naive_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return TimestampCell::Parsed(date.and_time(NaiveTime::MIN));
        }
    }

    TimestampCell::Missing
}

/// Output format for a whole timestamp column: sub-second precision only if
/// some value needs it (microseconds, or nanoseconds when a value carries
/// them), date-only if every value falls on midnight.
fn column_format(cells: &[TimestampCell]) -> &'static str {
    let parsed: Vec<NaiveDateTime> = cells.iter().filter_map(|c| c.value()).collect();

    if parsed.iter().any(|ts| ts.nanosecond() % 1_000 != 0) {
        "%Y-%m-%d %H:%M:%S%.9f"
    } else if parsed.iter().any(|ts| ts.nanosecond() != 0) {
        "%Y-%m-%d %H:%M:%S%.6f"
    } else if !parsed.is_empty() && parsed.iter().all(|ts| ts.time() == NaiveTime::MIN) {
        "%Y-%m-%d"
    } else {
        "%Y-%m-%d %H:%M:%S"
    }
}

/// Elapsed minutes between two cells; missing if either side is missing.
pub fn duration_minutes(pickup: TimestampCell, dropoff: TimestampCell) -> Option<f64> {
    let (start, end) = (pickup.value()?, dropoff.value()?);
    let micros = (end - start).num_microseconds()?;
    Some(micros as f64 / 60_000_000.0)
}

/// Shortest text that round-trips, always with a decimal part (`15.0`).
pub fn format_minutes(minutes: f64) -> String {
    format!("{:?}", minutes)
}

/// 把整欄解析成時間戳，並以標準格式改寫該欄
fn parse_column(table: &mut Table, index: usize) -> Vec<TimestampCell> {
    let cells: Vec<TimestampCell> = table
        .rows
        .iter()
        .map(|row| parse_timestamp(&row[index]))
        .collect();

    let format = column_format(&cells);
    for (row, cell) in table.rows.iter_mut().zip(&cells) {
        row[index] = match cell {
            TimestampCell::Parsed(ts) => ts.format(format).to_string(),
            TimestampCell::Missing => String::new(),
        };
    }

    cells
}

/// Parse the timestamp columns, derive the trip duration and drop rows whose
/// duration is missing or negative. Without both timestamp columns no
/// duration is derived and every row is kept. Rows shorter than the header
/// are padded with empty cells first.
pub fn transform_table(mut table: Table) -> (Table, TransformSummary) {
    let mut summary = TransformSummary {
        rows_in: table.row_count(),
        ..Default::default()
    };

    let width = table.headers.len();
    for row in table.rows.iter_mut().filter(|row| row.len() < width) {
        row.resize(width, String::new());
    }

    let mut parse = |table: &mut Table, name: &str| -> Option<Vec<TimestampCell>> {
        let index = table.column_index(name)?;
        let blanks = table
            .rows
            .iter()
            .filter(|row| row[index].trim().is_empty())
            .count();
        let cells = parse_column(table, index);
        let missing = cells.iter().filter(|c| c.is_missing()).count();
        summary.unparsed.push((name.to_string(), missing - blanks));
        Some(cells)
    };

    let pickup = parse(&mut table, PICKUP_COLUMN);
    let dropoff = parse(&mut table, DROPOFF_COLUMN);

    if let (Some(pickup), Some(dropoff)) = (pickup, dropoff) {
        let durations: Vec<Option<f64>> = pickup
            .iter()
            .zip(&dropoff)
            .map(|(p, d)| duration_minutes(*p, *d))
            .collect();

        let existing = table.column_index(DURATION_COLUMN);
        if existing.is_none() {
            table.headers.push(DURATION_COLUMN.to_string());
        }

        let rows = std::mem::take(&mut table.rows);
        table.rows = rows
            .into_iter()
            .zip(durations)
            .filter_map(|(mut row, duration)| {
                // 邊界值 0 保留
                let minutes = duration.filter(|m| *m >= 0.0)?;
                match existing {
                    Some(index) => row[index] = format_minutes(minutes),
                    None => row.push(format_minutes(minutes)),
                }
                Some(row)
            })
            .collect();
        summary.duration_computed = true;
    }

    summary.rows_out = table.row_count();
    (table, summary)
}

/// Reads the staging artifact, applies [`transform_table`] and writes the
/// processed artifact.
#[derive(Debug, Clone)]
pub struct Transformer<S: Storage> {
    storage: S,
    output_path: String,
}

impl<S: Storage> Transformer<S> {
    pub fn new(storage: S, output_path: impl Into<String>) -> Self {
        Self {
            storage,
            output_path: output_path.into(),
        }
    }

    pub async fn run(&self, staged_path: &str) -> Result<TransformOutput> {
        let data = self.storage.read_file(staged_path).await?;
        let table = read_table(staged_path, &data)?;

        let (processed, summary) = transform_table(table);
        if !summary.duration_computed {
            tracing::warn!(
                "'{}' or '{}' column missing, skipping duration filter",
                PICKUP_COLUMN,
                DROPOFF_COLUMN
            );
        }
        for (column, count) in summary.unparsed.iter().filter(|(_, count)| *count > 0) {
            tracing::warn!(
                column = %column,
                unparsed = count,
                "Some timestamp values could not be parsed and were treated as missing"
            );
        }

        let bytes = write_table(&self.output_path, &processed)?;
        self.storage.write_file(&self.output_path, &bytes).await?;

        tracing::info!(
            rows_in = summary.rows_in,
            rows_out = summary.rows_out,
            dropped = summary.rows_dropped(),
            output = %self.output_path,
            "Transform stage wrote processed file"
        );
        Ok(TransformOutput {
            path: self.output_path.clone(),
            summary,
        })
    }
}
