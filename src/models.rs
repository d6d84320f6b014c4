use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

static EMPTY_CELL: CellValue = CellValue::Empty;

/// One spreadsheet cell in its native type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireCell", into = "WireCell")]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireCell {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime { datetime: NaiveDateTime },
}

impl From<WireCell> for CellValue {
    fn from(cell: WireCell) -> Self {
        match cell {
            WireCell::Empty => CellValue::Empty,
            WireCell::Bool(value) => CellValue::Bool(value),
            WireCell::Number(value) => CellValue::Number(value),
            WireCell::Text(value) => CellValue::Text(value),
            WireCell::DateTime { datetime } => CellValue::DateTime(datetime),
        }
    }
}

impl From<CellValue> for WireCell {
    fn from(cell: CellValue) -> Self {
        match cell {
            CellValue::Empty => WireCell::Empty,
            CellValue::Bool(value) => WireCell::Bool(value),
            CellValue::Number(value) => WireCell::Number(value),
            CellValue::Text(value) => WireCell::Text(value),
            CellValue::DateTime(datetime) => WireCell::DateTime { datetime },
        }
    }
}

impl CellValue {
    /// Types a raw text cell the way a spreadsheet reader would.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(number) = trimmed.parse::<f64>() {
            if number.is_finite() {
                return CellValue::Number(number);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// String coercion used for headers and free-text fields.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.clone(),
            CellValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 1e15 {
                    format!("{}", *number as i64)
                } else {
                    number.to_string()
                }
            }
            CellValue::Bool(value) => value.to_string(),
            CellValue::DateTime(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// An in-memory table: one sheet per person.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Builds a sheet from header cells of any type; headers are coerced to text.
    pub fn new(name: impl Into<String>, headers: Vec<CellValue>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(CellValue::to_text).collect(),
            rows,
        }
    }

    pub fn with_text_headers<S: AsRef<str>>(
        name: impl Into<String>,
        headers: &[S],
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        self.rows.iter().map(move |cells| RawRecord {
            headers: &self.headers,
            cells,
        })
    }

    /// Cells of one column, top to bottom; short rows yield `Empty`.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &CellValue> {
        self.rows
            .iter()
            .map(move |cells| cells.get(index).unwrap_or(&EMPTY_CELL))
    }
}

/// Borrowed view of one input row.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    headers: &'a [String],
    cells: &'a [CellValue],
}

impl<'a> RawRecord<'a> {
    pub fn get(&self, index: usize) -> &'a CellValue {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }

    pub fn get_by_header(&self, header: &str) -> Option<&'a CellValue> {
        self.headers
            .iter()
            .position(|h| h == header)
            .map(|index| self.get(index))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub name: String,
    pub sheets: Vec<Sheet>,
}

/// Semantic role a sheet column can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Date,
    Status,
    Responsible,
    Id,
    Description,
    ResolutionDate,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 6] = [
        ColumnRole::Date,
        ColumnRole::Status,
        ColumnRole::Responsible,
        ColumnRole::Id,
        ColumnRole::Description,
        ColumnRole::ResolutionDate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ColumnRole::Date => "DATA",
            ColumnRole::Status => "STATUS",
            ColumnRole::Responsible => "RESPONSAVEL",
            ColumnRole::Id => "ID",
            ColumnRole::Description => "DESCRICAO",
            ColumnRole::ResolutionDate => "RESOLUCAO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalStatus {
    Completed,
    Pending,
    InProgress,
    Cancelled,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 4] = [
        CanonicalStatus::Completed,
        CanonicalStatus::Pending,
        CanonicalStatus::InProgress,
        CanonicalStatus::Cancelled,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CanonicalStatus::Completed => "COMPLETED",
            CanonicalStatus::Pending => "PENDING",
            CanonicalStatus::InProgress => "IN_PROGRESS",
            CanonicalStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Status after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Canonical(CanonicalStatus),
    /// Upper-cased original text that matched no keyword.
    Unmapped(String),
    Blank,
}

impl StatusCode {
    pub fn label(&self) -> &str {
        match self {
            StatusCode::Canonical(status) => status.label(),
            StatusCode::Unmapped(raw) => raw.as_str(),
            StatusCode::Blank => "BLANK",
        }
    }
}

/// A row after column resolution and normalization.
#[derive(Debug, Clone)]
pub struct CanonicalRow {
    pub created: Option<NaiveDateTime>,
    pub resolved: Option<NaiveDateTime>,
    pub status: StatusCode,
    pub responsible: Option<String>,
    pub id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusShare {
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionStats {
    pub samples: usize,
    /// Pairs outside `0..=max_resolution_days`.
    pub discarded: usize,
    pub mean: f64,
    pub median: f64,
    pub outliers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayLoad {
    pub weekday: String,
    pub records: usize,
    pub active_days: usize,
    pub mean_per_day: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendGranularity {
    Monthly,
    Daily,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub correlation: f64,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub points: usize,
    pub granularity: TrendGranularity,
}

impl Trend {
    pub fn stable(points: usize, granularity: TrendGranularity) -> Self {
        Self {
            direction: TrendDirection::Stable,
            correlation: 0.0,
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
            points,
            granularity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    pub problem: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub fill_rate: f64,
    pub standardization_rate: f64,
    pub daily_consistency: f64,
    pub score: f64,
    pub distinct_statuses: usize,
    pub non_standard_values: Vec<String>,
    /// Version of the keyword table the labels were classified with.
    pub status_table_version: u32,
    pub issues: Vec<QualityIssue>,
}

/// Everything computed for one person's sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub person: String,
    pub total_records: usize,
    pub dated_records: usize,
    pub unconvertible_dates: usize,
    pub status_distribution: BTreeMap<String, StatusShare>,
    pub resolution: Option<ResolutionStats>,
    pub efficiency: f64,
    pub daily_counts: BTreeMap<NaiveDate, usize>,
    pub weekly_pattern: Vec<WeekdayLoad>,
    pub daily_status_means: BTreeMap<String, f64>,
    pub trend: Trend,
    pub quality: DataQuality,
}

impl MetricsRecord {
    pub fn status_count(&self, label: &str) -> usize {
        self.status_distribution
            .get(label)
            .map(|share| share.count)
            .unwrap_or(0)
    }

    /// Mean resolution time, when at least one valid sample exists.
    pub fn mean_resolution_days(&self) -> Option<f64> {
        self.resolution
            .as_ref()
            .filter(|stats| stats.samples > 0)
            .map(|stats| stats.mean)
    }

    pub fn pending_share(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.status_count(CanonicalStatus::Pending.label()) as f64 / self.total_records as f64
    }
}

/// Per-sheet failure reported next to the successful records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetError {
    pub sheet: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub outliers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckKind {
    SlowResolution,
    LowEfficiency,
    HighVolume,
    HighPending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub kind: BottleneckKind,
    pub name: String,
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    pub people: usize,
    pub total_records: usize,
    pub status_totals: BTreeMap<String, usize>,
    pub efficiency_ranking: Vec<RankEntry>,
    pub resolution_ranking: Vec<RankEntry>,
    pub volume_ranking: Vec<RankEntry>,
    pub efficiency: Option<MetricSummary>,
    pub resolution_time: Option<MetricSummary>,
    pub volume: Option<MetricSummary>,
    pub bottlenecks: Vec<Bottleneck>,
}
