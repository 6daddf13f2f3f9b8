//! Tabular HR reports and their file renderings.
//!
//! A report is built from projections into a [`ReportTable`] and then
//! rendered as CSV, XLSX or PDF. Dates are calendar dates and timestamps are
//! rendered in UTC.

pub mod builders;
pub mod render;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use aura_payroll::PayPeriod;
use aura_tenancy::{ReportFormat, ReportKind};

pub use builders::build_report;
pub use render::render;

/// One cell. Numbers stay numeric in spreadsheets.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Integer(i64),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn opt(value: Option<impl ToString>) -> Self {
        value.map(|v| Cell::Text(v.to_string())).unwrap_or(Cell::Empty)
    }
}

impl core::fmt::Display for Cell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{n:.2}"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Empty => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub kind: ReportKind,
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
    pub generated_at: DateTime<Utc>,
}

/// Optional narrowing. Attendance and leave use `from`/`to`; payroll uses `period`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub period: Option<PayPeriod>,
}

/// A finished file, ready for download or attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl RenderedReport {
    pub fn new(table: &ReportTable, format: ReportFormat, bytes: Vec<u8>) -> Self {
        Self {
            filename: format!(
                "{}-{}.{}",
                table.kind.as_str(),
                table.generated_at.format("%Y%m%d-%H%M%S"),
                format.extension()
            ),
            content_type: format.content_type(),
            bytes,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("csv rendering failed: {0}")]
    Csv(String),

    #[error("xlsx rendering failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("pdf rendering failed: {0}")]
    Pdf(String),
}
