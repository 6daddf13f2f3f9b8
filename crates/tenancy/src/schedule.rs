//! Report schedule definitions.
//!
//! Expressions use the `cron` crate's six/seven field syntax
//! (`sec min hour day-of-month month day-of-week [year]`) and are evaluated in UTC.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{AggregateId, DomainError, DomainResult, require_email, require_non_blank};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Employees,
    Attendance,
    Leave,
    Payroll,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Employees,
        ReportKind::Attendance,
        ReportKind::Leave,
        ReportKind::Payroll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Employees => "employees",
            ReportKind::Attendance => "attendance",
            ReportKind::Leave => "leave",
            ReportKind::Payroll => "payroll",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Employees => "Employee Directory",
            ReportKind::Attendance => "Attendance Report",
            ReportKind::Leave => "Leave Report",
            ReportKind::Payroll => "Payroll Report",
        }
    }
}

impl FromStr for ReportKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown report kind '{s}'")))
    }
}

impl core::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Xlsx,
    Pdf,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Xlsx => "xlsx",
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "text/csv; charset=utf-8",
            ReportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ReportFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "xlsx" | "excel" => Ok(ReportFormat::Xlsx),
            "pdf" => Ok(ReportFormat::Pdf),
            other => Err(DomainError::validation(format!("unknown report format '{other}'"))),
        }
    }
}

impl core::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.extension())
    }
}

pub fn parse_cron(expr: &str) -> DomainResult<cron::Schedule> {
    cron::Schedule::from_str(expr.trim())
        .map_err(|e| DomainError::validation(format!("invalid cron expression '{expr}': {e}")))
}

/// A recurring e-mail delivery of one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSchedule {
    pub id: AggregateId,
    pub name: String,
    pub cron: String,
    pub kind: ReportKind,
    pub format: ReportFormat,
    pub recipients: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ReportSchedule {
    pub fn validate(&self) -> DomainResult<()> {
        require_non_blank("name", &self.name)?;
        parse_cron(&self.cron)?;
        if self.recipients.is_empty() {
            return Err(DomainError::validation("a schedule needs at least one recipient"));
        }
        for r in &self.recipients {
            require_email("recipients", r)?;
        }
        Ok(())
    }

    /// First fire time strictly after `after`; `None` for an exhausted or unparsable expression.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        parse_cron(&self.cron).ok()?.after(&after).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule(cron: &str, recipients: Vec<&str>) -> ReportSchedule {
        ReportSchedule {
            id: AggregateId::new(),
            name: "Monthly payroll".to_string(),
            cron: cron.to_string(),
            kind: ReportKind::Payroll,
            format: ReportFormat::Pdf,
            recipients: recipients.into_iter().map(String::from).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn kinds_and_formats_parse_case_insensitively() {
        assert_eq!("Payroll".parse::<ReportKind>().unwrap(), ReportKind::Payroll);
        assert_eq!("EXCEL".parse::<ReportFormat>().unwrap(), ReportFormat::Xlsx);
        assert!("docx".parse::<ReportFormat>().is_err());
        assert!("salaries".parse::<ReportKind>().is_err());
    }

    #[test]
    fn schedule_validation() {
        assert!(schedule("0 0 8 1 * *", vec!["hr@acme.io"]).validate().is_ok());
        assert!(schedule("every monday", vec!["hr@acme.io"]).validate().is_err());
        assert!(schedule("0 0 8 1 * *", vec![]).validate().is_err());
        assert!(schedule("0 0 8 1 * *", vec!["not-an-email"]).validate().is_err());
    }

    #[test]
    fn next_fire_time_is_computed_in_utc() {
        let s = schedule("0 30 9 * * *", vec!["hr@acme.io"]);
        let after = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(
            s.next_after(after),
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap())
        );
    }
}
