//! Monthly activity report.
//!
//! Every task ever recorded is grouped by the calendar month of its
//! scheduled date in the reference timezone. Each month becomes one sheet
//! named like `January 2025`, rows ordered by date then scheduled time.
//! Rendering to a workbook format is the job of a [`ReportWriter`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ReportError;
use crate::types::Task;

/// Column headers, in sheet order.
pub const REPORT_COLUMNS: [&str; 8] = [
    "Date",
    "Scheduled Time",
    "Client",
    "Type",
    "Status",
    "ID",
    "Start Time",
    "End Time",
];

const NOT_AVAILABLE: &str = "N/A";

/// One task in a report sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// `YYYY-MM-DD` in the reference timezone.
    #[serde(rename = "Date")]
    pub date: String,
    /// `HH:MM` suggested time.
    #[serde(rename = "Scheduled Time")]
    pub scheduled_time: String,
    /// Client name.
    #[serde(rename = "Client")]
    pub client: String,
    /// Service type.
    #[serde(rename = "Type")]
    pub service_type: String,
    /// Lifecycle status.
    #[serde(rename = "Status")]
    pub status: String,
    /// Task id.
    #[serde(rename = "ID")]
    pub id: String,
    /// `HH:MM:SS` when processing started, or `N/A`.
    #[serde(rename = "Start Time")]
    pub start_time: String,
    /// `HH:MM:SS` when processing finished, or `N/A`.
    #[serde(rename = "End Time")]
    pub end_time: String,
}

/// One month of activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSheet {
    /// Sheet name, `<Month> <Year>`.
    pub name: String,
    /// Rows ordered by date, then scheduled time.
    pub rows: Vec<ReportRow>,
}

/// Every month with at least one task, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReport {
    /// Sheets in chronological order.
    pub sheets: Vec<ReportSheet>,
}

impl MonthlyReport {
    /// Builds the report from `tasks`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{FixedOffset, TimeZone, Utc};
    /// use dockboard::report::MonthlyReport;
    /// use dockboard::Task;
    ///
    /// let tz = FixedOffset::west_opt(3 * 3600).unwrap();
    /// // 01:00 UTC on Feb 1st is still January 31st in UTC-3.
    /// let task = Task::new(
    ///     "a".into(),
    ///     Utc.with_ymd_and_hms(2025, 2, 1, 1, 0, 0).unwrap(),
    ///     "22:00".into(),
    ///     "Acme".into(),
    ///     "Import".into(),
    /// );
    ///
    /// let report = MonthlyReport::build([&task], tz);
    /// assert_eq!(report.sheets[0].name, "January 2025");
    /// assert_eq!(report.sheets[0].rows[0].start_time, "N/A");
    /// ```
    pub fn build<'a, I>(tasks: I, tz: FixedOffset) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut months: BTreeMap<(i32, u32), Vec<(NaiveDate, &'a Task)>> = BTreeMap::new();
        for task in tasks {
            let date = task.scheduled_at.with_timezone(&tz).date_naive();
            months
                .entry((date.year(), date.month()))
                .or_default()
                .push((date, task));
        }

        let sheets = months
            .into_values()
            .filter_map(|mut entries| {
                entries.sort_by(|(da, a), (db, b)| {
                    da.cmp(db)
                        .then_with(|| a.suggested_time.cmp(&b.suggested_time))
                        .then_with(|| a.id.cmp(&b.id))
                });
                let (first, _) = entries.first()?;
                Some(ReportSheet {
                    name: first.format("%B %Y").to_string(),
                    rows: entries
                        .iter()
                        .map(|(date, task)| report_row(*date, task, tz))
                        .collect(),
                })
            })
            .collect();

        Self { sheets }
    }

    /// Total rows across all sheets.
    pub fn row_count(&self) -> usize {
        self.sheets.iter().map(|s| s.rows.len()).sum()
    }
}

fn report_row(date: NaiveDate, task: &Task, tz: FixedOffset) -> ReportRow {
    ReportRow {
        date: date.format("%Y-%m-%d").to_string(),
        scheduled_time: task.suggested_time.clone(),
        client: task.client.clone(),
        service_type: task.service_type.clone(),
        status: task.status.to_string(),
        id: task.id.clone(),
        start_time: clock_time(task.entered_at, tz),
        end_time: clock_time(task.finished_at, tz),
    }
}

fn clock_time(instant: Option<DateTime<Utc>>, tz: FixedOffset) -> String {
    instant
        .map(|t| t.with_timezone(&tz).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Renders a [`MonthlyReport`] somewhere and says where.
pub trait ReportWriter: Send + Sync {
    /// Writes `report`, returning the location of the artifact.
    fn write(&self, report: &MonthlyReport) -> Result<PathBuf, ReportError>;
}

/// Writes the report as a JSON workbook: an object with one array of row
/// objects per sheet, in chronological order.
///
/// ```json
/// { "January 2025": [ { "Date": "2025-01-10", "Scheduled Time": "08:00", ... } ] }
/// ```
#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    path: PathBuf,
}

impl JsonReportWriter {
    /// A writer producing `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The output file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportWriter for JsonReportWriter {
    fn write(&self, report: &MonthlyReport) -> Result<PathBuf, ReportError> {
        let workbook: serde_json::Map<String, serde_json::Value> = report
            .sheets
            .iter()
            .map(|sheet| {
                serde_json::to_value(&sheet.rows).map(|rows| (sheet.name.clone(), rows))
            })
            .collect::<Result<_, _>>()
            .map_err(|e| ReportError::Serialize(e.to_string()))?;

        let json = serde_json::to_vec_pretty(&workbook)
            .map_err(|e| ReportError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.path, json).map_err(|source| ReportError::Write {
            path: self.path.clone(),
            source,
        })?;

        info!(
            path = %self.path.display(),
            sheets = report.sheets.len(),
            rows = report.row_count(),
            "monthly report written"
        );
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn tz() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn task(id: &str, month: u32, day: u32, time: &str) -> Task {
        let (h, m) = time.split_once(':').unwrap();
        let local = tz()
            .with_ymd_and_hms(2025, month, day, h.parse().unwrap(), m.parse().unwrap(), 0)
            .unwrap();
        Task::new(
            id.to_string(),
            local.with_timezone(&Utc),
            time.to_string(),
            format!("client {id}"),
            "Import".to_string(),
        )
    }

    #[test]
    fn groups_by_month_in_chronological_order() {
        let tasks = vec![
            task("c", 3, 2, "08:00"),
            task("a", 1, 15, "10:00"),
            task("b", 1, 3, "09:00"),
        ];
        let report = MonthlyReport::build(&tasks, tz());

        let names: Vec<_> = report.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["January 2025", "March 2025"]);
        let january: Vec<_> = report.sheets[0].rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(january, vec!["b", "a"]);
        assert_eq!(report.row_count(), 3);
    }

    #[test]
    fn same_day_rows_sort_by_time() {
        let tasks = vec![task("late", 1, 10, "14:30"), task("early", 1, 10, "07:45")];
        let report = MonthlyReport::build(&tasks, tz());
        assert_eq!(report.sheets[0].rows[0].id, "early");
    }

    #[test]
    fn timestamps_render_in_reference_timezone() {
        let mut done = task("a", 1, 10, "08:00");
        done.status = TaskStatus::Finished;
        done.entered_at = Some(Utc.with_ymd_and_hms(2025, 1, 10, 11, 5, 30).unwrap());
        done.finished_at = Some(Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap());

        let row = &MonthlyReport::build([&done], tz()).sheets[0].rows[0];
        assert_eq!(
            row,
            &ReportRow {
                date: "2025-01-10".to_string(),
                scheduled_time: "08:00".to_string(),
                client: "client a".to_string(),
                service_type: "Import".to_string(),
                status: "Finished".to_string(),
                id: "a".to_string(),
                start_time: "08:05:30".to_string(),
                end_time: "09:00:00".to_string(),
            }
        );
    }

    #[test]
    fn empty_history_has_no_sheets() {
        assert!(MonthlyReport::build(&Vec::<Task>::new(), tz()).sheets.is_empty());
    }

    #[test]
    fn json_writer_uses_column_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("monthly.json");
        let report = MonthlyReport::build(&vec![task("a", 1, 10, "08:00")], tz());

        let written = JsonReportWriter::new(&path).write(&report).unwrap();
        assert_eq!(written, path);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let row = raw["January 2025"][0].as_object().unwrap();
        let keys: Vec<_> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, REPORT_COLUMNS.to_vec());
    }
}
