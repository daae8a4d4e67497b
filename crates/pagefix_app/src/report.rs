//! Run reports written next to the snapshot they describe.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pagefix_core::{RunSummary, StyleSheet};
use pagefix_engine::Mark;
use serde::Serialize;
use tempfile::NamedTempFile;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("cannot serialize report: {0}")]
    Serialize(#[from] ron::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkEntry {
    pub label: String,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub snapshot: String,
    pub encoding: String,
    pub phase: String,
    pub styles: Option<String>,
    pub emitted_groups: Vec<String>,
    pub skipped_groups: Vec<String>,
    pub signals: Option<String>,
    pub suppressed_calls: u64,
    pub banner: String,
    pub load_error: String,
    pub long_tasks: usize,
    pub longest_task_ms: Option<u64>,
    pub failures: Vec<String>,
    pub marks: Vec<MarkEntry>,
}

impl RunReport {
    pub fn new(
        generated_at: DateTime<Utc>,
        snapshot: &Path,
        encoding: &str,
        summary: &RunSummary,
        stylesheet: Option<&StyleSheet>,
        marks: &[Mark],
    ) -> Self {
        let (emitted_groups, skipped_groups) = match stylesheet {
            Some(sheet) => (
                sheet.emitted.iter().map(|group| group.to_string()).collect(),
                sheet
                    .skipped
                    .iter()
                    .map(|skipped| format!("{}: {:?}", skipped.group, skipped.reason))
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        Self {
            generated_at: generated_at.to_rfc3339(),
            snapshot: snapshot.display().to_string(),
            encoding: encoding.to_string(),
            phase: format!("{:?}", summary.phase),
            styles: summary.styles.map(|delivery| format!("{delivery:?}")),
            emitted_groups,
            skipped_groups,
            signals: summary.signals.map(|outcome| format!("{outcome:?}")),
            suppressed_calls: summary.suppressed_calls,
            banner: format!("{:?}", summary.banner),
            load_error: format!("{:?}", summary.load_error),
            long_tasks: summary.long_tasks,
            longest_task_ms: summary.longest_task_ms,
            failures: summary.failures.clone(),
            marks: marks
                .iter()
                .map(|mark| MarkEntry {
                    label: mark.label.to_string(),
                    at_ms: u64::try_from(mark.at.as_millis()).unwrap_or(u64::MAX),
                })
                .collect(),
        }
    }
}

pub fn report_file_name(generated_at: DateTime<Utc>) -> String {
    format!("pagefix-report-{}.ron", generated_at.format("%Y%m%dT%H%M%SZ"))
}

/// Ensure the report directory exists; create if missing.
fn ensure_report_dir(dir: &Path) -> Result<(), ReportError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| ReportError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(ReportError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| ReportError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically writes the report as RON into `dir`, replacing any previous file of that name.
pub fn write_report(dir: &Path, file_name: &str, report: &RunReport) -> Result<PathBuf, ReportError> {
    ensure_report_dir(dir)?;
    let content = ron::ser::to_string_pretty(report, ron::ser::PrettyConfig::new())?;

    let target = dir.join(file_name);
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&target).map_err(|e| ReportError::Io(e.error))?;
    Ok(target)
}
