//! Performance marks, execution timing and long-task reporting.

use std::time::{Duration, Instant};

use pagefix_core::PerformanceConfig;
use pagefix_logging::{pagefix_debug, pagefix_info, pagefix_warn};

use crate::{Capability, PageHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub label: &'static str,
    /// Page time when the mark was taken.
    pub at: Duration,
}

#[derive(Debug)]
pub struct Diagnostics {
    perf: PerformanceConfig,
    marks: Vec<Mark>,
    monitoring_long_tasks: bool,
}

impl Diagnostics {
    pub fn new(perf: PerformanceConfig) -> Self {
        Self {
            perf,
            marks: Vec::new(),
            monitoring_long_tasks: false,
        }
    }

    /// Marks are always recorded; logging them is configurable.
    pub fn mark(&mut self, label: &'static str, at: Duration) {
        self.marks.push(Mark { label, at });
        if self.perf.marks_enabled() {
            pagefix_debug!("mark {label} at {}ms", at.as_millis());
        }
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn mark_at(&self, label: &str) -> Option<Duration> {
        self.marks
            .iter()
            .find(|mark| mark.label == label)
            .map(|mark| mark.at)
    }

    /// Starts a wall-clock timer that logs its elapsed time when dropped.
    pub fn time(&self, label: &'static str) -> ExecutionTimer {
        ExecutionTimer {
            label,
            started: Instant::now(),
            enabled: self.perf.execution_time_enabled(),
        }
    }

    /// Asks the host for long-task reports. A missing API only degrades diagnostics.
    pub fn start_long_task_monitor<H: PageHost>(&mut self, page: &mut H) -> bool {
        match page.observe_long_tasks() {
            Capability::Available(()) => {
                self.monitoring_long_tasks = true;
                pagefix_debug!(
                    "Long task monitor started (threshold {}ms)",
                    self.perf.long_task_threshold_ms
                );
                true
            }
            Capability::Unavailable(api) => {
                pagefix_warn!("Long task monitoring unavailable: {api} is not supported");
                false
            }
        }
    }

    /// Returns the duration in milliseconds when the task runs longer than the threshold.
    pub fn on_long_task(&self, duration: Duration) -> Option<u64> {
        if !self.monitoring_long_tasks || duration <= self.perf.long_task_threshold() {
            return None;
        }
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        pagefix_warn!("Long task detected: {ms}ms");
        Some(ms)
    }
}

/// Logs the elapsed wall-clock time of a scope on drop.
#[derive(Debug)]
pub struct ExecutionTimer {
    label: &'static str,
    started: Instant,
    enabled: bool,
}

impl Drop for ExecutionTimer {
    fn drop(&mut self) {
        if self.enabled {
            pagefix_info!(
                "{} took {:.2}ms",
                self.label,
                self.started.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
}
