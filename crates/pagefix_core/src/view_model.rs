use crate::{BannerStatus, LifecyclePhase, LoadErrorStatus, SignalOutcome, StyleDelivery};

/// Snapshot of a run, rendered by the CLI and asserted on by tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub phase: LifecyclePhase,
    pub styles: Option<StyleDelivery>,
    pub emitted_groups: usize,
    pub skipped_groups: usize,
    pub signals: Option<SignalOutcome>,
    pub suppressed_calls: u64,
    pub banner: BannerStatus,
    pub load_error: LoadErrorStatus,
    pub long_tasks: usize,
    pub longest_task_ms: Option<u64>,
    pub failures: Vec<String>,
    pub dirty: bool,
}

impl RunSummary {
    pub fn styles_applied(&self) -> bool {
        self.styles.is_some()
    }
}
