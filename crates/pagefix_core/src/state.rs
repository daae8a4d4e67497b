use crate::view_model::RunSummary;
use crate::{Component, TunerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecyclePhase {
    #[default]
    Pending,
    /// Script entry ran; document-start components have been sequenced.
    Started,
    DomReady,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleDelivery {
    Privileged,
    FallbackElement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkScope {
    Privileged,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Installed { scope: SinkScope },
    SinkMissing,
    NotCallable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BannerStatus {
    #[default]
    NotArmed,
    /// Feature off or selector undefined.
    Skipped,
    Watching,
    Acted,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadErrorStatus {
    #[default]
    NotListening,
    Listening,
    Seen,
    Expired,
}

/// Orchestrator state, driven only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    config: TunerConfig,
    phase: LifecyclePhase,
    root_ready: bool,
    styles: Option<StyleDelivery>,
    emitted_groups: usize,
    skipped_groups: usize,
    signals: Option<SignalOutcome>,
    suppressed_calls: u64,
    banner: BannerStatus,
    load_error: LoadErrorStatus,
    long_tasks: Vec<u64>,
    failures: Vec<(Component, String)>,
    dirty: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(TunerConfig::default())
    }
}

impl RunState {
    pub fn new(config: TunerConfig) -> Self {
        Self {
            config,
            phase: LifecyclePhase::Pending,
            root_ready: false,
            styles: None,
            emitted_groups: 0,
            skipped_groups: 0,
            signals: None,
            suppressed_calls: 0,
            banner: BannerStatus::NotArmed,
            load_error: LoadErrorStatus::NotListening,
            long_tasks: Vec::new(),
            failures: Vec::new(),
            dirty: false,
        }
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn root_ready(&self) -> bool {
        self.root_ready
    }

    pub fn banner(&self) -> BannerStatus {
        self.banner
    }

    pub fn view(&self) -> RunSummary {
        RunSummary {
            phase: self.phase,
            styles: self.styles,
            emitted_groups: self.emitted_groups,
            skipped_groups: self.skipped_groups,
            signals: self.signals,
            suppressed_calls: self.suppressed_calls,
            banner: self.banner,
            load_error: self.load_error,
            long_tasks: self.long_tasks.len(),
            longest_task_ms: self.long_tasks.iter().copied().max(),
            failures: self
                .failures
                .iter()
                .map(|(component, message)| format!("{component}: {message}"))
                .collect(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_phase(&mut self, phase: LifecyclePhase) {
        self.phase = phase;
        self.mark_dirty();
    }

    pub(crate) fn set_root_ready(&mut self) {
        self.root_ready = true;
        self.mark_dirty();
    }

    pub(crate) fn set_styles(&mut self, delivery: StyleDelivery, emitted: usize, skipped: usize) {
        self.styles = Some(delivery);
        self.emitted_groups = emitted;
        self.skipped_groups = skipped;
        self.mark_dirty();
    }

    pub(crate) fn set_signals(&mut self, outcome: SignalOutcome) {
        self.signals = Some(outcome);
        self.mark_dirty();
    }

    pub(crate) fn set_suppressed_calls(&mut self, calls: u64) {
        if calls != self.suppressed_calls {
            self.suppressed_calls = calls;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_banner(&mut self, status: BannerStatus) {
        if self.banner.is_terminal() {
            return;
        }
        self.banner = status;
        self.mark_dirty();
    }

    pub(crate) fn set_load_error(&mut self, status: LoadErrorStatus) {
        if matches!(
            self.load_error,
            LoadErrorStatus::Seen | LoadErrorStatus::Expired
        ) {
            return;
        }
        self.load_error = status;
        self.mark_dirty();
    }

    pub(crate) fn push_long_task(&mut self, duration_ms: u64) {
        self.long_tasks.push(duration_ms);
        self.mark_dirty();
    }

    pub(crate) fn push_failure(&mut self, component: Component, message: String) {
        self.failures.push((component, message));
        self.mark_dirty();
    }
}

impl BannerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BannerStatus::Skipped | BannerStatus::Acted | BannerStatus::Abandoned
        )
    }
}
