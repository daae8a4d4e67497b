//! Effect runner and event loop around the pure [`update`] function.
//!
//! Every effect runs inside a boundary: a failing component is logged,
//! reported as [`Msg::ComponentFailed`], and its siblings keep running.

use std::collections::VecDeque;
use std::fmt;

use pagefix_core::{
    generate_stylesheet, update, BannerStatus, Effect, ExecutionGuard, Msg, RunState,
    RunSummary, SelectorSet, StyleDelivery, StyleSheet, TunerConfig, WatchPhase, PRODUCT_NAME,
    PRODUCT_VERSION,
};
use pagefix_logging::{pagefix_debug, pagefix_error, pagefix_info, pagefix_warn};

use crate::{
    inject_styles, install_suppressor, Diagnostics, ElementWatcher, HostError, InjectError,
    InjectionPath, LoadErrorListener, LoadErrorOutcome, PageEvent, PageHost, ReadyState,
    SuppressionCounter, WatchSpec,
};

/// Setup problems that stop the tuner before any component runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error(
        "invalid banner timing: grace {grace_ms}ms must be non-zero and shorter than abandonment {abandon_ms:?}ms"
    )]
    InvalidTiming {
        grace_ms: u64,
        abandon_ms: Option<u64>,
    },
}

#[derive(Debug, thiserror::Error)]
enum ComponentError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Inject(#[from] InjectError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Started,
    /// The execution guard was already claimed; nothing ran.
    AlreadyExecuted,
}

pub struct Orchestrator<N> {
    state: RunState,
    selectors: SelectorSet,
    diagnostics: Diagnostics,
    stylesheet: Option<StyleSheet>,
    banner: Option<ElementWatcher<N>>,
    load_errors: Option<LoadErrorListener>,
    suppression: Option<SuppressionCounter>,
}

impl<N: Copy + Eq + fmt::Debug> Orchestrator<N> {
    pub fn new(config: TunerConfig, selectors: SelectorSet) -> Result<Self, OrchestratorError> {
        let timing = config.banner_timing;
        if !timing.is_ordered() {
            let err = OrchestratorError::InvalidTiming {
                grace_ms: timing.grace_ms,
                abandon_ms: timing.abandon_ms,
            };
            pagefix_error!("FATAL: setup failed, nothing was applied: {err}");
            return Err(err);
        }
        Ok(Self {
            diagnostics: Diagnostics::new(config.performance.clone()),
            state: RunState::new(config),
            selectors,
            stylesheet: None,
            banner: None,
            load_errors: None,
            suppression: None,
        })
    }

    pub fn summary(&self) -> RunSummary {
        self.state.view()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Last generated stylesheet.
    pub fn stylesheet(&self) -> Option<&StyleSheet> {
        self.stylesheet.as_ref()
    }

    pub fn banner_watcher(&self) -> Option<&ElementWatcher<N>> {
        self.banner.as_ref()
    }

    pub fn suppressed_calls(&self) -> u64 {
        self.suppression
            .as_ref()
            .map_or(0, SuppressionCounter::calls)
    }

    /// Runs the document-start components and catches up with the host's
    /// current lifecycle phase.
    pub fn start<H: PageHost<Node = N>>(&mut self, page: &mut H, guard: &ExecutionGuard) -> RunStatus {
        sync_page_clock(page);
        if !guard.try_claim() {
            pagefix_info!("Already executed in this page; skipping");
            return RunStatus::AlreadyExecuted;
        }
        let _timer = self.diagnostics.time("startup");
        pagefix_info!(
            "{PRODUCT_NAME} {PRODUCT_VERSION} starting (readyState {})",
            page.ready_state()
        );

        self.dispatch(page, Msg::ScriptStarted);
        if page.document_element().is_some() {
            self.dispatch(page, Msg::DocumentRootReady);
        }
        let ready_state = page.ready_state();
        self.on_ready_state(page, ready_state);
        RunStatus::Started
    }

    /// Pumps host events until the page has nothing left to deliver.
    pub fn run_until_idle<H: PageHost<Node = N>>(&mut self, page: &mut H) {
        while let Some(event) = page.next_event() {
            sync_page_clock(page);
            self.handle_event(page, event);
        }
        self.sync_suppressed_calls(page);
    }

    pub fn handle_event<H: PageHost<Node = N>>(&mut self, page: &mut H, event: PageEvent<N>) {
        match &event {
            PageEvent::ReadyStateChanged(state) => self.on_ready_state(page, *state),
            PageEvent::LongTask { duration } => {
                if let Some(duration_ms) = self.diagnostics.on_long_task(*duration) {
                    self.dispatch(page, Msg::LongTaskObserved { duration_ms });
                }
            }
            PageEvent::Mutations { .. } | PageEvent::Timer(_) | PageEvent::ResourceError { .. } => {}
        }

        let banner = self.banner.as_mut().and_then(|watcher| {
            watcher
                .handle_event(page, &event)
                .then(|| banner_status(watcher.phase()))
        });
        if let Some(status) = banner {
            self.dispatch(page, Msg::BannerWatch(status));
        }

        let load_error = self
            .load_errors
            .as_mut()
            .and_then(|listener| listener.handle_event(page, &event));
        match load_error {
            Some(LoadErrorOutcome::Matched) => self.dispatch(page, Msg::LoadErrorSeen),
            Some(LoadErrorOutcome::Expired) => self.dispatch(page, Msg::LoadErrorListenerExpired),
            None => {}
        }
    }

    /// Releases every subscription and timer still held. Idempotent.
    pub fn shutdown<H: PageHost<Node = N>>(&mut self, page: &mut H) {
        if let Some(watcher) = self.banner.as_mut() {
            watcher.cancel(page);
        }
        let banner = self.banner.as_ref().map(|watcher| banner_status(watcher.phase()));
        if let Some(status) = banner {
            self.dispatch(page, Msg::BannerWatch(status));
        }
        if let Some(listener) = self.load_errors.as_mut() {
            listener.cancel(page);
        }
        self.sync_suppressed_calls(page);
    }

    fn on_ready_state<H: PageHost<Node = N>>(&mut self, page: &mut H, state: ReadyState) {
        if state >= ReadyState::Interactive {
            self.dispatch(page, Msg::DomContentLoaded);
        }
        if state == ReadyState::Complete {
            self.dispatch(page, Msg::WindowLoaded);
        }
    }

    fn sync_suppressed_calls<H: PageHost<Node = N>>(&mut self, page: &mut H) {
        if self.suppression.is_some() {
            let calls = self.suppressed_calls();
            self.dispatch(page, Msg::SuppressedCalls(calls));
        }
    }

    fn dispatch<H: PageHost<Node = N>>(&mut self, page: &mut H, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            for effect in effects {
                queue.extend(self.run_effect(page, effect));
            }
        }
    }

    fn run_effect<H: PageHost<Node = N>>(&mut self, page: &mut H, effect: Effect) -> Vec<Msg> {
        let Some(component) = effect.component() else {
            if let Effect::Mark(label) = effect {
                self.diagnostics.mark(label, page.now());
            }
            return Vec::new();
        };
        pagefix_debug!("Running {component}");
        let result = match effect {
            Effect::StartLongTaskMonitor => {
                self.diagnostics.start_long_task_monitor(page);
                Ok(Vec::new())
            }
            Effect::SuppressSignals => Ok(self.suppress_signals(page)),
            Effect::ApplyStyles => self.apply_styles(page),
            Effect::WatchLoadErrors => Ok(self.watch_load_errors(page)),
            Effect::ArmBannerWatch => self.arm_banner(page),
            Effect::Mark(_) => Ok(Vec::new()),
        };
        match result {
            Ok(msgs) => msgs,
            Err(err) => {
                pagefix_error!("{component} failed: {err}");
                vec![Msg::ComponentFailed {
                    component,
                    message: err.to_string(),
                }]
            }
        }
    }

    fn suppress_signals<H: PageHost<Node = N>>(&mut self, page: &mut H) -> Vec<Msg> {
        let config = self.state.config();
        let suppression =
            install_suppressor(page, &config.analytics_sink, config.analytics_log_threshold);
        self.suppression = suppression.counter;
        vec![Msg::SignalsHandled(suppression.outcome)]
    }

    fn apply_styles<H: PageHost<Node = N>>(&mut self, page: &mut H) -> Result<Vec<Msg>, ComponentError> {
        let _timer = self.diagnostics.time("style injection");
        let sheet = generate_stylesheet(self.state.config(), &self.selectors);
        for role in sheet.missing_roles() {
            pagefix_warn!("Selector for {role} is not defined; its styles are skipped");
        }
        let emitted_groups = sheet.emitted.len();
        let skipped_groups = sheet.skipped.len();
        let delivered = inject_styles(page, &sheet.css);
        self.stylesheet = Some(sheet);

        let delivery = match delivered? {
            InjectionPath::Privileged => StyleDelivery::Privileged,
            InjectionPath::Fallback(_) => StyleDelivery::FallbackElement,
        };
        Ok(vec![Msg::StylesApplied {
            delivery,
            emitted_groups,
            skipped_groups,
        }])
    }

    fn watch_load_errors<H: PageHost<Node = N>>(&mut self, page: &mut H) -> Vec<Msg> {
        let config = self.state.config();
        let listener = LoadErrorListener::arm(
            page,
            &config.analytics_script_marker,
            config.load_error_timeout(),
        );
        self.load_errors = Some(listener);
        vec![Msg::LoadErrorListenerArmed]
    }

    fn arm_banner<H: PageHost<Node = N>>(&mut self, page: &mut H) -> Result<Vec<Msg>, ComponentError> {
        let config = self.state.config();
        let Some(spec) =
            WatchSpec::cookie_banner(&self.selectors, config.banner_action, config.banner_timing)
        else {
            pagefix_warn!("Cookie banner selector is not defined; banner watch not armed");
            return Ok(vec![Msg::BannerWatch(BannerStatus::Skipped)]);
        };
        if page.document_element().is_none() {
            return Err(HostError::Unavailable("document element").into());
        }
        let watcher = ElementWatcher::arm(page, spec);
        let status = banner_status(watcher.phase());
        self.banner = Some(watcher);
        Ok(vec![Msg::BannerWatch(status)])
    }
}

fn banner_status(phase: WatchPhase) -> BannerStatus {
    match phase {
        WatchPhase::Armed => BannerStatus::Watching,
        WatchPhase::Acted => BannerStatus::Acted,
        WatchPhase::Abandoned => BannerStatus::Abandoned,
    }
}

fn sync_page_clock<H: PageHost>(page: &H) {
    let ms = u64::try_from(page.now().as_millis()).unwrap_or(u64::MAX);
    pagefix_logging::set_page_time_ms(ms);
}

/// Builds an orchestrator, starts it and runs the page to idle.
pub fn run_tuner<H: PageHost>(
    page: &mut H,
    config: TunerConfig,
    selectors: SelectorSet,
    guard: &ExecutionGuard,
) -> Result<(RunStatus, Orchestrator<H::Node>), OrchestratorError> {
    let mut orchestrator = Orchestrator::new(config, selectors)?;
    let status = orchestrator.start(page, guard);
    if status == RunStatus::Started {
        orchestrator.run_until_idle(page);
    }
    Ok((status, orchestrator))
}
