//! Neutralizes the page's analytics call sink.

use std::cell::RefCell;
use std::rc::Rc;

use pagefix_core::{CallReport, SignalOutcome, SinkScope, SuppressorState};
use pagefix_logging::{pagefix_debug, pagefix_info};
use serde_json::Value;

use crate::{CallSink, Capability, GlobalValue, PageHost};

const ARGS_PREVIEW_CHARS: usize = 120;

#[derive(Debug)]
struct Ledger {
    state: SuppressorState,
    log_lines: u64,
}

/// Shared view of an installed suppressing sink.
#[derive(Debug, Clone)]
pub struct SuppressionCounter(Rc<RefCell<Ledger>>);

impl SuppressionCounter {
    fn new(log_threshold: u64) -> Self {
        Self(Rc::new(RefCell::new(Ledger {
            state: SuppressorState::new(log_threshold),
            log_lines: 0,
        })))
    }

    /// Calls swallowed so far.
    pub fn calls(&self) -> u64 {
        self.0.borrow().state.calls()
    }

    /// Diagnostic lines written for those calls.
    pub fn log_lines(&self) -> u64 {
        self.0.borrow().log_lines
    }
}

/// Replacement `push` that drops every call.
struct SuppressingSink {
    name: String,
    ledger: SuppressionCounter,
}

impl CallSink for SuppressingSink {
    fn push(&mut self, entries: &mut Vec<Value>, args: &[Value]) -> usize {
        let mut ledger = self.ledger.0.borrow_mut();
        if let CallReport::Log { ordinal, last } = ledger.state.record() {
            ledger.log_lines += 1;
            let preview = preview_args(args);
            if last {
                pagefix_info!(
                    "Suppressed {}.push #{ordinal}: {preview} (further calls are silenced)",
                    self.name
                );
            } else {
                pagefix_info!("Suppressed {}.push #{ordinal}: {preview}", self.name);
            }
        }
        entries.len()
    }
}

fn preview_args(args: &[Value]) -> String {
    let text = Value::from(args.to_vec()).to_string();
    if text.chars().count() <= ARGS_PREVIEW_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(ARGS_PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

#[derive(Debug, Clone)]
pub struct Suppression {
    pub outcome: SignalOutcome,
    /// Present only when the sink was replaced.
    pub counter: Option<SuppressionCounter>,
}

impl Suppression {
    fn skipped(outcome: SignalOutcome) -> Self {
        Self {
            outcome,
            counter: None,
        }
    }
}

/// Replaces `push` of the named global call log with a sink that never forwards.
///
/// The privileged scope is preferred; the page scope is the fallback. A
/// missing sink is left missing.
pub fn install_suppressor<H: PageHost>(page: &mut H, sink_name: &str, log_threshold: u64) -> Suppression {
    let scope = if page.probe_global_scope(SinkScope::Privileged).is_available() {
        SinkScope::Privileged
    } else {
        pagefix_debug!("Privileged scope unavailable; using the page scope");
        SinkScope::Page
    };
    let globals = match page.probe_global_scope(scope) {
        Capability::Available(globals) => globals,
        Capability::Unavailable(api) => {
            pagefix_info!("{api} unavailable; {sink_name} left untouched");
            return Suppression::skipped(SignalOutcome::SinkMissing);
        }
    };

    match globals.get_mut(sink_name) {
        None => {
            pagefix_info!("{sink_name} not found; nothing to suppress");
            Suppression::skipped(SignalOutcome::SinkMissing)
        }
        Some(GlobalValue::CallLog(log)) if log.is_callable() => {
            let counter = SuppressionCounter::new(log_threshold);
            log.replace_push(Box::new(SuppressingSink {
                name: sink_name.to_string(),
                ledger: counter.clone(),
            }));
            let scope_name = match scope {
                SinkScope::Privileged => "privileged",
                SinkScope::Page => "page",
            };
            pagefix_info!("{sink_name}.push suppressed ({scope_name} scope)");
            Suppression {
                outcome: SignalOutcome::Installed { scope },
                counter: Some(counter),
            }
        }
        Some(_) => {
            pagefix_info!("{sink_name}.push is not a function; nothing to suppress");
            Suppression::skipped(SignalOutcome::NotCallable)
        }
    }
}
