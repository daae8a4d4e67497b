use crate::{BannerStatus, Component, SignalOutcome, StyleDelivery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Script entry at the earliest load phase.
    ScriptStarted,
    /// The document element exists; transient element watches may be armed.
    DocumentRootReady,
    /// Host fired `DOMContentLoaded`.
    DomContentLoaded,
    /// Host fired `load`.
    WindowLoaded,
    /// Stylesheet delivered through one of the injection channels.
    StylesApplied {
        delivery: StyleDelivery,
        emitted_groups: usize,
        skipped_groups: usize,
    },
    /// Outcome of the analytics sink override.
    SignalsHandled(SignalOutcome),
    /// Current value of the suppressed-call counter.
    SuppressedCalls(u64),
    /// Banner watch changed status (armed, acted, abandoned, skipped).
    BannerWatch(BannerStatus),
    /// The load-error listener is waiting for the analytics loader.
    LoadErrorListenerArmed,
    /// The analytics loader reported a load error.
    LoadErrorSeen,
    /// The load-error listener timed out without a match.
    LoadErrorListenerExpired,
    /// Host reported a task above the long-task threshold.
    LongTaskObserved { duration_ms: u64 },
    /// A component failed inside its boundary; siblings keep running.
    ComponentFailed { component: Component, message: String },
}
