//! Pagefix engine: the page host abstraction, a simulated host, and the
//! components that act on the page.
mod diagnostics;
mod dom;
mod host;
mod injector;
mod load_errors;
mod orchestrator;
mod simulated;
mod suppressor;
mod types;
mod watcher;

pub use diagnostics::{Diagnostics, ExecutionTimer, Mark};
pub use host::{AppendSink, CallLog, CallSink, GlobalObject, GlobalValue, PageHost, StyleChannel};
pub use injector::{inject_styles, InjectError, InjectionPath, STYLE_ELEMENT_ID};
pub use load_errors::{LoadErrorListener, LoadErrorOutcome};
pub use orchestrator::{run_tuner, Orchestrator, OrchestratorError, RunStatus};
pub use simulated::{PrivilegedStyles, SimulatedPage};
pub use suppressor::{install_suppressor, Suppression, SuppressionCounter};
pub use types::{
    Capability, HostError, MutationRecord, ObserveOptions, PageEvent, ReadyState,
};
pub use watcher::{ElementWatcher, TerminalAction, WatchSpec};

/// Node handle used by [`SimulatedPage`].
pub use ego_tree::NodeId;
