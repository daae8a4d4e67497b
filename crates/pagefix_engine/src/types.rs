use std::fmt;
use std::time::Duration;

use pagefix_core::{SubscriptionId, TimerId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("{0} is not available")]
    Unavailable(&'static str),
    #[error("invalid selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("node is not attached to the document")]
    Detached,
    #[error("host rejected the operation: {0}")]
    Rejected(String),
}

/// Result of probing an optional host API at component entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<T> {
    Available(T),
    /// Names the missing API for diagnostics.
    Unavailable(&'static str),
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadyState::Loading => "loading",
            ReadyState::Interactive => "interactive",
            ReadyState::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
    pub attributes: bool,
}

impl ObserveOptions {
    /// Additions and attribute changes anywhere below the target.
    pub fn subtree_changes() -> Self {
        Self {
            child_list: true,
            subtree: true,
            attributes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord<N> {
    ChildList { target: N, added: Vec<N> },
    Attributes { target: N, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent<N> {
    /// Batch of records queued for one subscription.
    Mutations {
        subscription: SubscriptionId,
        records: Vec<MutationRecord<N>>,
    },
    Timer(TimerId),
    ReadyStateChanged(ReadyState),
    /// A resource (script, image, ...) failed to load.
    ResourceError { source: String },
    /// A task blocked the main thread; only sent while long tasks are observed.
    LongTask { duration: Duration },
}
