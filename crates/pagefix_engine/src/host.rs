//! The host page seen by the tuner.
//!
//! Everything the components need from the page goes through [`PageHost`];
//! optional APIs are probed and reported as [`Capability`] values.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use pagefix_core::{SinkScope, SubscriptionId, TimerId};
use serde_json::Value;

use crate::{Capability, HostError, ObserveOptions, PageEvent, ReadyState};

/// Privileged "add style text to page" primitive.
pub trait StyleChannel {
    fn add_style(&mut self, css: &str) -> Result<(), HostError>;
}

/// Implementation behind a call log's `push`.
pub trait CallSink {
    /// Handles one `push(...args)` call and returns the resulting log length.
    fn push(&mut self, entries: &mut Vec<Value>, args: &[Value]) -> usize;
}

/// Default `push`: appends every argument to the log.
#[derive(Debug, Default)]
pub struct AppendSink;

impl CallSink for AppendSink {
    fn push(&mut self, entries: &mut Vec<Value>, args: &[Value]) -> usize {
        entries.extend(args.iter().cloned());
        entries.len()
    }
}

/// Page-global appendable call log, e.g. an analytics `dataLayer`.
pub struct CallLog {
    entries: Vec<Value>,
    push: Option<Box<dyn CallSink>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::with_sink(Box::new(AppendSink))
    }

    pub fn with_sink(sink: Box<dyn CallSink>) -> Self {
        Self {
            entries: Vec::new(),
            push: Some(sink),
        }
    }

    /// A log whose `push` member is missing or not a function.
    pub fn without_push() -> Self {
        Self {
            entries: Vec::new(),
            push: None,
        }
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn is_callable(&self) -> bool {
        self.push.is_some()
    }

    pub fn call_push(&mut self, args: &[Value]) -> Result<usize, HostError> {
        match &mut self.push {
            Some(sink) => Ok(sink.push(&mut self.entries, args)),
            None => Err(HostError::Rejected("push is not a function".to_string())),
        }
    }

    /// Swaps the `push` implementation, returning the previous one.
    pub fn replace_push(&mut self, sink: Box<dyn CallSink>) -> Option<Box<dyn CallSink>> {
        self.push.replace(sink)
    }
}

impl Default for CallLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallLog")
            .field("entries", &self.entries)
            .field("callable", &self.is_callable())
            .finish()
    }
}

#[derive(Debug)]
pub enum GlobalValue {
    CallLog(CallLog),
    Data(Value),
}

/// Named globals of one script scope.
#[derive(Debug, Default)]
pub struct GlobalObject {
    values: HashMap<String, GlobalValue>,
}

impl GlobalObject {
    pub fn insert(&mut self, name: impl Into<String>, value: GlobalValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&GlobalValue> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GlobalValue> {
        self.values.get_mut(name)
    }

    pub fn call_log(&self, name: &str) -> Option<&CallLog> {
        match self.values.get(name) {
            Some(GlobalValue::CallLog(log)) => Some(log),
            _ => None,
        }
    }
}

/// Single-threaded view of the host page.
///
/// Reads and writes are synchronous. Mutation records, timers and lifecycle
/// changes are queued by the host and handed out one at a time through
/// [`PageHost::next_event`], mutation batches first.
pub trait PageHost {
    type Node: Copy + Eq + fmt::Debug;

    fn ready_state(&self) -> ReadyState;
    /// Time since navigation start.
    fn now(&self) -> Duration;

    fn document_element(&self) -> Option<Self::Node>;
    fn head(&self) -> Option<Self::Node>;
    fn body(&self) -> Option<Self::Node>;

    fn query_selector(&self, selector: &str) -> Result<Option<Self::Node>, HostError>;
    fn matches(&self, node: Self::Node, selector: &str) -> Result<bool, HostError>;
    /// First match among `node` and its descendants.
    fn find_in_subtree(
        &self,
        node: Self::Node,
        selector: &str,
    ) -> Result<Option<Self::Node>, HostError>;
    fn is_attached(&self, node: Self::Node) -> bool;

    fn remove_node(&mut self, node: Self::Node) -> Result<(), HostError>;
    fn set_style_property(
        &mut self,
        node: Self::Node,
        property: &str,
        value: &str,
        important: bool,
    ) -> Result<(), HostError>;
    fn remove_class(&mut self, node: Self::Node, class: &str) -> Result<(), HostError>;
    fn append_style_element(
        &mut self,
        parent: Self::Node,
        id: &str,
        css: &str,
    ) -> Result<Self::Node, HostError>;

    fn probe_style_channel(&mut self) -> Capability<&mut dyn StyleChannel>;
    fn probe_global_scope(&mut self, scope: SinkScope) -> Capability<&mut GlobalObject>;
    /// Starts long-task reporting if the host supports it.
    fn observe_long_tasks(&mut self) -> Capability<()>;

    fn observe(
        &mut self,
        target: Self::Node,
        options: ObserveOptions,
    ) -> Result<SubscriptionId, HostError>;
    /// Stops a subscription and drops its undelivered records. Unknown ids are ignored.
    fn disconnect(&mut self, id: SubscriptionId);
    fn set_timer(&mut self, delay: Duration) -> TimerId;
    /// Cancels a pending timer. Unknown or fired ids are ignored.
    fn clear_timer(&mut self, id: TimerId);

    fn next_event(&mut self) -> Option<PageEvent<Self::Node>>;
}
