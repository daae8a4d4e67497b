//! Deterministic, single-threaded page host.
//!
//! `SimulatedPage` keeps a parsed document, a virtual clock and a queue of
//! timers and scheduled page activity. Mutation records produced by a change
//! are queued per subscription and delivered before the next timer or task,
//! the way a browser drains microtasks before the next macrotask.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use ego_tree::NodeId;
use pagefix_core::{SinkScope, SubscriptionId, TimerId};
use pagefix_logging::pagefix_debug;
use serde_json::Value;

use crate::dom::{parse_selector, DomTree};
use crate::{
    CallLog, Capability, GlobalObject, GlobalValue, HostError, MutationRecord, ObserveOptions,
    PageEvent, PageHost, ReadyState, StyleChannel,
};

/// Privileged style channel of the simulated page.
#[derive(Debug, Default)]
pub struct PrivilegedStyles {
    sheets: Vec<String>,
    failure: Option<String>,
}

impl StyleChannel for PrivilegedStyles {
    fn add_style(&mut self, css: &str) -> Result<(), HostError> {
        if let Some(reason) = &self.failure {
            return Err(HostError::Rejected(reason.clone()));
        }
        self.sheets.push(css.to_string());
        Ok(())
    }
}

#[derive(Debug)]
enum StyleChannelState {
    Present(PrivilegedStyles),
    Missing,
}

#[derive(Debug)]
struct Subscription {
    target: NodeId,
    options: ObserveOptions,
    pending: Vec<MutationRecord<NodeId>>,
}

/// Host page activity scheduled on the virtual clock.
#[derive(Debug, Clone)]
enum PageTask {
    InsertHtml { parent: String, markup: String },
    AttachHead(String),
    AttachBody(String),
    SetReadyState(ReadyState),
    PushToSink { sink: String, args: Vec<Value> },
    ResourceError(String),
    LongTask(Duration),
}

#[derive(Debug)]
enum Scheduled {
    Timer(TimerId),
    Task(PageTask),
}

pub struct SimulatedPage {
    dom: DomTree,
    ready_state: ReadyState,
    clock: Duration,
    next_handle: u64,
    style_channel: StyleChannelState,
    mutation_observer: bool,
    long_task_timing: bool,
    long_tasks_observed: bool,
    privileged_scope: bool,
    globals: GlobalObject,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    queue: BTreeMap<(Duration, u64), Scheduled>,
    timers: HashMap<TimerId, (Duration, u64)>,
    style_elements: Vec<NodeId>,
}

impl SimulatedPage {
    /// A fully parsed document (`readyState == interactive`) with every host API available.
    pub fn from_html(markup: &str) -> Self {
        Self::with_dom(DomTree::parse(markup), ReadyState::Interactive)
    }

    /// A document at script start: only `<html>` exists and it is still loading.
    pub fn loading() -> Self {
        Self::with_dom(DomTree::bare(), ReadyState::Loading)
    }

    fn with_dom(dom: DomTree, ready_state: ReadyState) -> Self {
        Self {
            dom,
            ready_state,
            clock: Duration::ZERO,
            next_handle: 1,
            style_channel: StyleChannelState::Present(PrivilegedStyles::default()),
            mutation_observer: true,
            long_task_timing: true,
            long_tasks_observed: false,
            privileged_scope: true,
            globals: GlobalObject::default(),
            subscriptions: BTreeMap::new(),
            queue: BTreeMap::new(),
            timers: HashMap::new(),
            style_elements: Vec::new(),
        }
    }

    pub fn with_ready_state(mut self, state: ReadyState) -> Self {
        self.ready_state = state;
        self
    }

    pub fn without_style_channel(mut self) -> Self {
        self.style_channel = StyleChannelState::Missing;
        self
    }

    /// The privileged channel exists but rejects every stylesheet.
    pub fn with_failing_style_channel(mut self, reason: &str) -> Self {
        self.style_channel = StyleChannelState::Present(PrivilegedStyles {
            sheets: Vec::new(),
            failure: Some(reason.to_string()),
        });
        self
    }

    pub fn without_mutation_observer(mut self) -> Self {
        self.mutation_observer = false;
        self
    }

    pub fn without_privileged_scope(mut self) -> Self {
        self.privileged_scope = false;
        self
    }

    pub fn without_long_task_timing(mut self) -> Self {
        self.long_task_timing = false;
        self
    }

    pub fn with_global(mut self, name: &str, value: GlobalValue) -> Self {
        self.globals.insert(name, value);
        self
    }

    /// Installs an appending call log (e.g. an analytics queue) under `name`.
    pub fn with_call_log(self, name: &str) -> Self {
        self.with_global(name, GlobalValue::CallLog(CallLog::new()))
    }

    // Synchronous host page activity.

    /// Appends `markup` to the first element matching `parent`.
    pub fn insert_html(&mut self, parent: &str, markup: &str) -> Result<Vec<NodeId>, HostError> {
        let selector = parse_selector(parent)?;
        let target = self
            .dom
            .query(&selector)
            .ok_or_else(|| HostError::Rejected(format!("no element matches {parent:?}")))?;
        let added = self.dom.graft_fragment(target, markup)?;
        self.record_child_list(target, added.clone());
        Ok(added)
    }

    pub fn attach_head(&mut self, markup: &str) -> Result<NodeId, HostError> {
        self.attach_section("head", markup)
    }

    pub fn attach_body(&mut self, markup: &str) -> Result<NodeId, HostError> {
        self.attach_section("body", markup)
    }

    fn attach_section(&mut self, section: &str, markup: &str) -> Result<NodeId, HostError> {
        let node = self.dom.graft_section(section, markup)?;
        if let Some(root) = self.dom.document_element() {
            self.record_child_list(root, vec![node]);
        }
        Ok(node)
    }

    /// Calls `push` on the named global call log, as page code would.
    pub fn call_sink(&mut self, name: &str, args: &[Value]) -> Result<usize, HostError> {
        match self.globals.get_mut(name) {
            Some(GlobalValue::CallLog(log)) => log.call_push(args),
            Some(GlobalValue::Data(_)) => Err(HostError::Rejected(format!("{name} has no push"))),
            None => Err(HostError::Rejected(format!("{name} is not defined"))),
        }
    }

    // Activity scheduled relative to the current virtual time.

    pub fn schedule_insert(&mut self, after: Duration, parent: &str, markup: &str) {
        self.schedule(
            after,
            Scheduled::Task(PageTask::InsertHtml {
                parent: parent.to_string(),
                markup: markup.to_string(),
            }),
        );
    }

    pub fn schedule_head(&mut self, after: Duration, markup: &str) {
        self.schedule(after, Scheduled::Task(PageTask::AttachHead(markup.to_string())));
    }

    pub fn schedule_body(&mut self, after: Duration, markup: &str) {
        self.schedule(after, Scheduled::Task(PageTask::AttachBody(markup.to_string())));
    }

    pub fn schedule_ready_state(&mut self, after: Duration, state: ReadyState) {
        self.schedule(after, Scheduled::Task(PageTask::SetReadyState(state)));
    }

    pub fn schedule_sink_push(&mut self, after: Duration, sink: &str, args: Vec<Value>) {
        self.schedule(
            after,
            Scheduled::Task(PageTask::PushToSink {
                sink: sink.to_string(),
                args,
            }),
        );
    }

    pub fn schedule_resource_error(&mut self, after: Duration, source: &str) {
        self.schedule(after, Scheduled::Task(PageTask::ResourceError(source.to_string())));
    }

    pub fn schedule_long_task(&mut self, after: Duration, duration: Duration) {
        self.schedule(after, Scheduled::Task(PageTask::LongTask(duration)));
    }

    // Inspection.

    /// Stylesheets accepted by the privileged channel.
    pub fn privileged_styles(&self) -> &[String] {
        match &self.style_channel {
            StyleChannelState::Present(styles) => &styles.sheets,
            StyleChannelState::Missing => &[],
        }
    }

    /// Text of every attached `<style>` element added through the host.
    pub fn style_elements(&self) -> Vec<String> {
        self.style_elements
            .iter()
            .filter(|id| self.dom.is_attached(**id))
            .filter_map(|id| self.dom.text(*id))
            .collect()
    }

    /// Stylesheets added through either channel.
    pub fn stylesheet_count(&self) -> usize {
        self.privileged_styles().len() + self.style_elements().len()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Value of one declaration in the node's `style` attribute.
    pub fn inline_style(&self, node: NodeId, property: &str) -> Option<String> {
        let style = self.dom.attr(node, "style")?;
        let value = style_declarations(&style)
            .find(|(name, _)| *name == property)
            .map(|(_, value)| value.to_string());
        value
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.dom.has_class(node, class)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.dom.attr(node, name)
    }

    /// Number of attached elements matching `selector`.
    pub fn count(&self, selector: &str) -> Result<usize, HostError> {
        Ok(self.dom.query_all(&parse_selector(selector)?).len())
    }

    pub fn global(&self, name: &str) -> Option<&GlobalValue> {
        self.globals.get(name)
    }

    pub fn call_log(&self, name: &str) -> Option<&CallLog> {
        self.globals.call_log(name)
    }

    pub fn to_html(&self) -> String {
        self.dom.serialize()
    }

    fn allocate_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn schedule(&mut self, after: Duration, item: Scheduled) -> (Duration, u64) {
        let key = (self.clock + after, self.allocate_handle());
        self.queue.insert(key, item);
        key
    }

    fn record_child_list(&mut self, target: NodeId, added: Vec<NodeId>) {
        for subscription in self.subscriptions.values_mut() {
            if !subscription.options.child_list {
                continue;
            }
            if covers(&self.dom, subscription, target) {
                subscription.pending.push(MutationRecord::ChildList {
                    target,
                    added: added.clone(),
                });
            }
        }
    }

    fn record_attribute(&mut self, target: NodeId, name: &str) {
        for subscription in self.subscriptions.values_mut() {
            if !subscription.options.attributes {
                continue;
            }
            if covers(&self.dom, subscription, target) {
                subscription.pending.push(MutationRecord::Attributes {
                    target,
                    name: name.to_string(),
                });
            }
        }
    }

    fn take_mutation_batch(&mut self) -> Option<PageEvent<NodeId>> {
        let (id, subscription) = self
            .subscriptions
            .iter_mut()
            .find(|(_, subscription)| !subscription.pending.is_empty())?;
        Some(PageEvent::Mutations {
            subscription: *id,
            records: std::mem::take(&mut subscription.pending),
        })
    }

    fn run_task(&mut self, task: PageTask) -> Option<PageEvent<NodeId>> {
        match task {
            PageTask::InsertHtml { parent, markup } => {
                if let Err(err) = self.insert_html(&parent, &markup) {
                    pagefix_debug!("Scheduled insert into {parent:?} skipped: {err}");
                }
                None
            }
            PageTask::AttachHead(markup) => {
                if let Err(err) = self.attach_head(&markup) {
                    pagefix_debug!("Scheduled <head> skipped: {err}");
                }
                None
            }
            PageTask::AttachBody(markup) => {
                if let Err(err) = self.attach_body(&markup) {
                    pagefix_debug!("Scheduled <body> skipped: {err}");
                }
                None
            }
            PageTask::SetReadyState(state) => {
                if state <= self.ready_state {
                    return None;
                }
                self.ready_state = state;
                Some(PageEvent::ReadyStateChanged(state))
            }
            PageTask::PushToSink { sink, args } => {
                if let Err(err) = self.call_sink(&sink, &args) {
                    pagefix_debug!("Page call to {sink}.push failed: {err}");
                }
                None
            }
            PageTask::ResourceError(source) => Some(PageEvent::ResourceError { source }),
            PageTask::LongTask(duration) => self
                .long_tasks_observed
                .then_some(PageEvent::LongTask { duration }),
        }
    }
}

fn style_declarations(style: &str) -> impl Iterator<Item = (&str, &str)> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
}

fn covers(dom: &DomTree, subscription: &Subscription, node: NodeId) -> bool {
    subscription.target == node
        || (subscription.options.subtree && dom.contains(subscription.target, node))
}

impl PageHost for SimulatedPage {
    type Node = NodeId;

    fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    fn now(&self) -> Duration {
        self.clock
    }

    fn document_element(&self) -> Option<NodeId> {
        self.dom.document_element()
    }

    fn head(&self) -> Option<NodeId> {
        self.dom.head()
    }

    fn body(&self) -> Option<NodeId> {
        self.dom.body()
    }

    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, HostError> {
        Ok(self.dom.query(&parse_selector(selector)?))
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, HostError> {
        Ok(self.dom.matches(node, &parse_selector(selector)?))
    }

    fn find_in_subtree(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, HostError> {
        Ok(self.dom.find_in_subtree(node, &parse_selector(selector)?))
    }

    fn is_attached(&self, node: NodeId) -> bool {
        self.dom.is_attached(node)
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), HostError> {
        let parent = self.dom.parent(node);
        self.dom.detach(node)?;
        if let Some(parent) = parent {
            self.record_child_list(parent, Vec::new());
        }
        Ok(())
    }

    fn set_style_property(
        &mut self,
        node: NodeId,
        property: &str,
        value: &str,
        important: bool,
    ) -> Result<(), HostError> {
        let current = self.dom.attr(node, "style").unwrap_or_default();
        let priority = if important { " !important" } else { "" };
        let mut declarations: Vec<String> = style_declarations(&current)
            .filter(|(name, _)| *name != property)
            .map(|(name, value)| format!("{name}: {value}"))
            .collect();
        declarations.push(format!("{property}: {value}{priority}"));
        self.dom
            .set_attribute(node, "style", Some(&format!("{};", declarations.join("; "))))?;
        self.record_attribute(node, "style");
        Ok(())
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), HostError> {
        if !self.dom.is_attached(node) {
            return Err(HostError::Detached);
        }
        if !self.has_class(node, class) {
            return Ok(());
        }
        let remaining: Vec<String> = self
            .dom
            .attr(node, "class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|name| *name != class)
            .map(str::to_string)
            .collect();
        let value = remaining.join(" ");
        self.dom
            .set_attribute(node, "class", (!value.is_empty()).then_some(value.as_str()))?;
        self.record_attribute(node, "class");
        Ok(())
    }

    fn append_style_element(
        &mut self,
        parent: NodeId,
        id: &str,
        css: &str,
    ) -> Result<NodeId, HostError> {
        if css.to_ascii_lowercase().contains("</style") {
            return Err(HostError::Rejected(
                "style text closes its own element".to_string(),
            ));
        }
        let added = self
            .dom
            .graft_fragment(parent, &format!("<style id=\"{id}\">{css}</style>"))?;
        let node = added
            .first()
            .copied()
            .ok_or_else(|| HostError::Rejected("style element was not created".to_string()))?;
        self.style_elements.push(node);
        self.record_child_list(parent, added);
        Ok(node)
    }

    fn probe_style_channel(&mut self) -> Capability<&mut dyn StyleChannel> {
        match &mut self.style_channel {
            StyleChannelState::Present(styles) => Capability::Available(styles),
            StyleChannelState::Missing => Capability::Unavailable("privileged style channel"),
        }
    }

    fn probe_global_scope(&mut self, scope: SinkScope) -> Capability<&mut GlobalObject> {
        match scope {
            SinkScope::Privileged if !self.privileged_scope => {
                Capability::Unavailable("privileged page scope")
            }
            SinkScope::Privileged | SinkScope::Page => Capability::Available(&mut self.globals),
        }
    }

    fn observe_long_tasks(&mut self) -> Capability<()> {
        if !self.long_task_timing {
            return Capability::Unavailable("long task timing");
        }
        self.long_tasks_observed = true;
        Capability::Available(())
    }

    fn observe(
        &mut self,
        target: NodeId,
        options: ObserveOptions,
    ) -> Result<SubscriptionId, HostError> {
        if !self.mutation_observer {
            return Err(HostError::Unavailable("mutation observer"));
        }
        if !self.dom.is_attached(target) {
            return Err(HostError::Detached);
        }
        let id = SubscriptionId(self.allocate_handle());
        self.subscriptions.insert(
            id,
            Subscription {
                target,
                options,
                pending: Vec::new(),
            },
        );
        Ok(id)
    }

    fn disconnect(&mut self, id: SubscriptionId) {
        self.subscriptions.remove(&id);
    }

    fn set_timer(&mut self, delay: Duration) -> TimerId {
        let id = TimerId(self.next_handle);
        let key = self.schedule(delay, Scheduled::Timer(id));
        self.timers.insert(id, key);
        id
    }

    fn clear_timer(&mut self, id: TimerId) {
        if let Some(key) = self.timers.remove(&id) {
            self.queue.remove(&key);
        }
    }

    fn next_event(&mut self) -> Option<PageEvent<NodeId>> {
        loop {
            if let Some(batch) = self.take_mutation_batch() {
                return Some(batch);
            }
            let ((at, seq), item) = self.queue.pop_first()?;
            self.clock = self.clock.max(at);
            match item {
                Scheduled::Timer(id) => {
                    if self.timers.remove(&id) == Some((at, seq)) {
                        return Some(PageEvent::Timer(id));
                    }
                }
                Scheduled::Task(task) => {
                    if let Some(event) = self.run_task(task) {
                        return Some(event);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn timers_fire_in_virtual_time_order() {
        let mut page = SimulatedPage::from_html("<body></body>");
        let late = page.set_timer(Duration::from_millis(500));
        let early = page.set_timer(Duration::from_millis(100));
        assert_eq!(page.next_event(), Some(PageEvent::Timer(early)));
        assert_eq!(page.now(), Duration::from_millis(100));
        assert_eq!(page.next_event(), Some(PageEvent::Timer(late)));
        assert_eq!(page.next_event(), None);
    }

    #[test]
    fn cleared_timer_never_fires() {
        let mut page = SimulatedPage::from_html("<body></body>");
        let id = page.set_timer(Duration::from_millis(10));
        page.clear_timer(id);
        page.clear_timer(id);
        assert_eq!(page.pending_timers(), 0);
        assert_eq!(page.next_event(), None);
    }

    #[test]
    fn mutations_are_delivered_before_timers() {
        let mut page = SimulatedPage::from_html("<body><main></main></body>");
        let body = page.body().unwrap();
        let id = page.observe(body, ObserveOptions::subtree_changes()).unwrap();
        let timer = page.set_timer(Duration::ZERO);
        let added = page.insert_html("main", "<p>x</p>").unwrap();

        let main = page.query_selector("main").unwrap().unwrap();
        assert_eq!(
            page.next_event(),
            Some(PageEvent::Mutations {
                subscription: id,
                records: vec![MutationRecord::ChildList {
                    target: main,
                    added,
                }],
            })
        );
        assert_eq!(page.next_event(), Some(PageEvent::Timer(timer)));
    }

    #[test]
    fn disconnect_drops_undelivered_records() {
        let mut page = SimulatedPage::from_html("<body></body>");
        let body = page.body().unwrap();
        let id = page.observe(body, ObserveOptions::subtree_changes()).unwrap();
        page.insert_html("body", "<p></p>").unwrap();
        page.disconnect(id);
        assert_eq!(page.active_subscriptions(), 0);
        assert_eq!(page.next_event(), None);
    }

    #[test]
    fn scheduled_body_reaches_root_subscription() {
        let mut page = SimulatedPage::loading();
        let root = page.document_element().unwrap();
        let id = page.observe(root, ObserveOptions::subtree_changes()).unwrap();
        page.schedule_body(Duration::from_millis(20), "<div class=\"bar\"></div>");

        match page.next_event() {
            Some(PageEvent::Mutations { subscription, records }) => {
                assert_eq!(subscription, id);
                assert_eq!(records.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(page.now(), Duration::from_millis(20));
        assert!(page.body().is_some());
    }

    #[test]
    fn ready_state_only_moves_forward() {
        let mut page = SimulatedPage::loading();
        page.schedule_ready_state(Duration::from_millis(5), ReadyState::Complete);
        page.schedule_ready_state(Duration::from_millis(6), ReadyState::Interactive);
        assert_eq!(
            page.next_event(),
            Some(PageEvent::ReadyStateChanged(ReadyState::Complete))
        );
        assert_eq!(page.next_event(), None);
        assert_eq!(page.ready_state(), ReadyState::Complete);
    }

    #[test]
    fn long_tasks_need_an_observer() {
        let mut page = SimulatedPage::from_html("<body></body>");
        page.schedule_long_task(Duration::from_millis(1), Duration::from_millis(80));
        assert_eq!(page.next_event(), None);

        assert!(page.observe_long_tasks().is_available());
        page.schedule_long_task(Duration::from_millis(1), Duration::from_millis(80));
        assert_eq!(
            page.next_event(),
            Some(PageEvent::LongTask {
                duration: Duration::from_millis(80)
            })
        );

        let mut bare = SimulatedPage::from_html("").without_long_task_timing();
        assert_eq!(
            bare.observe_long_tasks(),
            Capability::Unavailable("long task timing")
        );
    }

    #[test]
    fn scheduled_sink_push_reaches_the_call_log() {
        let mut page = SimulatedPage::from_html("<body></body>").with_call_log("dataLayer");
        page.schedule_sink_push(Duration::from_millis(3), "dataLayer", vec![json!({"event": "x"})]);
        assert_eq!(page.next_event(), None);
        assert_eq!(
            page.call_log("dataLayer").map(|log| log.entries().len()),
            Some(1)
        );
    }

    #[test]
    fn inline_style_and_class_removal() {
        let mut page =
            SimulatedPage::from_html("<body class=\"a b\"><div id=\"x\"></div></body>");
        let body = page.body().unwrap();
        let div = page.query_selector("#x").unwrap().unwrap();

        page.set_style_property(div, "display", "none", true).unwrap();
        assert_eq!(
            page.inline_style(div, "display").as_deref(),
            Some("none !important")
        );
        assert!(page.to_html().contains("style=\"display: none !important;\""));

        page.remove_class(body, "a").unwrap();
        assert!(!page.has_class(body, "a"));
        assert!(page.has_class(body, "b"));

        page.remove_node(div).unwrap();
        assert_eq!(
            page.set_style_property(div, "color", "red", false),
            Err(HostError::Detached)
        );
    }

    #[test]
    fn style_element_is_appended_once() {
        let mut page = SimulatedPage::from_html("<head></head><body></body>");
        let head = page.head().unwrap();
        page.append_style_element(head, "s", "p { color: red; }").unwrap();
        assert_eq!(page.style_elements(), vec!["p { color: red; }".to_string()]);
        assert_eq!(page.count("style#s").unwrap(), 1);
        assert!(page
            .append_style_element(head, "s", "</style><script>")
            .is_err());
        assert_eq!(page.stylesheet_count(), 1);
    }

    #[test]
    fn observer_can_be_missing() {
        let mut page = SimulatedPage::from_html("<body></body>").without_mutation_observer();
        let body = page.body().unwrap();
        assert_eq!(
            page.observe(body, ObserveOptions::subtree_changes()),
            Err(HostError::Unavailable("mutation observer"))
        );
    }
}
