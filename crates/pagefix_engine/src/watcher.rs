//! Host driver for [`WatchSession`].
//!
//! The session decides; the watcher performs lookups, owns the host handles
//! and applies the terminal action.

use std::collections::VecDeque;
use std::fmt;

use pagefix_core::{
    BannerAction, SelectorSet, TimerSlot, WatchCommand, WatchPhase, WatchSession, WatchTiming,
};
use pagefix_logging::{pagefix_debug, pagefix_info, pagefix_warn};

use crate::{MutationRecord, ObserveOptions, PageEvent, PageHost, ReadyState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalAction {
    /// Detach the node, then drop the listed classes from `<html>` and `<body>`.
    Remove { cleanup_classes: Vec<String> },
    /// Force `display: none !important` on the node.
    Hide,
}

/// What to watch for and what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    /// Name used in log lines.
    pub label: String,
    pub selector: String,
    pub action: TerminalAction,
    pub timing: WatchTiming,
}

impl WatchSpec {
    /// The cookie banner watch, or `None` when its selector is not defined.
    pub fn cookie_banner(
        selectors: &SelectorSet,
        action: BannerAction,
        timing: WatchTiming,
    ) -> Option<Self> {
        let selector = selectors.get(pagefix_core::SelectorRole::CookieBanner)?;
        let action = match action {
            BannerAction::Remove => TerminalAction::Remove {
                cleanup_classes: selectors
                    .banner_page_classes()
                    .map(str::to_string)
                    .collect(),
            },
            BannerAction::Hide => TerminalAction::Hide,
        };
        Some(Self {
            label: "cookie banner".to_string(),
            selector: selector.to_string(),
            action,
            timing,
        })
    }
}

pub struct ElementWatcher<N> {
    label: String,
    action: TerminalAction,
    session: WatchSession,
    acted_on: Option<N>,
    actions_applied: usize,
}

impl<N: Copy + Eq + fmt::Debug> ElementWatcher<N> {
    /// Looks for the target immediately and, if absent, starts watching.
    pub fn arm<H: PageHost<Node = N>>(page: &mut H, spec: WatchSpec) -> Self {
        let WatchSpec {
            label,
            selector,
            action,
            timing,
        } = spec;
        let mut watcher = Self {
            label,
            action,
            session: WatchSession::new(selector, timing),
            acted_on: None,
            actions_applied: 0,
        };
        pagefix_debug!("{}: armed for {:?}", watcher.label, watcher.selector());

        let found = watcher.lookup(page);
        let commands = watcher.session.on_immediate_check(found);
        watcher.execute(page, commands);
        watcher
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn selector(&self) -> &str {
        self.session.selector()
    }

    pub fn phase(&self) -> WatchPhase {
        self.session.phase()
    }

    pub fn is_terminal(&self) -> bool {
        self.session.is_terminal()
    }

    /// Subscription plus pending timers still held.
    pub fn live_handles(&self) -> usize {
        self.session.live_handles()
    }

    pub fn acted_on(&self) -> Option<N> {
        self.acted_on
    }

    pub fn actions_applied(&self) -> usize {
        self.actions_applied
    }

    /// Routes a host event to the session. Returns `false` for events that
    /// belong to someone else.
    pub fn handle_event<H: PageHost<Node = N>>(
        &mut self,
        page: &mut H,
        event: &PageEvent<N>,
    ) -> bool {
        let commands = match event {
            PageEvent::Mutations {
                subscription,
                records,
            } if self.session.subscription() == Some(*subscription) => {
                let found = self.scan(page, records);
                self.session.on_mutation(found)
            }
            PageEvent::Timer(id) => match self.session.timer_slot(*id) {
                Some(TimerSlot::Grace) => {
                    let found = self.lookup(page);
                    if found.is_none() && !self.session.is_terminal() {
                        pagefix_debug!("{}: not present after grace period", self.label);
                    }
                    self.session.on_grace_elapsed(found)
                }
                Some(TimerSlot::Abandon) => {
                    pagefix_info!("{}: never appeared, giving up", self.label);
                    self.session.on_abandon_elapsed()
                }
                None => return false,
            },
            _ => return false,
        };
        self.execute(page, commands);
        true
    }

    /// Stops watching without acting. Safe to call in any phase.
    pub fn cancel<H: PageHost<Node = N>>(&mut self, page: &mut H) {
        let commands = self.session.cancel();
        self.execute(page, commands);
    }

    fn lookup<H: PageHost<Node = N>>(&self, page: &H) -> Option<N> {
        match page.query_selector(self.selector()) {
            Ok(found) => found,
            Err(err) => {
                pagefix_warn!("{}: lookup failed: {err}", self.label);
                None
            }
        }
    }

    /// First match among added subtrees and changed attribute targets.
    fn scan<H: PageHost<Node = N>>(&self, page: &H, records: &[MutationRecord<N>]) -> Option<N> {
        for record in records {
            let result = match record {
                MutationRecord::ChildList { added, .. } => {
                    let mut result = Ok(None);
                    for node in added.iter().copied() {
                        if !page.is_attached(node) {
                            continue;
                        }
                        result = page.find_in_subtree(node, self.selector());
                        if !matches!(result, Ok(None)) {
                            break;
                        }
                    }
                    result
                }
                MutationRecord::Attributes { target, .. } => {
                    if !page.is_attached(*target) {
                        continue;
                    }
                    page.matches(*target, self.selector())
                        .map(|hit| hit.then_some(*target))
                }
            };
            match result {
                Ok(Some(node)) => return Some(node),
                Ok(None) => {}
                Err(err) => pagefix_warn!("{}: mutation scan failed: {err}", self.label),
            }
        }
        None
    }

    fn execute<H: PageHost<Node = N>>(&mut self, page: &mut H, commands: Vec<WatchCommand<N>>) {
        let mut queue = VecDeque::from(commands);
        while let Some(command) = queue.pop_front() {
            match command {
                WatchCommand::Act(node) => self.apply_action(page, node),
                WatchCommand::Subscribe => {
                    let observed = observe_root(page)
                        .ok_or(crate::HostError::Unavailable("document element"))
                        .and_then(|root| page.observe(root, ObserveOptions::subtree_changes()));
                    match observed {
                        Ok(id) => queue.extend(self.session.bind_subscription(id)),
                        Err(err) => {
                            pagefix_warn!(
                                "{}: cannot observe page changes ({err}); relying on the delayed check",
                                self.label
                            );
                            queue.extend(self.session.on_subscribe_failed());
                        }
                    }
                }
                WatchCommand::StartTimer { slot, after } => {
                    let id = page.set_timer(after);
                    queue.extend(self.session.bind_timer(slot, id));
                }
                WatchCommand::Unsubscribe(id) => page.disconnect(id),
                WatchCommand::CancelTimer(id) => page.clear_timer(id),
            }
        }
    }

    fn apply_action<H: PageHost<Node = N>>(&mut self, page: &mut H, node: N) {
        if let Some(previous) = self.acted_on {
            pagefix_debug!("{}: already acted on {previous:?}", self.label);
            return;
        }
        self.acted_on = Some(node);
        self.actions_applied += 1;

        match &self.action {
            TerminalAction::Remove { cleanup_classes } => {
                match page.remove_node(node) {
                    Ok(()) => pagefix_info!("{}: removed", self.label),
                    Err(err) => pagefix_warn!("{}: removal failed: {err}", self.label),
                }
                let roots = [page.document_element(), page.body()];
                for class in cleanup_classes {
                    for root in roots.iter().flatten() {
                        if let Err(err) = page.remove_class(*root, class) {
                            pagefix_warn!("{}: could not drop class {class}: {err}", self.label);
                        }
                    }
                }
            }
            TerminalAction::Hide => match page.set_style_property(node, "display", "none", true) {
                Ok(()) => pagefix_info!("{}: hidden", self.label),
                Err(err) => pagefix_warn!("{}: hiding failed: {err}", self.label),
            },
        }
    }
}

/// `<html>` while the document is still loading, else `<body>` (or `<html>`).
fn observe_root<H: PageHost>(page: &H) -> Option<H::Node> {
    if page.ready_state() == ReadyState::Loading {
        page.document_element()
    } else {
        page.body().or_else(|| page.document_element())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedPage;
    use pretty_assertions::assert_eq;

    fn spec(action: TerminalAction) -> WatchSpec {
        WatchSpec {
            label: "banner".to_string(),
            selector: ".banner".to_string(),
            action,
            timing: WatchTiming::default(),
        }
    }

    #[test]
    fn hide_keeps_the_node() {
        let mut page = SimulatedPage::from_html("<body><div class=\"banner\"></div></body>");
        let watcher = ElementWatcher::arm(&mut page, spec(TerminalAction::Hide));
        let node = watcher.acted_on().unwrap();
        assert!(page.is_attached(node));
        assert_eq!(
            page.inline_style(node, "display").as_deref(),
            Some("none !important")
        );
    }

    #[test]
    fn invalid_selector_is_logged_not_fatal() {
        let mut page = SimulatedPage::from_html("<body></body>");
        let mut watch = spec(TerminalAction::Hide);
        watch.selector = "div[[[".to_string();
        let mut watcher = ElementWatcher::arm(&mut page, watch);
        assert_eq!(watcher.phase(), WatchPhase::Armed);
        watcher.cancel(&mut page);
        assert_eq!(watcher.phase(), WatchPhase::Abandoned);
        assert_eq!(page.active_subscriptions(), 0);
        assert_eq!(page.pending_timers(), 0);
    }

    #[test]
    fn cookie_banner_spec_follows_selectors() {
        let selectors = SelectorSet::default();
        let spec = WatchSpec::cookie_banner(&selectors, BannerAction::Remove, WatchTiming::default())
            .unwrap();
        assert_eq!(spec.selector, ".glue-cookie-notification-bar");
        assert_eq!(
            spec.action,
            TerminalAction::Remove {
                cleanup_classes: vec!["glue-cookie-notification-bar-visible".to_string()]
            }
        );

        let blank = SelectorSet {
            cookie_banner: " ".to_string(),
            ..SelectorSet::default()
        };
        assert_eq!(
            WatchSpec::cookie_banner(&blank, BannerAction::Hide, WatchTiming::default()),
            None
        );
    }
}
