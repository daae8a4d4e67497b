//! Detect-once / act-once watch sessions.
//!
//! A session reconciles three detection paths: an immediate lookup at arm
//! time, a live subscription to DOM changes, and a delayed fallback lookup.
//! The session is pure: every transition returns the commands the host driver
//! has to execute, in order. Handles obtained by executing `Subscribe` and
//! `StartTimer` are bound back into the session so that the transition into a
//! terminal phase can release them.

use std::time::Duration;

use crate::config::WatchTiming;

/// Opaque handle for a live DOM-change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Opaque handle for a pending host timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Armed,
    Acted,
    Abandoned,
}

impl WatchPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WatchPhase::Armed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSlot {
    Grace,
    Abandon,
}

/// Work the host driver performs on behalf of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand<N> {
    /// Apply the terminal action to the found node.
    Act(N),
    Subscribe,
    StartTimer { slot: TimerSlot, after: Duration },
    Unsubscribe(SubscriptionId),
    CancelTimer(TimerId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSession {
    selector: String,
    grace: Duration,
    abandon: Option<Duration>,
    phase: WatchPhase,
    checked: bool,
    subscription: Option<SubscriptionId>,
    grace_timer: Option<TimerId>,
    abandon_timer: Option<TimerId>,
}

impl WatchSession {
    pub fn new(selector: impl Into<String>, timing: WatchTiming) -> Self {
        Self {
            selector: selector.into(),
            grace: timing.grace(),
            abandon: timing.abandon(),
            phase: WatchPhase::Armed,
            checked: false,
            subscription: None,
            grace_timer: None,
            abandon_timer: None,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Number of live handles (subscription plus pending timers).
    pub fn live_handles(&self) -> usize {
        usize::from(self.subscription.is_some())
            + usize::from(self.grace_timer.is_some())
            + usize::from(self.abandon_timer.is_some())
    }

    /// Which pending timer, if any, the given handle belongs to.
    pub fn timer_slot(&self, id: TimerId) -> Option<TimerSlot> {
        if self.grace_timer == Some(id) {
            Some(TimerSlot::Grace)
        } else if self.abandon_timer == Some(id) {
            Some(TimerSlot::Abandon)
        } else {
            None
        }
    }

    /// Result of the synchronous lookup performed at arm time.
    ///
    /// The subscription is only requested after this result is known, so an
    /// element inserted later is always reported as a mutation.
    pub fn on_immediate_check<N>(&mut self, found: Option<N>) -> Vec<WatchCommand<N>> {
        if self.is_terminal() || self.checked {
            return Vec::new();
        }
        self.checked = true;
        match found {
            Some(node) => self.finish(WatchPhase::Acted, Some(node)),
            None => vec![
                WatchCommand::Subscribe,
                WatchCommand::StartTimer {
                    slot: TimerSlot::Grace,
                    after: self.grace,
                },
            ],
        }
    }

    pub fn bind_subscription<N>(&mut self, id: SubscriptionId) -> Vec<WatchCommand<N>> {
        if self.is_terminal() || self.subscription.is_some() {
            return vec![WatchCommand::Unsubscribe(id)];
        }
        self.subscription = Some(id);
        Vec::new()
    }

    pub fn bind_timer<N>(&mut self, slot: TimerSlot, id: TimerId) -> Vec<WatchCommand<N>> {
        let target = match slot {
            TimerSlot::Grace => &mut self.grace_timer,
            TimerSlot::Abandon => &mut self.abandon_timer,
        };
        if self.phase.is_terminal() || target.is_some() {
            return vec![WatchCommand::CancelTimer(id)];
        }
        *target = Some(id);
        Vec::new()
    }

    /// The host could not provide a subscription; only the grace re-check remains.
    pub fn on_subscribe_failed<N>(&mut self) -> Vec<WatchCommand<N>> {
        self.subscription = None;
        Vec::new()
    }

    /// A delivered mutation batch was scanned; `found` is the first match, if any.
    pub fn on_mutation<N>(&mut self, found: Option<N>) -> Vec<WatchCommand<N>> {
        if self.is_terminal() {
            return self.release();
        }
        match found {
            Some(node) => self.finish(WatchPhase::Acted, Some(node)),
            None => Vec::new(),
        }
    }

    pub fn on_grace_elapsed<N>(&mut self, found: Option<N>) -> Vec<WatchCommand<N>> {
        self.grace_timer = None;
        if self.is_terminal() {
            return self.release();
        }
        if let Some(node) = found {
            return self.finish(WatchPhase::Acted, Some(node));
        }
        match (self.subscription, self.abandon) {
            (Some(_), Some(after)) => vec![WatchCommand::StartTimer {
                slot: TimerSlot::Abandon,
                after,
            }],
            (Some(_), None) => Vec::new(),
            (None, _) => self.finish(WatchPhase::Abandoned, None),
        }
    }

    pub fn on_abandon_elapsed<N>(&mut self) -> Vec<WatchCommand<N>> {
        self.abandon_timer = None;
        if self.is_terminal() {
            return self.release();
        }
        self.finish(WatchPhase::Abandoned, None)
    }

    /// Gives up without acting. No-op once terminal.
    pub fn cancel<N>(&mut self) -> Vec<WatchCommand<N>> {
        if self.is_terminal() {
            return self.release();
        }
        self.finish(WatchPhase::Abandoned, None)
    }

    /// Drops every live handle. Safe to call any number of times.
    pub fn release<N>(&mut self) -> Vec<WatchCommand<N>> {
        let mut commands = Vec::with_capacity(3);
        if let Some(id) = self.subscription.take() {
            commands.push(WatchCommand::Unsubscribe(id));
        }
        if let Some(id) = self.grace_timer.take() {
            commands.push(WatchCommand::CancelTimer(id));
        }
        if let Some(id) = self.abandon_timer.take() {
            commands.push(WatchCommand::CancelTimer(id));
        }
        commands
    }

    fn finish<N>(&mut self, phase: WatchPhase, node: Option<N>) -> Vec<WatchCommand<N>> {
        self.phase = phase;
        let mut commands = Vec::with_capacity(4);
        if let Some(node) = node {
            commands.push(WatchCommand::Act(node));
        }
        commands.extend(self.release());
        commands
    }
}
