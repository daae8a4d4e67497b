//! Pagefix core: configuration, stylesheet generation and the pure state
//! machines (run lifecycle, watch sessions, call suppression).
mod config;
mod effect;
mod guard;
mod msg;
mod selectors;
mod state;
mod style;
mod suppress;
mod update;
mod view_model;
pub mod watch;

pub use config::{
    enabled_value, BannerAction, CodeBlockConfig, ContentVisibility, ForcedTheme,
    PerformanceConfig, TunerConfig, WatchTiming, DISABLE_SENTINEL,
};
pub use effect::{Component, Effect};
pub use guard::ExecutionGuard;
pub use msg::Msg;
pub use selectors::{SelectorRole, SelectorSet};
pub use state::{
    BannerStatus, LifecyclePhase, LoadErrorStatus, RunState, SignalOutcome, SinkScope,
    StyleDelivery,
};
pub use style::{
    generate_stylesheet, RuleGroup, SkipReason, SkippedGroup, StyleSheet, PRODUCT_NAME,
    PRODUCT_VERSION,
};
pub use suppress::{CallReport, SuppressorState};
pub use update::update;
pub use view_model::RunSummary;
pub use watch::{SubscriptionId, TimerId, TimerSlot, WatchCommand, WatchPhase, WatchSession};
