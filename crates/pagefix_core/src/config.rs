use std::time::Duration;

use serde::Deserialize;

/// Literal that disables an optional CSS value wherever the generator accepts one.
pub const DISABLE_SENTINEL: &str = "none";

/// Returns the configured CSS literal unless it is empty or the `none` sentinel.
pub fn enabled_value(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(DISABLE_SENTINEL) {
        None
    } else {
        Some(trimmed)
    }
}

/// Immutable tuner configuration, loaded once at startup.
///
/// `Default` carries the embedded values; a RON override may set any subset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub smooth_scroll: bool,
    /// Zero transitions and animations (and their durations) on chat and code regions.
    pub disable_animations: bool,
    pub content_visibility: ContentVisibility,
    pub code_blocks: CodeBlockConfig,
    pub suppress_analytics: bool,
    /// Name of the page global whose `push` is intercepted.
    pub analytics_sink: String,
    pub analytics_log_threshold: u64,
    pub watch_load_errors: bool,
    /// Substring identifying the analytics loader in resource error events.
    pub analytics_script_marker: String,
    pub load_error_timeout_ms: u64,
    pub remove_cookie_banner: bool,
    pub banner_action: BannerAction,
    pub banner_timing: WatchTiming,
    pub performance: PerformanceConfig,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            smooth_scroll: true,
            disable_animations: true,
            content_visibility: ContentVisibility::default(),
            code_blocks: CodeBlockConfig::default(),
            suppress_analytics: true,
            analytics_sink: "dataLayer".to_string(),
            analytics_log_threshold: 3,
            watch_load_errors: true,
            analytics_script_marker: "googletagmanager.com/gtm.js".to_string(),
            load_error_timeout_ms: 15_000,
            remove_cookie_banner: true,
            banner_action: BannerAction::Remove,
            banner_timing: WatchTiming::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl TunerConfig {
    pub fn load_error_timeout(&self) -> Duration {
        Duration::from_millis(self.load_error_timeout_ms)
    }
}

/// Experimental `content-visibility: auto` on chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContentVisibility {
    pub enabled: bool,
    pub placeholder_size: String,
}

impl Default for ContentVisibility {
    fn default() -> Self {
        Self {
            enabled: false,
            placeholder_size: "auto 200px".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodeBlockConfig {
    pub optimize: bool,
    /// CSS length for the scrollable code area, or `none`.
    pub max_height: String,
    pub force_basic_style: bool,
    pub theme: ForcedTheme,
}

impl Default for CodeBlockConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            max_height: "70vh".to_string(),
            force_basic_style: false,
            theme: ForcedTheme::default(),
        }
    }
}

/// Colors applied when the host's own code block styling goes missing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForcedTheme {
    pub background_color: String,
    pub border: String,
    pub text_color: String,
}

impl Default for ForcedTheme {
    fn default() -> Self {
        Self {
            background_color: "#282c34".to_string(),
            border: "1px solid #555".to_string(),
            text_color: "#abb2bf".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BannerAction {
    /// Detach the banner from the document.
    #[default]
    Remove,
    /// Keep the node but force `display: none !important`.
    Hide,
}

/// Grace and abandonment delays of a watch session.
///
/// Only the ordering matters: the immediate check runs first, the grace
/// re-check later, and the abandonment deadline (if any) after the grace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchTiming {
    pub grace_ms: u64,
    pub abandon_ms: Option<u64>,
}

impl Default for WatchTiming {
    fn default() -> Self {
        Self {
            grace_ms: 750,
            abandon_ms: Some(5_000),
        }
    }
}

impl WatchTiming {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn abandon(&self) -> Option<Duration> {
        self.abandon_ms.map(Duration::from_millis)
    }

    /// True when the grace period is non-zero and any deadline comes after it.
    pub fn is_ordered(&self) -> bool {
        self.grace_ms > 0 && self.abandon_ms.is_none_or(|abandon| abandon > self.grace_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub enabled: bool,
    pub log_long_tasks: bool,
    pub long_task_threshold_ms: u64,
    pub log_marks: bool,
    pub log_execution_time: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_long_tasks: true,
            long_task_threshold_ms: 50,
            log_marks: true,
            log_execution_time: true,
        }
    }
}

impl PerformanceConfig {
    pub fn long_tasks_enabled(&self) -> bool {
        self.enabled && self.log_long_tasks
    }

    pub fn marks_enabled(&self) -> bool {
        self.enabled && self.log_marks
    }

    pub fn execution_time_enabled(&self) -> bool {
        self.enabled && self.log_execution_time
    }

    pub fn long_task_threshold(&self) -> Duration {
        Duration::from_millis(self.long_task_threshold_ms)
    }
}
