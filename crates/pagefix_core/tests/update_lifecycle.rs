use std::sync::Once;

use pagefix_core::{
    update, BannerStatus, Component, Effect, LifecyclePhase, LoadErrorStatus, Msg, RunState,
    SignalOutcome, SinkScope, StyleDelivery, TunerConfig,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(pagefix_logging::initialize_for_tests);
}

fn started(config: TunerConfig) -> RunState {
    let (state, _) = update(RunState::new(config), Msg::ScriptStarted);
    state
}

#[test]
fn script_start_sequences_document_start_components() {
    init_logging();
    let (mut state, effects) = update(RunState::default(), Msg::ScriptStarted);

    assert_eq!(
        effects,
        vec![
            Effect::Mark("script_start"),
            Effect::StartLongTaskMonitor,
            Effect::SuppressSignals,
            Effect::WatchLoadErrors,
            Effect::Mark("signals_checked"),
            Effect::ApplyStyles,
            Effect::Mark("styles_checked"),
        ]
    );
    assert_eq!(state.phase(), LifecyclePhase::Started);
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn second_script_start_is_ignored() {
    init_logging();
    let state = started(TunerConfig::default());
    let (next, effects) = update(state.clone(), Msg::ScriptStarted);
    assert!(effects.is_empty());
    assert_eq!(next.phase(), state.phase());
}

#[test]
fn disabled_features_are_not_sequenced() {
    init_logging();
    let mut config = TunerConfig::default();
    config.suppress_analytics = false;
    config.performance.enabled = false;

    let (_, effects) = update(RunState::new(config), Msg::ScriptStarted);
    assert_eq!(
        effects,
        vec![
            Effect::Mark("script_start"),
            Effect::ApplyStyles,
            Effect::Mark("styles_checked"),
        ]
    );
}

#[test]
fn banner_watch_is_armed_once_when_root_is_ready() {
    init_logging();
    let state = started(TunerConfig::default());

    let (state, effects) = update(state, Msg::DocumentRootReady);
    assert_eq!(effects, vec![Effect::ArmBannerWatch]);

    let (state, effects) = update(state, Msg::DocumentRootReady);
    assert!(effects.is_empty());

    let (state, effects) = update(state, Msg::DomContentLoaded);
    assert_eq!(effects, vec![Effect::Mark("dom_content_loaded")]);
    assert_eq!(state.phase(), LifecyclePhase::DomReady);
}

#[test]
fn dom_content_loaded_arms_when_root_was_never_reported() {
    init_logging();
    let state = started(TunerConfig::default());
    let (_, effects) = update(state, Msg::DomContentLoaded);
    assert_eq!(
        effects,
        vec![Effect::Mark("dom_content_loaded"), Effect::ArmBannerWatch]
    );
}

#[test]
fn root_before_start_does_not_arm() {
    init_logging();
    let (state, effects) = update(RunState::default(), Msg::DocumentRootReady);
    assert!(effects.is_empty());
    assert!(!state.root_ready());
}

#[test]
fn banner_removal_disabled_marks_watch_skipped() {
    init_logging();
    let mut config = TunerConfig::default();
    config.remove_cookie_banner = false;
    let (state, effects) = update(started(config), Msg::DocumentRootReady);
    assert!(effects.is_empty());
    assert_eq!(state.banner(), BannerStatus::Skipped);
}

#[test]
fn banner_terminal_status_is_sticky() {
    init_logging();
    let (state, _) = update(started(TunerConfig::default()), Msg::DocumentRootReady);
    let (state, _) = update(state, Msg::BannerWatch(BannerStatus::Watching));
    let (state, effects) = update(state, Msg::BannerWatch(BannerStatus::Acted));
    assert_eq!(effects, vec![Effect::Mark("banner_acted")]);

    let (state, _) = update(state, Msg::BannerWatch(BannerStatus::Abandoned));
    assert_eq!(state.view().banner, BannerStatus::Acted);
}

#[test]
fn outcomes_are_reflected_in_summary() {
    init_logging();
    let state = started(TunerConfig::default());
    let (state, _) = update(
        state,
        Msg::StylesApplied {
            delivery: StyleDelivery::FallbackElement,
            emitted_groups: 6,
            skipped_groups: 1,
        },
    );
    let (state, _) = update(
        state,
        Msg::SignalsHandled(SignalOutcome::Installed {
            scope: SinkScope::Privileged,
        }),
    );
    let (state, _) = update(state, Msg::SuppressedCalls(12));
    let (state, _) = update(state, Msg::LoadErrorListenerArmed);
    let (state, _) = update(state, Msg::LoadErrorSeen);
    let (state, _) = update(state, Msg::LoadErrorListenerExpired);
    let (state, _) = update(state, Msg::LongTaskObserved { duration_ms: 80 });
    let (state, _) = update(state, Msg::LongTaskObserved { duration_ms: 120 });
    let (state, _) = update(
        state,
        Msg::ComponentFailed {
            component: Component::BannerWatcher,
            message: "observer unavailable".to_string(),
        },
    );
    let (state, effects) = update(state, Msg::WindowLoaded);
    assert_eq!(effects, vec![Effect::Mark("window_load")]);

    let view = state.view();
    assert!(view.styles_applied());
    assert_eq!(view.styles, Some(StyleDelivery::FallbackElement));
    assert_eq!(view.emitted_groups, 6);
    assert_eq!(view.skipped_groups, 1);
    assert_eq!(
        view.signals,
        Some(SignalOutcome::Installed {
            scope: SinkScope::Privileged
        })
    );
    assert_eq!(view.suppressed_calls, 12);
    assert_eq!(view.load_error, LoadErrorStatus::Seen);
    assert_eq!(view.long_tasks, 2);
    assert_eq!(view.longest_task_ms, Some(120));
    assert_eq!(
        view.failures,
        vec!["banner watcher: observer unavailable".to_string()]
    );
    assert_eq!(view.phase, LifecyclePhase::Loaded);
}
