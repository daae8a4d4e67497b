use crate::{BannerStatus, Effect, LifecyclePhase, LoadErrorStatus, Msg, RunState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: RunState, msg: Msg) -> (RunState, Vec<Effect>) {
    let effects = match msg {
        Msg::ScriptStarted => {
            if state.phase() != LifecyclePhase::Pending {
                return (state, Vec::new());
            }
            state.set_phase(LifecyclePhase::Started);

            let config = state.config();
            let long_tasks = config.performance.long_tasks_enabled();
            let suppress = config.suppress_analytics;
            let load_errors = suppress && config.watch_load_errors;

            let mut effects = Vec::with_capacity(7);
            effects.push(Effect::Mark("script_start"));
            if long_tasks {
                effects.push(Effect::StartLongTaskMonitor);
            }
            if suppress {
                effects.push(Effect::SuppressSignals);
                if load_errors {
                    effects.push(Effect::WatchLoadErrors);
                }
                effects.push(Effect::Mark("signals_checked"));
            }
            effects.push(Effect::ApplyStyles);
            effects.push(Effect::Mark("styles_checked"));
            effects
        }
        Msg::DocumentRootReady => arm_watches_once(&mut state),
        Msg::DomContentLoaded => {
            if state.phase() != LifecyclePhase::Started {
                return (state, Vec::new());
            }
            state.set_phase(LifecyclePhase::DomReady);
            let mut effects = vec![Effect::Mark("dom_content_loaded")];
            effects.extend(arm_watches_once(&mut state));
            effects
        }
        Msg::WindowLoaded => match state.phase() {
            LifecyclePhase::Started | LifecyclePhase::DomReady => {
                state.set_phase(LifecyclePhase::Loaded);
                vec![Effect::Mark("window_load")]
            }
            LifecyclePhase::Pending | LifecyclePhase::Loaded => Vec::new(),
        },
        Msg::StylesApplied {
            delivery,
            emitted_groups,
            skipped_groups,
        } => {
            state.set_styles(delivery, emitted_groups, skipped_groups);
            Vec::new()
        }
        Msg::SignalsHandled(outcome) => {
            state.set_signals(outcome);
            Vec::new()
        }
        Msg::SuppressedCalls(calls) => {
            state.set_suppressed_calls(calls);
            Vec::new()
        }
        Msg::BannerWatch(status) => {
            if state.banner().is_terminal() || state.banner() == status {
                return (state, Vec::new());
            }
            state.set_banner(status);
            match status {
                BannerStatus::Acted => vec![Effect::Mark("banner_acted")],
                BannerStatus::Abandoned => vec![Effect::Mark("banner_watch_abandoned")],
                BannerStatus::NotArmed | BannerStatus::Skipped | BannerStatus::Watching => {
                    Vec::new()
                }
            }
        }
        Msg::LoadErrorListenerArmed => {
            state.set_load_error(LoadErrorStatus::Listening);
            Vec::new()
        }
        Msg::LoadErrorSeen => {
            state.set_load_error(LoadErrorStatus::Seen);
            Vec::new()
        }
        Msg::LoadErrorListenerExpired => {
            state.set_load_error(LoadErrorStatus::Expired);
            Vec::new()
        }
        Msg::LongTaskObserved { duration_ms } => {
            state.push_long_task(duration_ms);
            Vec::new()
        }
        Msg::ComponentFailed { component, message } => {
            state.push_failure(component, message);
            Vec::new()
        }
    };

    (state, effects)
}

/// Arms element watches the first time the document root is reported.
fn arm_watches_once(state: &mut RunState) -> Vec<Effect> {
    if state.phase() == LifecyclePhase::Pending || state.root_ready() {
        return Vec::new();
    }
    state.set_root_ready();
    if state.config().remove_cookie_banner {
        vec![Effect::ArmBannerWatch]
    } else {
        state.set_banner(BannerStatus::Skipped);
        Vec::new()
    }
}

