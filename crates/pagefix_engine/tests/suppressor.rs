use pagefix_core::{SignalOutcome, SinkScope};
use pagefix_engine::{install_suppressor, CallLog, GlobalValue, SimulatedPage};
use pagefix_logging::initialize_for_tests;
use pretty_assertions::assert_eq;
use serde_json::json;

const SINK: &str = "dataLayer";

#[test]
fn calls_past_the_threshold_are_counted_but_not_logged() {
    initialize_for_tests();
    let mut page = SimulatedPage::from_html("<body></body>").with_call_log(SINK);
    page.call_sink(SINK, &[json!({"event": "before"})]).unwrap();

    let suppression = install_suppressor(&mut page, SINK, 3);
    assert_eq!(
        suppression.outcome,
        SignalOutcome::Installed {
            scope: SinkScope::Privileged
        }
    );
    let counter = suppression.counter.unwrap();

    for n in 0..10 {
        let len = page.call_sink(SINK, &[json!({"event": "gtm.js", "n": n})]).unwrap();
        assert_eq!(len, 1);
    }
    assert_eq!(counter.calls(), 10);
    assert_eq!(counter.log_lines(), 3);
    assert_eq!(
        page.call_log(SINK).unwrap().entries(),
        &[json!({"event": "before"})]
    );
}

#[test]
fn page_scope_is_used_without_privileged_access() {
    initialize_for_tests();
    let mut page = SimulatedPage::from_html("<body></body>")
        .without_privileged_scope()
        .with_call_log(SINK);
    let suppression = install_suppressor(&mut page, SINK, 3);
    assert_eq!(
        suppression.outcome,
        SignalOutcome::Installed {
            scope: SinkScope::Page
        }
    );
}

#[test]
fn missing_sink_is_left_missing() {
    initialize_for_tests();
    let mut page = SimulatedPage::from_html("<body></body>");
    let suppression = install_suppressor(&mut page, SINK, 3);
    assert_eq!(suppression.outcome, SignalOutcome::SinkMissing);
    assert!(suppression.counter.is_none());
    assert!(page.global(SINK).is_none());
}

#[test]
fn sink_without_push_is_not_callable() {
    initialize_for_tests();
    let mut page = SimulatedPage::from_html("<body></body>")
        .with_global(SINK, GlobalValue::CallLog(CallLog::without_push()));
    assert_eq!(
        install_suppressor(&mut page, SINK, 3).outcome,
        SignalOutcome::NotCallable
    );

    let mut data = SimulatedPage::from_html("<body></body>")
        .with_global(SINK, GlobalValue::Data(json!([1, 2])));
    assert_eq!(
        install_suppressor(&mut data, SINK, 3).outcome,
        SignalOutcome::NotCallable
    );
}

#[test]
fn zero_threshold_never_logs() {
    initialize_for_tests();
    let mut page = SimulatedPage::from_html("<body></body>").with_call_log(SINK);
    let counter = install_suppressor(&mut page, SINK, 0).counter.unwrap();
    page.call_sink(SINK, &[json!(1)]).unwrap();
    page.call_sink(SINK, &[json!(2)]).unwrap();
    assert_eq!(counter.calls(), 2);
    assert_eq!(counter.log_lines(), 0);
}
