//! Dry-run the page tuner against a saved HTML snapshot.
mod cli;
mod logging;
mod report;
mod settings;
mod snapshot;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use pagefix_core::ExecutionGuard;
use pagefix_engine::{run_tuner, ReadyState, RunStatus, SimulatedPage};
use pagefix_logging::{pagefix_info, pagefix_warn};

use crate::cli::CliArgs;
use crate::report::{report_file_name, write_report, RunReport};
use crate::settings::{load_settings, Settings};
use crate::snapshot::load_snapshot;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    logging::initialize(args.log, args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> anyhow::Result<()> {
    let Settings { config, selectors } = match &args.config {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    let snapshot = load_snapshot(&args.snapshot, args.charset.as_deref())?;
    pagefix_info!(
        "Loaded {:?} ({} bytes, {})",
        args.snapshot,
        snapshot.html.len(),
        snapshot.encoding_label
    );

    let mut page = SimulatedPage::from_html(&snapshot.html);
    if snapshot.html.contains(&config.analytics_script_marker) {
        page = page.with_call_log(&config.analytics_sink);
    }
    page.schedule_ready_state(Duration::ZERO, ReadyState::Complete);

    let (status, mut tuner) = run_tuner(&mut page, config, selectors, ExecutionGuard::global())
        .context("tuner setup failed")?;
    if status == RunStatus::AlreadyExecuted {
        pagefix_warn!("Tuner already ran in this process");
        return Ok(());
    }
    tuner.shutdown(&mut page);

    let summary = tuner.summary();
    pagefix_info!(
        "Done: styles {:?}, banner {:?}, {} suppressed call(s), {} failure(s)",
        summary.styles,
        summary.banner,
        summary.suppressed_calls,
        summary.failures.len()
    );

    if args.emit_css {
        if let Some(sheet) = tuner.stylesheet() {
            println!("{}", sheet.css);
        }
    }

    if let Some(dir) = &args.report_dir {
        let now = Utc::now();
        let report = RunReport::new(
            now,
            &args.snapshot,
            &snapshot.encoding_label,
            &summary,
            tuner.stylesheet(),
            tuner.diagnostics().marks(),
        );
        let path = write_report(dir, &report_file_name(now), &report)
            .with_context(|| format!("writing report to {dir:?}"))?;
        pagefix_info!("Report written to {:?}", path);
    }
    Ok(())
}
