use std::path::PathBuf;

use clap::Parser;

use crate::logging::LogDestination;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "pagefix_app")]
#[command(about = "Dry-run the page tuner against a saved HTML snapshot", long_about = None)]
pub struct CliArgs {
    /// Saved HTML page to run against.
    pub snapshot: PathBuf,

    /// Override configuration and selectors from a RON file.
    #[arg(long, value_name = "FILE.ron")]
    pub config: Option<PathBuf>,

    /// Write a run report into this directory.
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Print the generated stylesheet to stdout.
    #[arg(long)]
    pub emit_css: bool,

    /// Decode the snapshot with this encoding instead of sniffing it.
    #[arg(long, value_name = "LABEL")]
    pub charset: Option<String>,

    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    pub log: LogDestination,

    /// Include debug output.
    #[arg(short, long)]
    pub verbose: bool,
}
