//! Command-line surface: two independent entry points (discovery and
//! scheduling) plus the log-format switch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "wodbot",
    version,
    about = "Discovers bookable WODBoard sessions and books them when their window opens"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format.
    #[arg(long, value_enum, global = true, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,
}

#[derive(Subcommand)]
pub enum Command {
    /// Crawl the timetable and record bookable sessions to the event store.
    Crawl {
        /// Consecutive month views to scan, starting from the one currently shown.
        #[arg(long)]
        months: Option<u32>,

        /// Event store path (overrides the STORE_PATH environment variable).
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Read the event store and attempt each booking when its window opens.
    Schedule {
        /// Event store path (overrides the STORE_PATH environment variable).
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}
