use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

/// Verbosity of the terminal log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Keeps a browser tab on the SISRU queue page and grabs a meal slot as
/// soon as one is offered.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (JSON). Defaults to config.json in the data directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Queue page the automaton runs on
    #[arg(short, long)]
    pub url: Option<String>,

    /// Meal period to reserve, as its panel heading reads (e.g. "Almoço")
    #[arg(short, long)]
    pub target: Option<String>,

    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub level: LogLevel,

    /// Run the browser without a window. The verification challenge then
    /// cannot be solved by hand
    #[arg(long)]
    pub headless: bool,

    /// Browser user agent override
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Do not draw the status panel inside the page
    #[arg(long)]
    pub no_overlay: bool,

    /// Delete the saved browser profile and exit
    #[arg(long)]
    pub clean: bool,

    /// Skip the confirmation prompt of --clean
    #[arg(short = 'y', long, requires = "clean")]
    pub yes: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,
}
