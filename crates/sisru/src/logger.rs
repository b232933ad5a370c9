use colored::Colorize;
use log::{Level, LevelFilter};
use std::io::Write;

pub fn init_logger(level: LevelFilter) {
    env_logger::Builder::new()
        .filter(None, level)
        // headless_chrome is chatty at debug level; keep it out of the way.
        .filter_module("headless_chrome", level.min(LevelFilter::Warn))
        .filter_module("tungstenite", level.min(LevelFilter::Warn))
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "ERROR".red(),
                Level::Warn => "WARN".yellow(),
                Level::Info => "INFO".green(),
                Level::Debug => "DEBUG".blue(),
                Level::Trace => "TRACE".purple(),
            };
            let time = chrono::Local::now().format("%H:%M:%S");
            writeln!(buf, "[{}] [{}] - {}", time, level, record.args())
        })
        .init();
}
