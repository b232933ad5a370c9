use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use log::Level;
use sisru::StatusEvent;
use std::time::Duration;

/// Format a duration into a human-readable string like "1h 23m 45s".
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Error => Style::new().red().bold(),
        Level::Warn => Style::new().yellow().bold(),
        _ => Style::new().cyan().bold(),
    }
}

/// Spinner line showing the latest status, with a history line printed
/// above it whenever the situation label changes.
pub(crate) struct StatusDisplay {
    spinner: ProgressBar,
    last_state: Option<&'static str>,
}

impl StatusDisplay {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        Self {
            spinner,
            last_state: None,
        }
    }

    pub(crate) fn render(&mut self, event: &StatusEvent) {
        let status = &event.status;
        let period = if event.period.is_peak() {
            Style::new().red().apply_to(event.period.to_string())
        } else {
            Style::new().dim().apply_to(event.period.to_string())
        };
        let line = format!(
            "{} {} | {}",
            level_style(status.level).apply_to(format!("[{}]", status.state)),
            status.message,
            period
        );

        if self.last_state != Some(status.state) {
            self.spinner.println(format!(
                "{} {}",
                Style::new().dim().apply_to(event.at.format("%H:%M:%S")),
                line
            ));
            self.last_state = Some(status.state);
        }
        self.spinner.set_message(line);
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.spinner.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
