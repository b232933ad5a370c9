//! Presentation sinks: where the automaton reports what it is doing.
//!
//! The engine emits one [`Status`] per notable step; sinks decide how to
//! render it (log lines, a terminal spinner, the in-page panel).

use crate::period::Period;
use chrono::NaiveTime;
use crossbeam_channel::Sender;
use log::Level;

/// Color hints, as CSS hex strings.
pub mod color {
    pub const INFO: &str = "#00bfff";
    pub const SUCCESS: &str = "#2ed573";
    pub const ACTION: &str = "#3742fa";
    pub const CHALLENGE: &str = "#ffa502";
    pub const WAITING: &str = "#ffc048";
    pub const ERROR: &str = "#ff4757";
    pub const PEAK: &str = "#ff6348";
    pub const IDLE: &str = "#747d8c";
}

/// Situation labels shown next to each message.
pub mod label {
    pub const STARTING: &str = "STARTING";
    pub const INACTIVE: &str = "INACTIVE";
    pub const GOAL_REACHED: &str = "GOAL REACHED";
    pub const FINISHED: &str = "FINISHED";
    pub const CRITICAL: &str = "CRITICAL ERROR";
    pub const QUEUED: &str = "IN QUEUE";
    pub const NOT_FOUND: &str = "ERROR";
    pub const CHALLENGE: &str = "CAPTCHA";
    pub const ACTION: &str = "ACTION";
    pub const WAITING: &str = "WAITING";
    pub const WATCHDOG: &str = "WATCHDOG";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub state: &'static str,
    pub message: String,
    pub color: &'static str,
    pub level: Level,
}

impl Status {
    pub fn new(state: &'static str, message: impl Into<String>, color: &'static str) -> Self {
        Self {
            state,
            message: message.into(),
            color,
            level: Level::Info,
        }
    }

    pub fn warn(mut self) -> Self {
        self.level = Level::Warn;
        self
    }

    pub fn error(mut self) -> Self {
        self.level = Level::Error;
        self
    }
}

pub fn period_color(period: &Period) -> &'static str {
    if period.is_peak() {
        color::PEAK
    } else {
        color::IDLE
    }
}

pub trait StatusSink {
    fn show(&self, status: &Status, period: &Period);
}

/// Writes every status to the `log` facade at the status' level.
pub struct LogSink;

impl StatusSink for LogSink {
    fn show(&self, status: &Status, period: &Period) {
        log::log!(
            status.level,
            "[{}] {} | {}",
            status.state,
            status.message,
            period
        );
    }
}

/// One status as delivered over a channel.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub status: Status,
    pub period: Period,
    pub at: NaiveTime,
}

/// Forwards statuses to another thread.
pub struct ChannelSink {
    tx: Sender<StatusEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<StatusEvent>) -> Self {
        Self { tx }
    }
}

impl StatusSink for ChannelSink {
    fn show(&self, status: &Status, period: &Period) {
        // A closed receiver only means nobody is watching any more.
        let _ = self.tx.send(StatusEvent {
            status: status.clone(),
            period: period.clone(),
            at: chrono::Local::now().time(),
        });
    }
}

/// Fans one status out to several sinks.
#[derive(Default)]
pub struct Broadcast<'a> {
    sinks: Vec<&'a dyn StatusSink>,
}

impl<'a> Broadcast<'a> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: &'a dyn StatusSink) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for Broadcast<'_> {
    fn show(&self, status: &Status, period: &Period) {
        for sink in &self.sinks {
            sink.show(status, period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodKind;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<String>>);

    impl StatusSink for Recorder {
        fn show(&self, status: &Status, _period: &Period) {
            self.0.borrow_mut().push(status.state.to_string());
        }
    }

    #[test]
    fn broadcast_reaches_every_sink() {
        let a = Recorder(RefCell::new(Vec::new()));
        let b = Recorder(RefCell::new(Vec::new()));
        let all = Broadcast::new().with(&a).with(&b);
        all.show(&Status::new(label::ACTION, "click", color::ACTION), &Period::idle());
        assert_eq!(*a.0.borrow(), vec!["ACTION"]);
        assert_eq!(*b.0.borrow(), vec!["ACTION"]);
    }

    #[test]
    fn channel_sink_delivers_events() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = ChannelSink::new(tx);
        sink.show(&Status::new(label::WAITING, "reloading", color::WAITING).warn(), &Period::idle());
        let event = rx.try_recv().unwrap();
        assert_eq!(event.status.state, label::WAITING);
        assert_eq!(event.status.level, Level::Warn);
        assert_eq!(event.period.kind, PeriodKind::Idle);
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        ChannelSink::new(tx).show(&Status::new(label::INACTIVE, "", color::IDLE), &Period::idle());
    }

    #[test]
    fn period_colors() {
        let peak = Period { kind: PeriodKind::Peak, label: "x".into() };
        assert_eq!(period_color(&peak), color::PEAK);
        assert_eq!(period_color(&Period::idle()), color::IDLE);
    }
}
