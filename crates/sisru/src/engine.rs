//! The decision engine: classify the page, perform one action, schedule what
//! comes next.
//!
//! The engine is a small state machine driven by a [`TimerQueue`]. Each
//! call to [`Engine::step`] fires exactly one pending event; a decision cycle
//! always runs to completion (one action dispatched, or the challenge wait
//! entered) before anything else fires.

use crate::challenge::{ChallengeVerdict, ChallengeWait};
use crate::clock::Clock;
use crate::config::Config;
use crate::dispatch::{decide, Action, Decision};
use crate::error::RunError;
use crate::page::{Page, PageSnapshot};
use crate::period::{classify_period, Period};
use crate::situation::{KeywordDetector, SituationDetector};
use crate::status::{color, label, Status, StatusSink};
use crate::timers::{Event, TimerId, TimerQueue, Watchdog};
use crate::utils::CancellationToken;
use std::time::Duration;

/// Consecutive cycles whose snapshot failed before the run is abandoned.
const MAX_INSPECTION_FAILURES: u32 = 5;

/// Longest uninterrupted sleep of [`Engine::run`], so cancellation is noticed.
const IDLE_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Classifying,
    ChallengeWaiting(ChallengeWait),
    Done,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The "already acquired" popup appeared and the queue was released.
    Acquired,
    /// A queue position is held.
    Queued,
    /// The page contradicted itself; needs a human.
    Halted { reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Acquired | RunOutcome::Queued)
    }
}

#[derive(Debug)]
pub struct RunState {
    active: bool,
    phase: Phase,
    watchdog: Watchdog,
    inspection_failures: u32,
}

impl RunState {
    fn new() -> Self {
        Self {
            active: true,
            phase: Phase::Classifying,
            watchdog: Watchdog::default(),
            inspection_failures: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn watchdog_armed(&self) -> bool {
        self.watchdog.is_armed()
    }
}

enum Leave {
    Reload,
    Redirect,
}

pub struct Engine<'a, P: Page + ?Sized> {
    config: &'a Config,
    page: &'a P,
    sink: &'a dyn StatusSink,
    clock: &'a dyn Clock,
    detector: Box<dyn SituationDetector + 'a>,
    state: RunState,
    timers: TimerQueue,
    outcome: Option<RunOutcome>,
}

impl<'a, P: Page + ?Sized> Engine<'a, P> {
    pub fn new(
        config: &'a Config,
        page: &'a P,
        sink: &'a dyn StatusSink,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            page,
            sink,
            clock,
            detector: Box::new(KeywordDetector::new(&config.keywords)),
            state: RunState::new(),
            timers: TimerQueue::new(),
            outcome: None,
        }
    }

    /// Replaces the default keyword detector.
    pub fn with_detector(mut self, detector: Box<dyn SituationDetector + 'a>) -> Self {
        self.detector = detector;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// Announces the run and treats the current document as freshly loaded.
    pub fn start(&mut self) {
        let status = Status::new(
            label::STARTING,
            format!("Automation for '{}' started!", self.config.target),
            color::INFO,
        );
        self.show(&status);
        self.on_page_loaded();
    }

    /// Runs until a terminal state, an unrecoverable error or cancellation.
    pub fn run(&mut self, cancel: Option<&CancellationToken>) -> Result<RunOutcome, RunError> {
        loop {
            if let Some(outcome) = &self.outcome {
                return Ok(outcome.clone());
            }

            if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                log::info!("[!] Cancellation requested, stopping the automaton.");
                self.halt();
                return Err(RunError::Cancelled);
            }

            let Some(due) = self.timers.next_due() else {
                // Only reachable if a handler forgot to schedule a continuation.
                return Err(RunError::Unknown {
                    message: "The automaton has nothing left to wait for".to_string(),
                });
            };

            let now = self.clock.now();
            if due > now {
                self.clock.sleep((due - now).min(IDLE_SLICE));
                continue;
            }

            if let Err(e) = self.step() {
                self.halt();
                return Err(e);
            }
        }
    }

    /// Waits for the next pending event and fires it. Returns the event, or
    /// `None` when nothing is pending.
    pub fn step(&mut self) -> Result<Option<Event>, RunError> {
        let Some(due) = self.timers.next_due() else {
            return Ok(None);
        };
        let now = self.clock.now();
        if due > now {
            self.clock.sleep(due - now);
        }

        let Some((id, event)) = self.timers.pop_due(self.clock.now()) else {
            return Ok(None);
        };
        self.fire(id, event.clone())?;
        Ok(Some(event))
    }

    fn fire(&mut self, id: TimerId, event: Event) -> Result<(), RunError> {
        if !self.state.active {
            return Ok(());
        }

        match event {
            Event::Cycle => self.run_cycle()?,
            Event::ChallengePoll => self.on_challenge_poll(),
            Event::Reload => self.leave_page(Leave::Reload),
            Event::Redirect => self.leave_page(Leave::Redirect),
            Event::AwaitLoad { previous } => self.on_await_load(previous),
            Event::AwaitActivation => self.on_await_activation(),
            Event::WatchdogExpired => self.on_watchdog(id),
        }
        Ok(())
    }

    /// One decision cycle: arm the watchdog, snapshot, classify, dispatch.
    pub fn run_cycle(&mut self) -> Result<(), RunError> {
        if !self.state.active {
            return Ok(());
        }

        let now = self.clock.now();
        self.state
            .watchdog
            .arm(&mut self.timers, now, self.config.timers.watchdog());
        self.state.phase = Phase::Classifying;

        let snapshot = match PageSnapshot::capture(self.page, self.config) {
            Ok(snapshot) => {
                self.state.inspection_failures = 0;
                snapshot
            }
            Err(e) => {
                self.state.inspection_failures += 1;
                if self.state.inspection_failures >= MAX_INSPECTION_FAILURES {
                    return Err(RunError::InspectionFailed {
                        attempts: self.state.inspection_failures,
                        message: e.to_string(),
                    });
                }
                log::warn!(
                    "[!] Could not inspect the page ({}/{}): {}. Reloading...",
                    self.state.inspection_failures,
                    MAX_INSPECTION_FAILURES,
                    e
                );
                self.schedule_in(self.config.timers.reload_normal(), Event::Reload);
                return Ok(());
            }
        };

        let situation = self.detector.detect(&snapshot);
        log::debug!("Situation on {}: {:?}", snapshot.url, situation);

        let decision = decide(&situation, &self.period(), self.config);
        self.execute(decision);
        Ok(())
    }

    fn execute(&mut self, decision: Decision) {
        self.show(&decision.status);

        match decision.action {
            Action::Finalize { release: Some(control) } => match self.page.click(&control) {
                Ok(()) => {
                    let status = Status::new(
                        label::FINISHED,
                        "✅ Queue released! Automation complete.",
                        color::INFO,
                    );
                    self.show(&status);
                    self.finish(RunOutcome::Acquired);
                }
                Err(e) => {
                    log::error!("[!] Release control could not be clicked: {}", e);
                    self.critical(format!("Popup found, but releasing the queue failed: {}", e));
                }
            },
            Action::Finalize { release: None } => {
                self.critical("Popup found, but the 'Release queue' button is missing!".to_string());
            }
            Action::Redirect { delay } => self.schedule_in(delay, Event::Redirect),
            Action::AwaitChallenge => {
                self.state.phase = Phase::ChallengeWaiting(ChallengeWait::begin(self.clock.now()));
                self.schedule_in(self.config.timers.challenge_poll(), Event::ChallengePoll);
            }
            Action::Click(control) => {
                let previous = self.page.document_id().ok();
                match self.page.click(&control) {
                    Ok(()) => {
                        self.schedule_in(self.config.timers.load_poll(), Event::AwaitLoad { previous })
                    }
                    Err(e) => {
                        log::warn!("[!] Click failed: {}. Re-checking the page...", e);
                        self.schedule_in(self.config.timers.page_settle(), Event::Cycle);
                    }
                }
            }
            Action::Reload { delay } => self.schedule_in(delay, Event::Reload),
            Action::Conclude => self.finish(RunOutcome::Queued),
        }
    }

    fn on_challenge_poll(&mut self) {
        let Phase::ChallengeWaiting(wait) = self.state.phase else {
            return;
        };

        match wait.poll(self.clock.now(), self.page, self.config) {
            ChallengeVerdict::Waiting => {
                self.schedule_in(self.config.timers.challenge_poll(), Event::ChallengePoll)
            }
            ChallengeVerdict::Resolved => {
                let status = Status::new(
                    label::CHALLENGE,
                    "✔️ Validated! Continuing...",
                    color::SUCCESS,
                );
                self.show(&status);
                self.state.phase = Phase::Classifying;
                self.schedule_in(self.config.timers.challenge_settle(), Event::Cycle);
            }
            ChallengeVerdict::TimedOut => {
                log::warn!(
                    "[!] Challenge unresolved after {:?}, reloading.",
                    wait.elapsed(self.clock.now())
                );
                let status = Status::new(
                    label::WATCHDOG,
                    "❌ CAPTCHA timeout. Reloading...",
                    color::ERROR,
                )
                .warn();
                self.show(&status);
                self.leave_page(Leave::Reload);
            }
            ChallengeVerdict::WidgetFailed => {
                log::warn!("[!] Challenge widget reported an error, reloading.");
                let status = Status::new(
                    label::CHALLENGE,
                    "❌ Verification widget failed. Reloading...",
                    color::ERROR,
                )
                .warn();
                self.show(&status);
                self.leave_page(Leave::Reload);
            }
        }
    }

    fn on_await_load(&mut self, previous: Option<String>) {
        let poll = self.config.timers.load_poll();
        match (previous, self.page.document_id()) {
            (Some(previous), Ok(current)) if current != previous => {
                log::debug!("New document after click");
                self.on_page_loaded();
            }
            // No baseline yet: the first successful read becomes one.
            (None, Ok(current)) => self.schedule_in(poll, Event::AwaitLoad { previous: Some(current) }),
            // Same document, or mid-navigation and unreadable: keep watching.
            // If nothing ever loads, the watchdog takes over.
            (previous, _) => self.schedule_in(poll, Event::AwaitLoad { previous }),
        }
    }

    fn on_await_activation(&mut self) {
        match self.page.current_url() {
            Ok(url) if self.config.is_activation_url(&url) => self.on_page_loaded(),
            _ => self.schedule_in(self.config.timers.load_poll(), Event::AwaitActivation),
        }
    }

    fn on_watchdog(&mut self, id: TimerId) {
        if !self.state.watchdog.expired(id) {
            return;
        }
        log::warn!(
            "[!] No progress for {:?}, returning to the activation page.",
            self.config.timers.watchdog()
        );
        let status = Status::new(label::WATCHDOG, "Automaton stuck. Restarting...", color::ERROR).warn();
        self.show(&status);
        self.leave_page(Leave::Redirect);
    }

    /// Reloads or navigates away. Everything scheduled for the old document
    /// is dropped; the watchdog survives.
    fn leave_page(&mut self, how: Leave) {
        if !self.state.active {
            return;
        }
        self.timers.cancel_page_scoped();
        self.state.phase = Phase::Classifying;

        let result = match how {
            Leave::Reload => {
                log::debug!("Reloading page");
                self.page.reload()
            }
            Leave::Redirect => {
                log::debug!("Navigating to {}", self.config.activation_url);
                self.page.navigate(&self.config.activation_url)
            }
        };
        if let Err(e) = result {
            log::warn!("[!] Navigation failed: {}", e);
        }

        self.on_page_loaded();
    }

    /// A new document is in the tab: run on it if it is the activation page,
    /// otherwise pause until the user comes back to it.
    fn on_page_loaded(&mut self) {
        match self.page.current_url() {
            Ok(url) if !self.config.is_activation_url(&url) => {
                log::info!("[*] Outside the activation page ({}), pausing.", url);
                self.state.watchdog.disarm(&mut self.timers);
                let status =
                    Status::new(label::INACTIVE, "Automation paused on this page.", color::IDLE);
                self.show(&status);
                self.schedule_in(self.config.timers.load_poll(), Event::AwaitActivation);
            }
            Ok(url) => {
                log::info!("[*] Page: {}", url);
                self.schedule_in(self.config.timers.page_settle(), Event::Cycle);
            }
            Err(e) => {
                // The cycle's own inspection retries and counts the failure.
                log::warn!("[!] Could not read the page URL: {}", e);
                self.schedule_in(self.config.timers.page_settle(), Event::Cycle);
            }
        }
    }

    fn critical(&mut self, reason: String) {
        let status = Status::new(label::CRITICAL, reason.clone(), color::ERROR).error();
        self.show(&status);
        self.finish(RunOutcome::Halted { reason });
    }

    fn finish(&mut self, outcome: RunOutcome) {
        self.halt();
        log::info!("[✓] Run finished: {:?}", outcome);
        self.outcome = Some(outcome);
    }

    /// Stops everything: no further cycle, navigation or click will happen.
    fn halt(&mut self) {
        self.state.watchdog.disarm(&mut self.timers);
        self.state.active = false;
        self.state.phase = Phase::Done;
        self.timers.clear();
    }

    fn schedule_in(&mut self, delay: Duration, event: Event) {
        let due = self.clock.now() + delay;
        self.timers.schedule(due, event);
    }

    fn period(&self) -> Period {
        classify_period(&self.clock.local_time(), &self.config.peak_windows)
    }

    fn show(&self, status: &Status) {
        self.sink.show(status, &self.period());
    }
}
