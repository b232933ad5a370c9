//! Pending continuations of the automaton and the watchdog built on them.
//!
//! Nothing in the engine blocks waiting for the page; instead every "later"
//! is an entry in a [`TimerQueue`], and the driver fires entries in due order.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Run one decision cycle.
    Cycle,
    ChallengePoll,
    Reload,
    /// Navigate to the activation URL.
    Redirect,
    /// Watch for the document that replaces `previous` after a click.
    /// `None` until the document id could be read once.
    AwaitLoad { previous: Option<String> },
    /// Paused on a page outside the activation URL; check whether the user
    /// has come back to it.
    AwaitActivation,
    WatchdogExpired,
}

impl Event {
    /// Events that belong to the current document and die with it.
    pub fn is_page_scoped(&self) -> bool {
        !matches!(self, Event::WatchdogExpired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Entry {
    id: TimerId,
    due: Duration,
    event: Event,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: Vec<Entry>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, event: Event) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, due, event });
        id
    }

    /// Returns true if the entry was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Drops every page-scoped entry, as a document unload would.
    pub fn cancel_page_scoped(&mut self) {
        self.entries.retain(|e| !e.event.is_page_scoped());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Due time of the earliest entry.
    pub fn next_due(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.due).min()
    }

    /// Removes and returns the earliest entry due at or before `now`.
    /// Ties fire in scheduling order.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerId, Event)> {
        let pos = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by_key(|(_, e)| (e.due, e.id.0))
            .map(|(i, _)| i)?;
        let entry = self.entries.remove(pos);
        Some((entry.id, entry.event))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.entries.iter().any(|e| &e.event == event)
    }

    /// Pending events with their due times, earliest first.
    pub fn pending(&self) -> Vec<(Duration, Event)> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.due, e.id.0, e.event.clone()))
            .collect();
        out.sort_by_key(|(due, id, _)| (*due, *id));
        out.into_iter().map(|(due, _, event)| (due, event)).collect()
    }
}

/// Deadline guard. Re-arming replaces the pending expiry, never stacks one.
#[derive(Debug, Default)]
pub struct Watchdog {
    pending: Option<TimerId>,
}

impl Watchdog {
    pub fn arm(&mut self, timers: &mut TimerQueue, now: Duration, deadline: Duration) {
        self.disarm(timers);
        self.pending = Some(timers.schedule(now + deadline, Event::WatchdogExpired));
    }

    pub fn disarm(&mut self, timers: &mut TimerQueue) {
        if let Some(id) = self.pending.take() {
            timers.cancel(id);
        }
    }

    /// Called when the expiry fired; the watchdog is spent until re-armed.
    /// Returns false for a stale expiry that no longer belongs to this arm.
    pub fn expired(&mut self, id: TimerId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}
