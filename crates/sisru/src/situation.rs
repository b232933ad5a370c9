//! Classification of a page snapshot into exactly one situation.

use crate::config::Keywords;
use crate::page::{ElementRef, PageSnapshot};

/// How the target control was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Queue selection button, by its stable id.
    QueueButton,
    /// Panel whose heading names the target meal.
    MealPanel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Meal panels are listed, but none is the target.
    TargetNotOffered,
    /// The page says no meals are available.
    NothingOffered,
    /// Start page, nothing to do yet.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Situation {
    /// The "already acquired" popup is on screen.
    GoalReached { release: Option<ElementRef> },
    NotFound,
    /// A queue position is already held.
    AlreadyQueued,
    Challenge,
    TargetAvailable { control: ElementRef, kind: TargetKind },
    Waiting(WaitReason),
}

/// Maps a snapshot to a situation. Implementations must be pure: the same
/// snapshot always yields the same situation.
pub trait SituationDetector {
    fn detect(&self, snapshot: &PageSnapshot) -> Situation;
}

/// The default detector: keyword phrases plus the snapshot's element facts,
/// checked in strict priority order.
pub struct KeywordDetector {
    keywords: Keywords,
}

impl KeywordDetector {
    pub fn new(keywords: &Keywords) -> Self {
        Self {
            keywords: keywords.clone(),
        }
    }
}

impl SituationDetector for KeywordDetector {
    fn detect(&self, snapshot: &PageSnapshot) -> Situation {
        let kw = &self.keywords;
        let body = snapshot.body_text.as_str();

        let goal_visible = snapshot
            .popup_text
            .as_deref()
            .map(|text| kw.goal_acquired.matches(text))
            .unwrap_or(false);
        if goal_visible {
            return Situation::GoalReached {
                release: snapshot.release_control.clone(),
            };
        }

        if kw.not_found.matches(body) {
            return Situation::NotFound;
        }

        if kw.queued_status.matches(body) {
            return Situation::AlreadyQueued;
        }

        // Mirrors the wait's exit test: a hidden widget frame is not a challenge.
        if snapshot.challenge_frame_visible || kw.challenge_text.matches(body) {
            return Situation::Challenge;
        }

        if let Some(control) = &snapshot.queue_button {
            return Situation::TargetAvailable {
                control: control.clone(),
                kind: TargetKind::QueueButton,
            };
        }
        if let Some(control) = &snapshot.target_panel {
            return Situation::TargetAvailable {
                control: control.clone(),
                kind: TargetKind::MealPanel,
            };
        }

        if snapshot.meal_panels_present {
            Situation::Waiting(WaitReason::TargetNotOffered)
        } else if kw.nothing_offered.matches(body) {
            Situation::Waiting(WaitReason::NothingOffered)
        } else {
            Situation::Waiting(WaitReason::Idle)
        }
    }
}
