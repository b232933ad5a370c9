//! Binds each situation to the one action it calls for.

use crate::config::Config;
use crate::page::ElementRef;
use crate::period::Period;
use crate::situation::{Situation, TargetKind, WaitReason};
use crate::status::{color, label, period_color, Status};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Click the release control (or halt if it is missing) and finish.
    Finalize { release: Option<ElementRef> },
    /// Navigate to the activation URL after `delay`.
    Redirect { delay: Duration },
    AwaitChallenge,
    Click(ElementRef),
    Reload { delay: Duration },
    /// Nothing left to do; the queue position is held.
    Conclude,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub status: Status,
    pub action: Action,
}

/// Delay between retries for the given period.
pub fn retry_delay(period: &Period, config: &Config) -> Duration {
    if period.is_peak() {
        config.timers.reload_fast()
    } else {
        config.timers.reload_normal()
    }
}

/// Decides what to do about `situation`. Pure: no clock, no page access.
pub fn decide(situation: &Situation, period: &Period, config: &Config) -> Decision {
    match situation {
        Situation::GoalReached { release } => Decision {
            status: Status::new(
                label::GOAL_REACHED,
                "Popup found! Clicking to release the queue...",
                color::SUCCESS,
            ),
            action: Action::Finalize {
                release: release.clone(),
            },
        },
        Situation::NotFound => Decision {
            status: Status::new(label::NOT_FOUND, "Page not found (404). Going back...", color::ERROR)
                .warn(),
            action: Action::Redirect {
                delay: config.timers.not_found_grace(),
            },
        },
        Situation::AlreadyQueued => Decision {
            status: Status::new(label::QUEUED, "✅ Success! Queue position secured.", color::SUCCESS),
            action: Action::Conclude,
        },
        Situation::Challenge => Decision {
            status: Status::new(label::CHALLENGE, "Waiting for validation...", color::CHALLENGE),
            action: Action::AwaitChallenge,
        },
        Situation::TargetAvailable { control, kind } => {
            let message = match kind {
                TargetKind::QueueButton => "▶️ Clicking to select the queue...".to_string(),
                TargetKind::MealPanel => format!("🍽️ Clicking the '{}' panel...", config.target),
            };
            Decision {
                status: Status::new(label::ACTION, message, color::ACTION),
                action: Action::Click(control.clone()),
            }
        }
        Situation::Waiting(reason) => {
            let delay = retry_delay(period, config);
            match reason {
                WaitReason::TargetNotOffered => Decision {
                    status: Status::new(
                        label::WAITING,
                        format!("⚠️ '{}' not offered. Going back to the queue...", config.target),
                        color::WAITING,
                    ),
                    action: Action::Redirect { delay },
                },
                WaitReason::NothingOffered | WaitReason::Idle => {
                    let what = if *reason == WaitReason::NothingOffered {
                        "No meals available."
                    } else {
                        "Start page."
                    };
                    Decision {
                        status: Status::new(
                            label::WAITING,
                            format!("⏳ {} Reloading in {}s...", what, delay.as_secs_f64()),
                            period_color(period),
                        ),
                        action: Action::Reload { delay },
                    }
                }
            }
        }
    }
}
