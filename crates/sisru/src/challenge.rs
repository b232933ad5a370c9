//! Waiting out the human-verification widget.
//!
//! The automaton cannot solve the challenge; a person does, in the visible
//! browser window. This sub-loop only watches for it to go away, and gives
//! up with a reload when it takes too long or the widget reports a failure.

use crate::config::Config;
use crate::page::{ChallengeProbe, PageInspector};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeVerdict {
    /// Still blocked; poll again.
    Waiting,
    Resolved,
    /// The local challenge deadline passed.
    TimedOut,
    /// The widget shows its own error text; waiting longer will not help.
    WidgetFailed,
}

/// One stay in the challenge-wait state. The timeout runs from `started_at`
/// and is independent of the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeWait {
    started_at: Duration,
}

impl ChallengeWait {
    pub fn begin(now: Duration) -> Self {
        Self { started_at: now }
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }

    pub fn poll<P: PageInspector + ?Sized>(
        &self,
        now: Duration,
        page: &P,
        config: &Config,
    ) -> ChallengeVerdict {
        if self.elapsed(now) > config.timers.challenge_timeout() {
            return ChallengeVerdict::TimedOut;
        }

        let probe = match ChallengeProbe::capture(page, config) {
            Ok(probe) => probe,
            Err(e) => {
                // Mid-navigation or sandboxed widget; neither says anything
                // about the outcome.
                log::debug!("Challenge probe failed, still waiting: {}", e);
                return ChallengeVerdict::Waiting;
            }
        };

        if probe.is_resolved() {
            ChallengeVerdict::Resolved
        } else if probe.error_text {
            ChallengeVerdict::WidgetFailed
        } else {
            ChallengeVerdict::Waiting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementProbe, ElementRef, VisualState};

    struct Widget {
        frame: Option<VisualState>,
        body: &'static str,
        success: Option<VisualState>,
        cross_origin: bool,
    }

    impl PageInspector for Widget {
        fn current_url(&self) -> anyhow::Result<String> {
            Ok(Config::default().activation_url)
        }

        fn document_id(&self) -> anyhow::Result<String> {
            Ok("doc".into())
        }

        fn inner_text(&self) -> anyhow::Result<String> {
            Ok(self.body.to_string())
        }

        fn query_all(&self, selector: &str) -> anyhow::Result<Vec<ElementProbe>> {
            Ok(self
                .frame
                .iter()
                .map(|visual| ElementProbe {
                    target: ElementRef::new(selector, 0),
                    text: String::new(),
                    visual: visual.clone(),
                })
                .collect())
        }

        fn frame_query(&self, _frame: &str, selector: &str) -> anyhow::Result<Option<ElementProbe>> {
            if self.cross_origin {
                anyhow::bail!("Blocked a frame from accessing a cross-origin frame");
            }
            Ok(self.success.clone().map(|visual| ElementProbe {
                target: ElementRef::new(selector, 0),
                text: String::new(),
                visual,
            }))
        }
    }

    fn blocked() -> Widget {
        Widget {
            frame: Some(VisualState::shown()),
            body: "Verify you are human",
            success: None,
            cross_origin: true,
        }
    }

    fn secs(v: u64) -> Duration {
        Duration::from_secs(v)
    }

    #[test]
    fn waits_while_widget_is_up() {
        let wait = ChallengeWait::begin(secs(10));
        let verdict = wait.poll(secs(20), &blocked(), &Config::default());
        assert_eq!(verdict, ChallengeVerdict::Waiting);
    }

    #[test]
    fn resolves_when_frame_and_text_are_gone() {
        let page = Widget { frame: None, body: "Selecione o período", ..blocked() };
        let wait = ChallengeWait::begin(secs(0));
        assert_eq!(wait.poll(secs(1), &page, &Config::default()), ChallengeVerdict::Resolved);
    }

    #[test]
    fn hidden_frame_with_banner_still_waits() {
        let page = Widget { frame: Some(VisualState::hidden()), ..blocked() };
        let wait = ChallengeWait::begin(secs(0));
        assert_eq!(wait.poll(secs(1), &page, &Config::default()), ChallengeVerdict::Waiting);
    }

    #[test]
    fn success_icon_resolves_early() {
        let page = Widget {
            success: Some(VisualState::shown()),
            cross_origin: false,
            ..blocked()
        };
        let wait = ChallengeWait::begin(secs(0));
        assert_eq!(wait.poll(secs(1), &page, &Config::default()), ChallengeVerdict::Resolved);
    }

    #[test]
    fn widget_error_text_fails_fast() {
        let page = Widget { body: "Verify you are human. Having trouble?", ..blocked() };
        let wait = ChallengeWait::begin(secs(0));
        assert_eq!(wait.poll(secs(1), &page, &Config::default()), ChallengeVerdict::WidgetFailed);
    }

    #[test]
    fn timeout_wins_over_everything() {
        let config = Config::default();
        let wait = ChallengeWait::begin(secs(5));
        let at_limit = secs(5) + config.timers.challenge_timeout();
        assert_eq!(wait.poll(at_limit, &blocked(), &config), ChallengeVerdict::Waiting);

        let resolved = Widget { frame: None, body: "", ..blocked() };
        let past = at_limit + Duration::from_millis(1);
        assert_eq!(wait.poll(past, &resolved, &config), ChallengeVerdict::TimedOut);
        assert_eq!(wait.elapsed(past), config.timers.challenge_timeout() + Duration::from_millis(1));
    }
}
