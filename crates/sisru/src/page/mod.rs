//! Perception layer: read-only queries against the current page, plus the
//! handful of side effects the automaton is allowed to perform on it.

pub mod chrome;

use crate::config::Config;
use serde::Deserialize;

pub use chrome::ChromePage;

/// Locates one element: the `index`-th match of `selector`, then `ancestor`
/// hops up through `parentElement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: String,
    pub index: usize,
    pub ancestor: u8,
}

impl ElementRef {
    pub fn new(selector: &str, index: usize) -> Self {
        Self {
            selector: selector.to_string(),
            index,
            ancestor: 0,
        }
    }

    pub fn parent(mut self) -> Self {
        self.ancestor += 1;
        self
    }
}

/// Computed style and layout of an element at inspection time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisualState {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    pub width: f64,
    pub height: f64,
}

impl VisualState {
    /// A rendered, on-screen element. Each of the four checks is required on
    /// its own: elements faded out, hidden, undisplayed or collapsed to zero
    /// area all still sit in the DOM.
    pub fn is_visible(&self) -> bool {
        if self.display == "none" || self.visibility == "hidden" || self.opacity < 0.1 {
            return false;
        }
        self.width > 0.0 && self.height > 0.0
    }

    pub fn shown() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            width: 100.0,
            height: 20.0,
        }
    }

    pub fn hidden() -> Self {
        Self {
            display: "none".to_string(),
            ..Self::shown()
        }
    }
}

/// An element as seen by one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementProbe {
    pub target: ElementRef,
    pub text: String,
    pub visual: VisualState,
}

impl ElementProbe {
    pub fn is_visible(&self) -> bool {
        self.visual.is_visible()
    }
}

/// Read-only queries over the current page. Implementations must not mutate
/// the page.
pub trait PageInspector {
    fn current_url(&self) -> anyhow::Result<String>;

    /// Identifier that changes whenever a new document is loaded.
    fn document_id(&self) -> anyhow::Result<String>;

    /// Rendered text of the body, as the page shows it.
    fn inner_text(&self) -> anyhow::Result<String>;

    /// Every element matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> anyhow::Result<Vec<ElementProbe>>;

    /// First element matching `selector` inside the document of the frame
    /// matched by `frame_selector`. Fails when the frame is cross-origin.
    fn frame_query(&self, frame_selector: &str, selector: &str)
        -> anyhow::Result<Option<ElementProbe>>;

    /// Body text, case-folded.
    fn body_text(&self) -> anyhow::Result<String> {
        Ok(self.inner_text()?.to_lowercase())
    }

    fn query(&self, selector: &str) -> anyhow::Result<Option<ElementProbe>> {
        Ok(self.query_all(selector)?.into_iter().next())
    }

    fn is_visible(&self, element: &ElementProbe) -> bool {
        element.is_visible()
    }

    /// First visible element under `scope` whose text contains `text`.
    fn find_visible_by_text(&self, scope: &str, text: &str) -> anyhow::Result<Option<ElementProbe>> {
        Ok(self
            .query_all(scope)?
            .into_iter()
            .find(|el| el.text.contains(text) && self.is_visible(el)))
    }

    fn find_challenge_frame(&self, selector: &str) -> anyhow::Result<Option<ElementProbe>> {
        self.query(selector)
    }
}

/// Side effects on the page. Every one of them may replace the document.
pub trait PageActions {
    fn click(&self, target: &ElementRef) -> anyhow::Result<()>;
    fn reload(&self) -> anyhow::Result<()>;
    fn navigate(&self, url: &str) -> anyhow::Result<()>;
}

pub trait Page: PageInspector + PageActions {}

impl<T: PageInspector + PageActions + ?Sized> Page for T {}

/// Everything one decision cycle needs to know about the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    /// Case-folded body text.
    pub body_text: String,
    /// Text of the first *visible* growl popup title, case-folded.
    pub popup_text: Option<String>,
    pub release_control: Option<ElementRef>,
    /// The verification widget is on screen. A widget iframe that stays in
    /// the DOM while hidden does not count.
    pub challenge_frame_visible: bool,
    /// Queue selection button, when visible.
    pub queue_button: Option<ElementRef>,
    /// Clickable panel of the target meal, when its heading is visible.
    pub target_panel: Option<ElementRef>,
    /// Whether any meal panel heading exists at all.
    pub meal_panels_present: bool,
}

impl PageSnapshot {
    pub fn capture<P: PageInspector + ?Sized>(page: &P, config: &Config) -> anyhow::Result<Self> {
        let sel = &config.selectors;

        let popup_text = page
            .query_all(&sel.goal_popup_title)?
            .into_iter()
            .find(|el| page.is_visible(el))
            .map(|el| el.text.to_lowercase());

        let release_control = page.query(&sel.release_button)?.map(|el| el.target);

        let frame = page.find_challenge_frame(&sel.challenge_frame)?;

        let queue_button = page
            .query(&sel.queue_button)?
            .filter(|el| page.is_visible(el))
            .map(|el| el.target);

        let target_panel = page
            .find_visible_by_text(&sel.meal_panel, &config.target)?
            .map(|el| el.target.parent());
        let meal_panels_present = page.query(&sel.meal_panel)?.is_some();

        Ok(Self {
            url: page.current_url()?,
            body_text: page.body_text()?,
            popup_text,
            release_control,
            challenge_frame_visible: frame.as_ref().map(|f| page.is_visible(f)).unwrap_or(false),
            queue_button,
            target_panel,
            meal_panels_present,
        })
    }
}

/// Facts the challenge sub-loop polls for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChallengeProbe {
    pub frame_visible: bool,
    pub challenge_text: bool,
    pub error_text: bool,
    /// Success icon inside the widget; unreadable across origins, in which
    /// case it reads as not visible.
    pub success_marker: bool,
}

impl ChallengeProbe {
    pub fn capture<P: PageInspector + ?Sized>(page: &P, config: &Config) -> anyhow::Result<Self> {
        let sel = &config.selectors;
        let frame_visible = page
            .find_challenge_frame(&sel.challenge_frame)?
            .map(|f| page.is_visible(&f))
            .unwrap_or(false);

        let body = page.body_text()?;

        let success_marker = match page.frame_query(&sel.challenge_frame, &sel.challenge_success) {
            Ok(marker) => marker.map(|m| page.is_visible(&m)).unwrap_or(false),
            Err(e) => {
                log::trace!("Challenge frame not inspectable: {}", e);
                false
            }
        };

        Ok(Self {
            frame_visible,
            challenge_text: config.keywords.challenge_text.matches(&body),
            error_text: config.keywords.challenge_error.matches(&body),
            success_marker,
        })
    }

    /// The challenge is over when the frame is gone from view and its banner
    /// text has cleared, or when the widget itself shows success.
    pub fn is_resolved(&self) -> bool {
        (!self.frame_visible && !self.challenge_text) || self.success_marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_invisibility_cause_is_rejected() {
        assert!(VisualState::shown().is_visible());

        let faded = VisualState { opacity: 0.0, ..VisualState::shown() };
        let hidden = VisualState { visibility: "hidden".into(), ..VisualState::shown() };
        let undisplayed = VisualState::hidden();
        let collapsed = VisualState { height: 0.0, ..VisualState::shown() };
        let zero_width = VisualState { width: 0.0, ..VisualState::shown() };

        for state in [faded, hidden, undisplayed, collapsed, zero_width] {
            assert!(!state.is_visible(), "{:?}", state);
        }
    }

    #[test]
    fn nearly_transparent_counts_as_invisible() {
        let state = VisualState { opacity: 0.05, ..VisualState::shown() };
        assert!(!state.is_visible());
        let state = VisualState { opacity: 0.5, ..VisualState::shown() };
        assert!(state.is_visible());
    }

    #[test]
    fn challenge_resolution_needs_both_signals() {
        let frame_gone_text_left = ChallengeProbe { challenge_text: true, ..Default::default() };
        assert!(!frame_gone_text_left.is_resolved());

        let text_gone_frame_left = ChallengeProbe { frame_visible: true, ..Default::default() };
        assert!(!text_gone_frame_left.is_resolved());

        assert!(ChallengeProbe::default().is_resolved());

        let widget_success = ChallengeProbe {
            frame_visible: true,
            challenge_text: true,
            success_marker: true,
            ..Default::default()
        };
        assert!(widget_success.is_resolved());
    }

    #[test]
    fn element_ref_parent_hops() {
        let r = ElementRef::new("h1", 2).parent();
        assert_eq!(r.ancestor, 1);
        assert_eq!(r.index, 2);
    }
}
