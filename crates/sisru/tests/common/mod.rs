//! A scripted stand-in for the SISRU queue page.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use sisru::config::{Config, Selectors};
use sisru::engine::Engine;
use sisru::page::{ElementProbe, ElementRef, PageActions, PageInspector, VisualState};
use sisru::period::Period;
use sisru::status::{Status, StatusSink};
use sisru::timers::Event;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

pub const GOAL_POPUP: &str = "Você já adquiriu todas as opções possíveis";

/// What the page shows at one moment.
#[derive(Debug, Clone)]
pub struct Screen {
    pub url: String,
    pub body: String,
    pub popup: Option<String>,
    pub popup_visible: bool,
    pub release: bool,
    pub frame: Option<VisualState>,
    pub success_marker: bool,
    pub queue_button: bool,
    /// Visible meal panel headings.
    pub panels: Vec<String>,
}

impl Screen {
    fn blank() -> Self {
        Self {
            url: Config::default().activation_url,
            body: String::new(),
            popup: None,
            popup_visible: false,
            release: false,
            frame: None,
            success_marker: false,
            queue_button: false,
            panels: Vec::new(),
        }
    }

    /// Start page with the queue selection button.
    pub fn start() -> Self {
        Self {
            body: "Selecione a fila do restaurante".into(),
            queue_button: true,
            ..Self::blank()
        }
    }

    /// Start page without any usable control.
    pub fn idle() -> Self {
        Self {
            body: "Restaurante Universitário".into(),
            ..Self::blank()
        }
    }

    pub fn meals(headings: &[&str]) -> Self {
        Self {
            body: format!("Períodos de atendimento {}", headings.join(" ")),
            panels: headings.iter().map(|h| h.to_string()).collect(),
            ..Self::blank()
        }
    }

    pub fn nothing_offered() -> Self {
        Self {
            body: "Não há refeições disponíveis!".into(),
            ..Self::blank()
        }
    }

    pub fn queued() -> Self {
        Self {
            body: "Aquisição de refeições - Sua posição na fila: 42".into(),
            ..Self::blank()
        }
    }

    pub fn not_found() -> Self {
        Self {
            body: "Página não encontrada".into(),
            ..Self::blank()
        }
    }

    pub fn challenge() -> Self {
        Self {
            body: "Realize a validação do captcha. Verify you are human".into(),
            frame: Some(VisualState::shown()),
            ..Self::blank()
        }
    }

    pub fn goal(release: bool) -> Self {
        Self {
            body: "Aquisição concluída".into(),
            popup: Some(GOAL_POPUP.into()),
            popup_visible: true,
            release,
            ..Self::blank()
        }
    }

    pub fn at(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Act {
    Click(ElementRef),
    Reload,
    Navigate(String),
}

/// A page driven by a script of screens: every click, reload or navigation
/// loads the next scripted screen, or the current one again when the script
/// is exhausted. Clicks with nothing scripted leave the document in place.
pub struct FakePage {
    selectors: Selectors,
    screen: RefCell<Screen>,
    script: RefCell<VecDeque<Screen>>,
    doc: Cell<u64>,
    acts: RefCell<Vec<Act>>,
    broken: Cell<bool>,
    failed_document_reads: Cell<u32>,
}

impl FakePage {
    pub fn new(screen: Screen) -> Self {
        Self {
            selectors: Config::default().selectors,
            screen: RefCell::new(screen),
            script: RefCell::new(VecDeque::new()),
            doc: Cell::new(1),
            acts: RefCell::new(Vec::new()),
            broken: Cell::new(false),
            failed_document_reads: Cell::new(0),
        }
    }

    pub fn then(self, screen: Screen) -> Self {
        self.script.borrow_mut().push_back(screen);
        self
    }

    /// Changes what is shown without a new document, as a script on the
    /// page would.
    pub fn mutate(&self, screen: Screen) {
        *self.screen.borrow_mut() = screen;
    }

    /// Loads `screen` as a new document, as a user navigating would.
    pub fn load(&self, screen: Screen) {
        *self.screen.borrow_mut() = screen;
        self.doc.set(self.doc.get() + 1);
    }

    /// Makes every query fail, as a crashed renderer would.
    pub fn break_queries(&self) {
        self.broken.set(true);
    }

    /// Fails the next `n` document id reads, as a page mid-navigation would.
    pub fn fail_document_reads(&self, n: u32) {
        self.failed_document_reads.set(n);
    }

    pub fn acts(&self) -> Vec<Act> {
        self.acts.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Act) -> bool) -> usize {
        self.acts.borrow().iter().filter(|a| pred(a)).count()
    }

    fn next_document(&self, url: Option<&str>) {
        let next = self.script.borrow_mut().pop_front();
        let mut screen = next.unwrap_or_else(|| self.screen.borrow().clone());
        if let Some(url) = url {
            screen.url = url.to_string();
        }
        self.load(screen);
    }

    fn probe(selector: &str, index: usize, text: &str, visual: VisualState) -> ElementProbe {
        ElementProbe {
            target: ElementRef::new(selector, index),
            text: text.to_string(),
            visual,
        }
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.broken.get() {
            anyhow::bail!("Target closed");
        }
        Ok(())
    }
}

impl PageInspector for FakePage {
    fn current_url(&self) -> anyhow::Result<String> {
        self.check()?;
        Ok(self.screen.borrow().url.clone())
    }

    fn document_id(&self) -> anyhow::Result<String> {
        self.check()?;
        let failing = self.failed_document_reads.get();
        if failing > 0 {
            self.failed_document_reads.set(failing - 1);
            anyhow::bail!("Execution context was destroyed");
        }
        Ok(self.doc.get().to_string())
    }

    fn inner_text(&self) -> anyhow::Result<String> {
        self.check()?;
        Ok(self.screen.borrow().body.clone())
    }

    fn query_all(&self, selector: &str) -> anyhow::Result<Vec<ElementProbe>> {
        self.check()?;
        let screen = self.screen.borrow();
        let sel = &self.selectors;

        let found = if selector == sel.goal_popup_title {
            screen
                .popup
                .iter()
                .map(|text| {
                    let visual = if screen.popup_visible {
                        VisualState::shown()
                    } else {
                        VisualState::hidden()
                    };
                    Self::probe(selector, 0, text, visual)
                })
                .collect()
        } else if selector == sel.release_button {
            if screen.release {
                vec![Self::probe(selector, 0, "Liberar fila", VisualState::shown())]
            } else {
                Vec::new()
            }
        } else if selector == sel.challenge_frame {
            screen
                .frame
                .iter()
                .map(|visual| Self::probe(selector, 0, "", visual.clone()))
                .collect()
        } else if selector == sel.queue_button {
            if screen.queue_button {
                vec![Self::probe(selector, 0, "Selecionar", VisualState::shown())]
            } else {
                Vec::new()
            }
        } else if selector == sel.meal_panel {
            screen
                .panels
                .iter()
                .enumerate()
                .map(|(i, heading)| Self::probe(selector, i, heading, VisualState::shown()))
                .collect()
        } else {
            Vec::new()
        };
        Ok(found)
    }

    fn frame_query(&self, _frame: &str, selector: &str) -> anyhow::Result<Option<ElementProbe>> {
        self.check()?;
        if self.screen.borrow().success_marker {
            Ok(Some(Self::probe(selector, 0, "", VisualState::shown())))
        } else {
            anyhow::bail!("Blocked a frame with origin from accessing a cross-origin frame")
        }
    }
}

impl PageActions for FakePage {
    fn click(&self, target: &ElementRef) -> anyhow::Result<()> {
        self.check()?;
        let exists = self
            .query_all(&target.selector)?
            .iter()
            .any(|el| el.target.index == target.index);
        if !exists {
            anyhow::bail!("Element {} #{} is gone", target.selector, target.index);
        }
        self.acts.borrow_mut().push(Act::Click(target.clone()));
        if !self.script.borrow().is_empty() {
            self.next_document(None);
        }
        Ok(())
    }

    fn reload(&self) -> anyhow::Result<()> {
        self.acts.borrow_mut().push(Act::Reload);
        self.next_document(None);
        Ok(())
    }

    fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.acts.borrow_mut().push(Act::Navigate(url.to_string()));
        self.next_document(Some(url));
        Ok(())
    }
}

/// Keeps every status the engine shows.
#[derive(Default)]
pub struct Recorder {
    pub shown: RefCell<Vec<Status>>,
}

impl Recorder {
    pub fn states(&self) -> Vec<&'static str> {
        self.shown.borrow().iter().map(|s| s.state).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.shown.borrow().iter().map(|s| s.message.clone()).collect()
    }
}

impl StatusSink for Recorder {
    fn show(&self, status: &Status, _period: &Period) {
        self.shown.borrow_mut().push(status.clone());
    }
}

/// Monday afternoon, outside every default peak window.
pub fn off_peak() -> NaiveDateTime {
    at(15, 0)
}

pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 12)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Fires events until the run ends, nothing is pending, or `max` events
/// have fired. Returns the fired events.
pub fn drive(engine: &mut Engine<'_, FakePage>, max: usize) -> Vec<Event> {
    let mut fired = Vec::new();
    for _ in 0..max {
        if engine.outcome().is_some() {
            break;
        }
        match engine.step().expect("step failed") {
            Some(event) => fired.push(event),
            None => break,
        }
    }
    fired
}

/// Fires events until `until` holds after one of them, at most `max` times.
pub fn drive_until(
    engine: &mut Engine<'_, FakePage>,
    max: usize,
    until: impl Fn(&Engine<'_, FakePage>) -> bool,
) -> bool {
    for _ in 0..max {
        if until(engine) {
            return true;
        }
        if engine.step().expect("step failed").is_none() {
            break;
        }
    }
    until(engine)
}
