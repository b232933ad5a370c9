//! One reservation run against a real browser.

use crate::browser::create_browser;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::engine::{Engine, RunOutcome};
use crate::error::RunError;
use crate::page::chrome::PanelSink;
use crate::page::ChromePage;
use crate::status::{Broadcast, StatusSink};
use crate::utils::CancellationToken;
use headless_chrome::{Browser, Tab};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

/// Element id of the in-page status panel.
pub const DEFAULT_PANEL_ID: &str = "sisru-status-panel";

/// How the browser is launched and what it shows.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub headless: bool,
    pub user_agent: Option<String>,
    /// Mirror every status into a panel drawn on the page itself.
    pub overlay: bool,
    pub panel_id: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            headless: false,
            user_agent: None,
            overlay: true,
            panel_id: DEFAULT_PANEL_ID.to_string(),
        }
    }
}

fn get_initial_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    for _ in 0..10 {
        if let Ok(tabs) = browser.get_tabs().lock() {
            if let Some(t) = tabs.first() {
                return Ok(Arc::clone(t));
            }
        }
        sleep(Duration::from_millis(200));
    }
    browser.new_tab()
}

struct BrowserSession {
    browser: Browser,
    page: ChromePage,
}

impl BrowserSession {
    fn open(options: &RunOptions) -> Result<Self, RunError> {
        let browser = create_browser(options.user_agent.as_deref(), options.headless).map_err(|e| {
            RunError::BrowserError {
                message: format!("Failed to create browser: {}", e),
            }
        })?;

        let tab = get_initial_tab(&browser).map_err(|e| RunError::BrowserError {
            message: format!("No usable tab: {}", e),
        })?;
        tab.set_default_timeout(Duration::from_secs(30));

        Ok(Self {
            browser,
            page: ChromePage::new(tab),
        })
    }

    fn open_activation_page(&self, config: &Config) -> Result<(), RunError> {
        log::info!("[*] Navigating to: {}", config.activation_url);
        self.page
            .tab()
            .navigate_to(&config.activation_url)
            .map_err(|e| RunError::NavigationFailed {
                url: config.activation_url.clone(),
                message: e.to_string(),
            })?;

        if let Err(e) = self.page.tab().wait_until_navigated() {
            log::warn!("[!] Initial navigation wait timed out: {}, continuing...", e);
        }
        Ok(())
    }

    fn close(self) {
        if let Ok(tabs) = self.browser.get_tabs().lock() {
            for tab in tabs.iter() {
                // The user may already have closed the window.
                let _ = tab.close(true);
            }
        }
        sleep(Duration::from_millis(200));
    }
}

/// Opens the browser on the activation page and runs the automaton until it
/// reaches a terminal state, fails, or `cancel` fires.
///
/// Every status goes to `sink`, and also to the in-page panel when
/// `options.overlay` is set.
pub fn run_reservation(
    config: &Config,
    options: &RunOptions,
    sink: &dyn StatusSink,
    cancel: Option<&CancellationToken>,
) -> Result<RunOutcome, RunError> {
    config.validate()?;

    let session = BrowserSession::open(options)?;
    let result = drive(&session, config, options, sink, cancel);
    session.close();
    result
}

fn drive(
    session: &BrowserSession,
    config: &Config,
    options: &RunOptions,
    sink: &dyn StatusSink,
    cancel: Option<&CancellationToken>,
) -> Result<RunOutcome, RunError> {
    session.open_activation_page(config)?;

    let panel = PanelSink::new(&session.page, &options.panel_id);
    let mut sinks = Broadcast::new().with(sink);
    if options.overlay {
        sinks = sinks.with(&panel);
    }

    let clock = SystemClock::new();
    let mut engine = Engine::new(config, &session.page, &sinks, &clock);
    engine.start();
    engine.run(cancel)
}
