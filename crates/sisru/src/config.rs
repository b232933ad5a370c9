//! Static configuration of the automaton.
//!
//! Every site-specific detail lives here as data: selectors, the keyword
//! phrases for each detectable condition, timer durations and the peak
//! windows. The defaults reproduce the lunch ("Almoço") queue at the Franca
//! campus; other meals or campuses are a different config file, not a code
//! change.

use crate::error::RunError;
use crate::period::{MinuteOfDay, PeakWindow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Page the automaton works on; also where every recovery navigates to.
    pub activation_url: String,
    /// Meal name as printed in the meal panel headings.
    pub target: String,
    pub selectors: Selectors,
    pub keywords: Keywords,
    pub timers: Timers,
    pub peak_windows: Vec<PeakWindow>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activation_url:
                "https://app.unesp.br/sisru-franca/cliente/selecionarFilaPorPeriodoDeAtendimento.do"
                    .to_string(),
            target: "Almoço".to_string(),
            selectors: Selectors::default(),
            keywords: Keywords::default(),
            timers: Timers::default(),
            peak_windows: vec![
                PeakWindow::daily("Opening 9h45", MinuteOfDay::hm(9, 43), MinuteOfDay::hm(9, 47)),
                PeakWindow::daily("Opening 11h", MinuteOfDay::hm(10, 58), MinuteOfDay::hm(11, 2)),
                PeakWindow::daily("Leftovers 12h43", MinuteOfDay::hm(12, 43), MinuteOfDay::hm(12, 59)),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub challenge_frame: String,
    /// Success icon rendered inside the challenge frame once the check passes.
    pub challenge_success: String,
    /// Queue selection button, located by its JSF id.
    pub queue_button: String,
    /// Meal panel headings; the panel itself is the heading's parent.
    pub meal_panel: String,
    pub goal_popup_title: String,
    pub release_button: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            challenge_frame: "iframe[src*='challenges.cloudflare.com/turnstile']".to_string(),
            challenge_success: "#success-i".to_string(),
            queue_button: "#form\\:j_idt24".to_string(),
            meal_panel: "div.panelPeriodo h1".to_string(),
            goal_popup_title: ".ui-growl-item .ui-growl-title".to_string(),
            release_button: "#form\\:j_idt67".to_string(),
        }
    }
}

/// A set of alternative phrases (one per site locale) for one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(phrases.into_iter().map(Into::into).collect())
    }

    /// True if any phrase occurs in `text`, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.0
            .iter()
            .any(|phrase| folded.contains(&phrase.to_lowercase()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|phrase| phrase.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    pub not_found: KeywordSet,
    /// Text of the growl popup shown once every meal option is acquired.
    pub goal_acquired: KeywordSet,
    /// Status page phrases meaning we already hold a queue position.
    pub queued_status: KeywordSet,
    pub challenge_error: KeywordSet,
    pub challenge_text: KeywordSet,
    pub nothing_offered: KeywordSet,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            not_found: KeywordSet::new(["página não encontrada"]),
            goal_acquired: KeywordSet::new(["você já adquiriu todas as opções possíveis"]),
            queued_status: KeywordSet::new(["aquisição de refeições", "sua posição na fila"]),
            challenge_error: KeywordSet::new(["having trouble", "tendo problemas"]),
            challenge_text: KeywordSet::new([
                "verify you are human",
                "verificar se é humano",
                "realize a validação do captcha",
            ]),
            nothing_offered: KeywordSet::new(["não há refeições disponíveis!"]),
        }
    }
}

/// Timer durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timers {
    pub reload_normal_ms: u64,
    pub reload_fast_ms: u64,
    pub not_found_grace_ms: u64,
    pub watchdog_ms: u64,
    pub challenge_timeout_ms: u64,
    pub challenge_poll_ms: u64,
    /// How often to check whether a click replaced the document.
    pub load_poll_ms: u64,
    /// Delay between a document load and the first cycle on it.
    pub page_settle_ms: u64,
    /// Delay between a resolved challenge and the next cycle.
    pub challenge_settle_ms: u64,
}

impl Default for Timers {
    fn default() -> Self {
        Self {
            reload_normal_ms: 2000,
            reload_fast_ms: 1500,
            not_found_grace_ms: 3000,
            watchdog_ms: 90_000,
            challenge_timeout_ms: 120_000,
            challenge_poll_ms: 500,
            load_poll_ms: 250,
            page_settle_ms: 500,
            challenge_settle_ms: 500,
        }
    }
}

impl Timers {
    pub fn reload_normal(&self) -> Duration {
        Duration::from_millis(self.reload_normal_ms)
    }

    pub fn reload_fast(&self) -> Duration {
        Duration::from_millis(self.reload_fast_ms)
    }

    pub fn not_found_grace(&self) -> Duration {
        Duration::from_millis(self.not_found_grace_ms)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_millis(self.challenge_timeout_ms)
    }

    pub fn challenge_poll(&self) -> Duration {
        Duration::from_millis(self.challenge_poll_ms)
    }

    pub fn load_poll(&self) -> Duration {
        Duration::from_millis(self.load_poll_ms)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    pub fn challenge_settle(&self) -> Duration {
        Duration::from_millis(self.challenge_settle_ms)
    }

    fn named(&self) -> [(&'static str, u64); 9] {
        [
            ("reload_normal_ms", self.reload_normal_ms),
            ("reload_fast_ms", self.reload_fast_ms),
            ("not_found_grace_ms", self.not_found_grace_ms),
            ("watchdog_ms", self.watchdog_ms),
            ("challenge_timeout_ms", self.challenge_timeout_ms),
            ("challenge_poll_ms", self.challenge_poll_ms),
            ("load_poll_ms", self.load_poll_ms),
            ("page_settle_ms", self.page_settle_ms),
            ("challenge_settle_ms", self.challenge_settle_ms),
        ]
    }
}

impl Config {
    /// Default location of the config file (`<data dir>/config.json`).
    pub fn default_path() -> Option<PathBuf> {
        crate::utils::get_data_dir()
            .ok()
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// when a file is there and the built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, RunError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        let config = match path {
            Some(p) => {
                log::info!("[*] Loading configuration from {}", p.display());
                let content = fs::read_to_string(&p).map_err(|e| RunError::InvalidConfig {
                    message: format!("Cannot read {}: {}", p.display(), e),
                })?;
                Self::from_json(&content)?
            }
            None => {
                log::debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, RunError> {
        serde_json::from_str(content).map_err(|e| RunError::InvalidConfig {
            message: format!("Malformed configuration: {}", e),
        })
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the invariants the engine relies on: positive durations,
    /// non-empty keyword sets, selectors and names.
    pub fn validate(&self) -> Result<(), RunError> {
        let invalid = |message: String| Err(RunError::InvalidConfig { message });

        if self.activation_url.trim().is_empty() {
            return invalid("activation_url must not be empty".to_string());
        }
        if self.target.trim().is_empty() {
            return invalid("target must not be empty".to_string());
        }

        for (name, value) in self.timers.named() {
            if value == 0 {
                return invalid(format!("timers.{} must be greater than zero", name));
            }
        }

        let keywords = [
            ("not_found", &self.keywords.not_found),
            ("goal_acquired", &self.keywords.goal_acquired),
            ("queued_status", &self.keywords.queued_status),
            ("challenge_error", &self.keywords.challenge_error),
            ("challenge_text", &self.keywords.challenge_text),
            ("nothing_offered", &self.keywords.nothing_offered),
        ];
        for (name, set) in keywords {
            if set.is_empty() {
                return invalid(format!("keywords.{} must contain at least one phrase", name));
            }
        }

        let selectors = [
            ("challenge_frame", &self.selectors.challenge_frame),
            ("challenge_success", &self.selectors.challenge_success),
            ("queue_button", &self.selectors.queue_button),
            ("meal_panel", &self.selectors.meal_panel),
            ("goal_popup_title", &self.selectors.goal_popup_title),
            ("release_button", &self.selectors.release_button),
        ];
        for (name, selector) in selectors {
            if selector.trim().is_empty() {
                return invalid(format!("selectors.{} must not be empty", name));
            }
        }

        Ok(())
    }

    /// Activation URL without its query string.
    pub fn activation_prefix(&self) -> &str {
        self.activation_url
            .split('?')
            .next()
            .unwrap_or(&self.activation_url)
    }

    /// True if the automaton should run on `url`.
    pub fn is_activation_url(&self, url: &str) -> bool {
        url.starts_with(self.activation_prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_json(r#"{ "target": "Jantar", "timers": { "watchdog_ms": 60000 } }"#)
            .unwrap();
        assert_eq!(config.target, "Jantar");
        assert_eq!(config.timers.watchdog_ms, 60_000);
        assert_eq!(config.timers.reload_normal_ms, 2000);
        assert_eq!(config.selectors, Selectors::default());
        assert_eq!(config.peak_windows.len(), 3);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut config = Config::default();
        config.timers.challenge_poll_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("challenge_poll_ms"));
    }

    #[test]
    fn empty_keyword_set_is_rejected() {
        let config = Config::from_json(r#"{ "keywords": { "not_found": [] } }"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("keywords.not_found"));

        let config = Config::from_json(r#"{ "keywords": { "challenge_text": ["  "] } }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(matches!(err, RunError::InvalidConfig { .. }));
    }

    #[test]
    fn serialized_defaults_load_back() {
        let json = Config::default().to_json().unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), Config::default());
    }

    #[test]
    fn load_reads_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "target": "Jantar" }}"#).unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.target, "Jantar");
    }

    #[test]
    fn load_rejects_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(RunError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn keyword_match_ignores_case() {
        let set = KeywordSet::new(["Verify you are human"]);
        assert!(set.matches("please VERIFY YOU ARE HUMAN now"));
        assert!(!set.matches("welcome"));
    }

    #[test]
    fn activation_prefix_drops_query() {
        let config = Config {
            activation_url: "https://example.org/fila.do?periodo=1".to_string(),
            ..Config::default()
        };
        assert_eq!(config.activation_prefix(), "https://example.org/fila.do");
        assert!(config.is_activation_url("https://example.org/fila.do?periodo=2"));
        assert!(config.is_activation_url("https://example.org/fila.do"));
        assert!(!config.is_activation_url("https://example.org/login.do"));
    }
}
