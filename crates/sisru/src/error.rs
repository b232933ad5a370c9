/// High-level error category for display purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or unreadable configuration - fix the file or the flags
    Configuration,
    /// Browser launch, navigation and connection problems
    Browser,
    /// Everything else - locks, filesystem, cancellation
    System,
}

/// Errors that end a run before it reaches a terminal page state.
///
/// Anything the automaton can recover from (reloads, redirects, challenge
/// waits, watchdog recoveries) never shows up here; these are the cases where
/// continuing would not help.
#[derive(Debug, Clone)]
pub enum RunError {
    /// The configuration failed validation or could not be parsed.
    InvalidConfig {
        message: String,
    },

    /// Technical/browser errors
    BrowserError {
        message: String,
    },
    NavigationFailed {
        url: String,
        message: String,
    },
    /// The page stopped answering inspection queries for too many cycles.
    InspectionFailed {
        attempts: u32,
        message: String,
    },

    AlreadyRunning,
    Cancelled,

    /// Unexpected errors
    Unknown {
        message: String,
    },
}

impl RunError {
    /// Returns the high-level category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            RunError::InvalidConfig { .. } => ErrorCategory::Configuration,
            RunError::BrowserError { .. }
            | RunError::NavigationFailed { .. }
            | RunError::InspectionFailed { .. } => ErrorCategory::Browser,
            RunError::AlreadyRunning | RunError::Cancelled | RunError::Unknown { .. } => {
                ErrorCategory::System
            }
        }
    }

    /// Returns true if wiping the browser profile is worth suggesting
    pub fn should_suggest_clean_profile(&self) -> bool {
        matches!(
            self,
            RunError::BrowserError { .. } | RunError::InspectionFailed { .. }
        )
    }

    /// Returns the user-facing error message
    pub fn user_message(&self) -> String {
        match self {
            RunError::InvalidConfig { message } => {
                format!("Invalid configuration.\n\n{}", message)
            }
            RunError::BrowserError { message } => {
                format!("Browser error.\n\n{}", message)
            }
            RunError::NavigationFailed { url, message } => {
                format!("Could not open {}.\n\n{}", url, message)
            }
            RunError::InspectionFailed { attempts, message } => {
                format!(
                    "The page could not be inspected after {} attempts.\n\n{}",
                    attempts, message
                )
            }
            RunError::AlreadyRunning => "Another instance of sisru is already running.".to_string(),
            RunError::Cancelled => "Operation cancelled by user.".to_string(),
            RunError::Unknown { message } => {
                format!("An error occurred.\n\n{}", message)
            }
        }
    }

    /// Returns troubleshooting suggestions based on error type
    pub fn troubleshooting_steps(&self) -> Vec<String> {
        let mut steps = Vec::new();

        match self.category() {
            ErrorCategory::Configuration => {
                steps.push("Check the configuration file against the defaults (--print-config)".to_string());
            }
            ErrorCategory::Browser => {
                steps.push("Make sure Chrome/Chromium is installed or set SISRU_CHROME_PATH".to_string());
            }
            ErrorCategory::System => {}
        }

        if self.should_suggest_clean_profile() {
            steps.push("Try wiping the browser profile (--clean)".to_string());
        }

        steps
    }

    /// Returns the full error message with troubleshooting steps
    pub fn full_message(&self) -> String {
        let mut msg = self.user_message();
        let steps = self.troubleshooting_steps();

        if !steps.is_empty() {
            msg.push_str("\n\nTroubleshooting steps:");
            for (i, step) in steps.iter().enumerate() {
                msg.push_str(&format!("\n{}. {}", i + 1, step));
            }
        }

        msg
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_message())
    }
}

impl std::error::Error for RunError {}

impl From<anyhow::Error> for RunError {
    fn from(err: anyhow::Error) -> Self {
        RunError::Unknown {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            RunError::InvalidConfig { message: "x".into() }.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            RunError::InspectionFailed { attempts: 5, message: "gone".into() }.category(),
            ErrorCategory::Browser
        );
        assert_eq!(RunError::Cancelled.category(), ErrorCategory::System);
    }

    #[test]
    fn full_message_lists_steps() {
        let msg = RunError::BrowserError { message: "launch failed".into() }.full_message();
        assert!(msg.contains("launch failed"));
        assert!(msg.contains("1. Make sure Chrome"));
        assert!(msg.contains("2. Try wiping the browser profile"));
    }

    #[test]
    fn cancelled_has_no_steps() {
        assert!(RunError::Cancelled.troubleshooting_steps().is_empty());
        assert_eq!(RunError::Cancelled.to_string(), "Operation cancelled by user.");
    }
}
