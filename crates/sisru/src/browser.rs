use headless_chrome::browser::default_executable;
use headless_chrome::{Browser, LaunchOptions};
use std::error::Error;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the Chrome/Chromium binary to launch.
pub const CHROME_PATH_ENV: &str = "SISRU_CHROME_PATH";

/// The automaton may wait through a whole peak window and beyond; the browser
/// must not be reaped for being idle in the meantime.
const IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

/// Resolves the browser binary: `SISRU_CHROME_PATH` (a path, or a command
/// name looked up on `PATH`), then headless_chrome's own discovery.
fn resolve_executable() -> Option<PathBuf> {
    if let Ok(value) = std::env::var(CHROME_PATH_ENV) {
        let candidate = PathBuf::from(&value);
        if candidate.components().count() > 1 || candidate.exists() {
            return Some(candidate);
        }
        match which::which(&value) {
            Ok(found) => return Some(found),
            Err(e) => log::warn!("[!] {}={} not found on PATH: {}", CHROME_PATH_ENV, value, e),
        }
    }
    default_executable().ok()
}

/// Creates a browser with a persistent profile, so that the challenge
/// provider's cookies and the SISRU session survive between runs.
///
/// A visible window is the normal mode: a human has to be able to solve the
/// verification challenge. If Chrome refuses to start on the existing
/// profile, the profile is wiped once and the launch retried.
pub fn create_browser(agent: Option<&str>, headless: bool) -> Result<Browser, Box<dyn Error>> {
    let user_agent = agent.map(|a| OsString::from(format!("--user-agent={a}")));

    let mut attempts = 0;
    loop {
        let user_data_dir = crate::utils::get_user_data_dir()?;

        let mut args = vec![
            OsStr::new("--no-first-run"),
            OsStr::new("--no-default-browser-check"),
            OsStr::new("--disable-session-crashed-bubble"),
            OsStr::new("--lang=pt-BR"),
        ];
        if let Some(ua) = &user_agent {
            args.push(ua.as_os_str());
        }

        let mut options = LaunchOptions::default_builder();
        let mut launch_options = options
            .headless(headless)
            .sandbox(false)
            .idle_browser_timeout(IDLE_TIMEOUT)
            .window_size(Some((1100, 900)))
            .args(args)
            .user_data_dir(Some(user_data_dir));

        if let Some(path) = resolve_executable() {
            launch_options = launch_options.path(Some(path));
        }

        match Browser::new(launch_options.build()?) {
            Ok(browser) => return Ok(browser),
            Err(e) => {
                attempts += 1;
                if attempts >= 2 {
                    return Err(format!("Browser failed even after wipe: {}", e).into());
                }
                log::warn!("[!] Browser connection failed. Wiping profile and retrying...");
                crate::utils::wipe_user_data_dir()?;
            }
        }
    }
}
