use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

use crate::error::RunError;
use fd_lock::{RwLock, RwLockWriteGuard};
use once_cell::sync::Lazy;
use std::fs::File;
use std::sync::Mutex;

// Stores the write guard to keep the lock held for the process lifetime.
static INSTANCE_LOCK: Lazy<Mutex<Option<RwLockWriteGuard<'static, File>>>> =
    Lazy::new(|| Mutex::new(None));

/// Ensures that only one instance of the application is running.
/// Two automatons sharing one Chrome profile fight over the same tab session.
pub fn ensure_single_instance() -> Result<(), RunError> {
    let io_error = |e: &dyn std::fmt::Display| RunError::Unknown {
        message: format!("Cannot create the instance lock: {}", e),
    };

    let mut lock_path = get_data_dir().map_err(|e| io_error(&e))?;
    lock_path.push("sisru.lock");

    let file = File::create(&lock_path).map_err(|e| io_error(&e))?;
    // Leak the RwLock to get a 'static reference so the guard can outlive this function.
    let lock_ref: &'static mut RwLock<File> = Box::leak(Box::new(RwLock::new(file)));

    match lock_ref.try_write() {
        Ok(guard) => {
            let mut slot = INSTANCE_LOCK
                .lock()
                .map_err(|_| io_error(&"instance lock poisoned"))?;
            *slot = Some(guard);
            Ok(())
        }
        Err(_) => Err(RunError::AlreadyRunning),
    }
}

/// Platform-relative path from the home directory to the sisru data directory.
#[cfg(target_os = "linux")]
const DATA_SUBPATH: &str = ".local/share/sisru";

#[cfg(target_os = "macos")]
const DATA_SUBPATH: &str = "Library/Application Support/sisru";

#[cfg(target_os = "windows")]
const DATA_SUBPATH: &str = "AppData/Roaming/sisru";

/// Returns the platform-appropriate data directory holding the Chrome profile,
/// the configuration file and the instance lock.
///
/// - **Linux:** `~/.local/share/sisru`
/// - **macOS:** `~/Library/Application Support/sisru`
/// - **Windows:** `%USERPROFILE%\AppData\Roaming\sisru`
///
/// Creates the directory if it does not already exist.
pub fn get_data_dir() -> Result<PathBuf, Box<dyn Error>> {
    let home_dir = env::var("HOME").or_else(|_| env::var("USERPROFILE"))?;
    let data_dir = PathBuf::from(&home_dir).join(DATA_SUBPATH);

    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        log::info!("Data directory created at: {:?}", data_dir);
    }

    Ok(data_dir)
}

/// Returns the Chrome profile directory (`<data dir>/profile`), creating it if needed.
///
/// Keeping a persistent profile keeps the SISRU login cookies between runs.
pub fn get_user_data_dir() -> Result<PathBuf, Box<dyn Error>> {
    let user_data_dir = get_data_dir()?.join("profile");

    if !user_data_dir.exists() {
        std::fs::create_dir_all(&user_data_dir)?;
        log::info!("User data directory created at: {:?}", user_data_dir);
    }

    Ok(user_data_dir)
}

/// Completely removes the Chrome profile directory
pub fn wipe_user_data_dir() -> Result<(), Box<dyn Error>> {
    let path = get_user_data_dir()?;
    if path.exists() {
        std::fs::remove_dir_all(&path)?;
        log::info!("Wiped profile directory: {:?}", path);
    }
    Ok(())
}

/// Escapes JavaScript strings to prevent injection.
pub fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_escape_quotes_and_backslashes() {
        assert_eq!(js_escape(r"it's"), r"it\'s");
        assert_eq!(js_escape(r"#form\:j_idt24"), r"#form\\:j_idt24");
        assert_eq!(js_escape("a\nb"), "a\\nb");
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
