//! # SISRU meal-queue reservation automaton
//!
//! Drives a browser tab on the SISRU queue page: classifies what the page
//! shows, performs at most one action per cycle, waits for a human to clear
//! the verification challenge, and recovers from stalls with a watchdog.

pub mod browser;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod logger;
pub mod page;
pub mod period;
pub mod session;
pub mod situation;
pub mod status;
pub mod timers;
pub mod utils;

// Re-export commonly used items
pub use config::Config;
pub use engine::{Engine, RunOutcome};
pub use error::RunError;
pub use logger::init_logger;
pub use session::{run_reservation, RunOptions};
pub use status::{ChannelSink, LogSink, Status, StatusEvent, StatusSink};
pub use utils::{get_user_data_dir, CancellationToken};
