//! # SISRU reservation tool
//!
//! Opens a browser on the SISRU meal-queue page and keeps it working until a
//! queue position for the chosen meal is held.

mod args;
mod display;

use args::Args;
use clap::Parser;
use dialoguer::Confirm;
use display::{format_duration, StatusDisplay};
use log::{error, info};
use sisru::{init_logger, run_reservation, CancellationToken, ChannelSink, Config, RunError, RunOptions};
use std::process::ExitCode;
use std::time::Duration;

/// Exit code of a run stopped with Ctrl+C.
const EXIT_INTERRUPTED: u8 = 130;

fn load_config(args: &Args) -> Result<Config, RunError> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(url) = &args.url {
        config.activation_url = url.clone();
    }
    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    config.validate()?;
    Ok(config)
}

fn clean_profile(skip_prompt: bool) -> ExitCode {
    if !skip_prompt {
        let confirmed = Confirm::new()
            .with_prompt("Delete the saved browser profile (cookies, challenge clearance)?")
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            info!("Nothing removed.");
            return ExitCode::SUCCESS;
        }
    }

    match sisru::utils::wipe_user_data_dir() {
        Ok(_) => {
            info!("Session information successfully removed.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to remove session information: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// The main entry point of the application.
fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.level.into());

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e.full_message());
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        return match config.to_json() {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Could not serialize the configuration: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Ensure only one instance is running
    if let Err(e) = sisru::utils::ensure_single_instance() {
        error!("{}", e.full_message());
        return ExitCode::FAILURE;
    }

    if args.clean {
        return clean_profile(args.yes);
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            log::warn!("[!] Could not install the Ctrl+C handler: {}", e);
        }
    }

    let options = RunOptions {
        headless: args.headless,
        user_agent: args.user_agent.clone(),
        overlay: !args.no_overlay,
        ..RunOptions::default()
    };

    let (status_tx, status_rx) = crossbeam_channel::unbounded();
    let worker = {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            let sink = ChannelSink::new(status_tx);
            run_reservation(&config, &options, &sink, Some(&cancel))
        })
    };

    let mut display = StatusDisplay::new();
    loop {
        match status_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => display.render(&event),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if worker.is_finished() {
                    break;
                }
            }
            // The worker dropped its sink: it is done.
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    let elapsed = display.elapsed();
    display.finish();

    let result = worker.join().unwrap_or_else(|_| {
        Err(RunError::Unknown {
            message: "The automation thread panicked".to_string(),
        })
    });

    match result {
        Ok(outcome) if outcome.is_success() => {
            info!("[✓] {:?} after {}.", outcome, format_duration(elapsed));
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            error!("Stopped: {:?}", outcome);
            ExitCode::FAILURE
        }
        Err(RunError::Cancelled) => {
            info!("Interrupted after {}.", format_duration(elapsed));
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!("{}", e.full_message());
            ExitCode::FAILURE
        }
    }
}
