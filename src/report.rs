//! Everything written to the error stream: log events and user-facing
//! error lines.

use std::io;

use colored::Colorize;
use crossterm::tty::IsTty;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{ColorChoice, Config, DEFAULT_LOG_FILTER};
use crate::error::PipelineError;
use crate::jobs::{StageOutcome, StageProcess};

const NAME: &str = "rpipe";

pub fn use_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stderr().is_tty(),
    }
}

/// Install the stderr subscriber and the colour override. Safe to call
/// more than once; later calls leave the first subscriber in place.
pub fn init_logging(config: &Config) {
    let color = use_color(config.color);
    colored::control::set_override(color);

    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(color)
                .with_target(false),
        )
        .with(filter)
        .try_init();
    if let Err(err) = installed {
        tracing::debug!(%err, "keeping the subscriber already installed");
    }
}

pub fn report_error(err: &PipelineError) {
    eprintln!("{}: {}", NAME.bold(), err.to_string().red());
    if matches!(err, PipelineError::Usage) {
        eprintln!("Usage: {NAME} <command> [args...] [| <command> [args...]]...");
    }
}

/// One line for a stage that never ran its program. Stages that ran and
/// failed have already spoken for themselves on stderr.
pub fn report_stage(stage: &StageProcess) {
    if let StageOutcome::ExecFailed(failure) = stage.outcome {
        eprintln!(
            "{}: stage {} ({}): {}",
            NAME.bold(),
            stage.index,
            stage.command,
            failure.to_string().red()
        );
    } else {
        tracing::info!(stage = stage.index, command = %stage.command, outcome = ?stage.outcome, "stage failed");
    }
}
