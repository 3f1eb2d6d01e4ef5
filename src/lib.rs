//! Run a linear chain of external commands joined by pipes, the way a
//! shell runs `cmd1 | cmd2 | ... | cmdN`.

pub mod command;
pub mod config;
pub mod error;
pub mod jobs;
pub mod pipes;
pub mod redirects;
pub mod report;
pub mod shell;
pub mod signal_handler;
mod sys;

pub use command::{Pipeline, StageArgs};
pub use config::Config;
pub use error::{ErrorKind, PipelineError};
pub use jobs::{PipelineResult, StageOutcome, StageProcess};
pub use shell::{run, Phase, Runner};
