use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::error::{ErrorKind, PipelineError};
use crate::redirects::LaunchFailure;
use crate::signal_handler;
use crate::sys::syscall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Running,
    ExecFailed(LaunchFailure),
    Exited(i32),
    Signaled(Signal),
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Exited(0))
    }
}

#[derive(Debug)]
pub struct StageProcess {
    pub index: usize,
    pub pid: Pid,
    pub command: String,
    pub outcome: StageOutcome,
    reaped: bool,
}

impl StageProcess {
    pub fn new(index: usize, pid: Pid, command: String, outcome: StageOutcome) -> Self {
        Self {
            index,
            pid,
            command,
            outcome,
            reaped: false,
        }
    }

    /// Block until this stage terminates and record how.
    ///
    /// A stage that failed to launch keeps its `ExecFailed` outcome; the
    /// status of its `_exit` carries no extra information.
    fn reap(&mut self) -> Result<(), PipelineError> {
        while !self.reaped {
            let status = syscall(|| waitpid(self.pid, None))
                .map_err(|source| PipelineError::Wait { stage: self.index, source })?;
            let terminal = match status {
                WaitStatus::Exited(_, code) => StageOutcome::Exited(code),
                WaitStatus::Signaled(_, signal, _) => StageOutcome::Signaled(signal),
                _ => continue,
            };
            self.reaped = true;
            if !matches!(self.outcome, StageOutcome::ExecFailed(_)) {
                self.outcome = terminal;
            }
            debug!(stage = self.index, pid = self.pid.as_raw(), outcome = ?self.outcome, "reaped");
        }
        Ok(())
    }
}

/// Owns every launched stage until all of them have been reaped.
#[derive(Debug, Default)]
pub struct Supervisor {
    stages: Vec<StageProcess>,
}

impl Supervisor {
    pub fn with_capacity(stages: usize) -> Self {
        Self {
            stages: Vec::with_capacity(stages),
        }
    }

    pub fn push(&mut self, stage: StageProcess) {
        self.stages.push(stage);
    }

    /// Wait for every stage. A failed wait does not stop the others from
    /// being collected; the first such failure is returned afterwards.
    pub fn collect(mut self) -> Result<PipelineResult, PipelineError> {
        let mut first_error = None;
        for stage in &mut self.stages {
            if let Err(err) = stage.reap() {
                warn!(stage = stage.index, error = %err, "wait failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(PipelineResult { stages: self.stages }),
        }
    }

    /// Kill and reap everything launched so far. Used when a later stage
    /// cannot be started at all.
    pub fn abort(mut self) {
        for stage in &mut self.stages {
            if let Err(errno) = signal_handler::terminate_stage(stage.pid) {
                warn!(stage = stage.index, pid = stage.pid.as_raw(), %errno, "cannot terminate stage");
            }
            if let Err(err) = stage.reap() {
                warn!(stage = stage.index, error = %err, "cannot reap aborted stage");
            }
        }
    }
}

/// Termination status of every stage, in stage order.
#[derive(Debug)]
pub struct PipelineResult {
    stages: Vec<StageProcess>,
}

impl PipelineResult {
    pub fn stages(&self) -> &[StageProcess] {
        &self.stages
    }

    /// True only if every stage exited with status zero.
    pub fn success(&self) -> bool {
        self.stages.iter().all(|stage| stage.outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &StageProcess> {
        self.stages.iter().filter(|stage| !stage.outcome.is_success())
    }

    pub fn kind(&self) -> ErrorKind {
        if self.success() {
            ErrorKind::Success
        } else {
            ErrorKind::PipelineFailure
        }
    }
}
