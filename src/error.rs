use nix::errno::Errno;
use thiserror::Error;

/// Failure classes visible to whoever invoked `rpipe`.
///
/// This is the only place exit codes are spelled out; everything else
/// talks in terms of `ErrorKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Every stage exited with status zero.
    Success,
    /// At least one stage exited non-zero, was killed, or failed to start.
    PipelineFailure,
    /// No command given.
    Usage,
    /// Malformed delimiter placement or an unrepresentable argument.
    Parse,
    /// Pipe allocation, fork or wait failed in the orchestrator.
    Resource,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Success => 0,
            ErrorKind::PipelineFailure => 1,
            ErrorKind::Usage | ErrorKind::Parse => 2,
            ErrorKind::Resource => 3,
        }
    }
}

/// Structural errors: they abort the invocation before (or instead of)
/// collecting stage statuses.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no command given")]
    Usage,
    #[error("stage {stage} is empty (leading, trailing or doubled '{delimiter}')")]
    EmptyStage { stage: usize, delimiter: String },
    #[error("stage {stage}: argument contains a NUL byte")]
    NulArgument { stage: usize },
    #[error("cannot allocate pipe: {0}")]
    PipeAllocation(#[source] Errno),
    #[error("cannot spawn stage {stage}: {source}")]
    Spawn {
        stage: usize,
        #[source]
        source: Errno,
    },
    #[error("cannot collect stage {stage}: {source}")]
    Wait {
        stage: usize,
        #[source]
        source: Errno,
    },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Usage => ErrorKind::Usage,
            PipelineError::EmptyStage { .. } | PipelineError::NulArgument { .. } => ErrorKind::Parse,
            PipelineError::PipeAllocation(_)
            | PipelineError::Spawn { .. }
            | PipelineError::Wait { .. } => ErrorKind::Resource,
        }
    }
}
