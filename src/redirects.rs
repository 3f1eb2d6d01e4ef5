use std::ffi::c_char;
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::ptr;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult};
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::StageArgs;
use crate::error::PipelineError;
use crate::jobs::{StageOutcome, StageProcess};
use crate::pipes::{Holder, PipeGraph};
use crate::signal_handler;
use crate::sys::{close_fd, dup_onto, syscall};

/// Descriptor plan for one stage, computed before fork.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wiring {
    pub stdin: Option<RawFd>,
    pub stdout: Option<RawFd>,
    pub close: Vec<RawFd>,
}

impl Wiring {
    pub fn for_stage(graph: &PipeGraph, stage: usize) -> Self {
        Self {
            stdin: graph.stdin_of(stage),
            stdout: graph.stdout_of(stage),
            close: graph.close_set(Holder::Stage(stage)),
        }
    }

    /// Child side. Foreign endpoints are closed before anything is dup'ed.
    fn apply(&self) -> Result<(), Errno> {
        for &fd in &self.close {
            close_fd(fd)?;
        }
        if let Some(fd) = self.stdin {
            dup_onto(fd, libc::STDIN_FILENO)?;
        }
        if let Some(fd) = self.stdout {
            dup_onto(fd, libc::STDOUT_FILENO)?;
        }
        Ok(())
    }
}

/// Why a child never became its stage's program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LaunchFailure {
    #[error("cannot wire standard streams: {0}")]
    Wiring(Errno),
    #[error("{}", describe_exec(.0))]
    Exec(Errno),
}

fn describe_exec(errno: &Errno) -> String {
    match *errno {
        Errno::ENOENT => "unknown command".to_string(),
        other => format!("cannot execute: {other}"),
    }
}

const WIRING_TAG: u8 = b'W';
const EXEC_TAG: u8 = b'E';
const REPORT_LEN: usize = 5;

impl LaunchFailure {
    /// Status the child terminates with.
    pub fn exit_status(self) -> i32 {
        match self {
            LaunchFailure::Wiring(_) => 126,
            LaunchFailure::Exec(_) => 127,
        }
    }

    fn encode(self) -> [u8; REPORT_LEN] {
        let (tag, errno) = match self {
            LaunchFailure::Wiring(errno) => (WIRING_TAG, errno),
            LaunchFailure::Exec(errno) => (EXEC_TAG, errno),
        };
        let code = (errno as i32).to_ne_bytes();
        [tag, code[0], code[1], code[2], code[3]]
    }

    fn decode(report: &[u8]) -> Option<Self> {
        let (&tag, code) = report.split_first()?;
        let errno = Errno::from_raw(i32::from_ne_bytes(code.try_into().ok()?));
        match tag {
            WIRING_TAG => Some(LaunchFailure::Wiring(errno)),
            EXEC_TAG => Some(LaunchFailure::Exec(errno)),
            _ => None,
        }
    }
}

/// Configures one stage, then hands control to it with [`spawn`].
///
/// [`spawn`]: StageLauncher::spawn
#[derive(Debug)]
pub struct StageLauncher<'a> {
    index: usize,
    args: &'a StageArgs,
    wiring: Wiring,
}

impl<'a> StageLauncher<'a> {
    pub fn new(index: usize, args: &'a StageArgs) -> Self {
        Self {
            index,
            args,
            wiring: Wiring::default(),
        }
    }

    pub fn wiring(mut self, wiring: Wiring) -> Self {
        self.wiring = wiring;
        self
    }

    /// Fork the stage. Returns once the child has either replaced its
    /// image or reported why it could not; the latter is not an error
    /// here but an `ExecFailed` outcome on the returned process.
    pub fn spawn(self) -> Result<StageProcess, PipelineError> {
        let argv: Vec<*const c_char> = self
            .args
            .argv()
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .collect();
        let (report_read, report_write) = syscall(|| unistd::pipe2(OFlag::O_CLOEXEC))
            .map_err(|source| PipelineError::Spawn { stage: self.index, source })?;

        match syscall(|| unsafe { unistd::fork() }) {
            Err(source) => Err(PipelineError::Spawn { stage: self.index, source }),
            Ok(ForkResult::Child) => {
                let failure = exec_child(&self.wiring, &argv);
                let report = failure.encode();
                unsafe {
                    libc::write(report_write.as_raw_fd(), report.as_ptr().cast(), report.len());
                    libc::_exit(failure.exit_status())
                }
            }
            Ok(ForkResult::Parent { child }) => {
                drop(report_write);
                let outcome = match read_report(report_read) {
                    Ok(None) => StageOutcome::Running,
                    Ok(Some(failure)) => StageOutcome::ExecFailed(failure),
                    Err(err) => {
                        warn!(stage = self.index, error = %err, "lost launch report");
                        StageOutcome::Running
                    }
                };
                debug!(
                    stage = self.index,
                    pid = child.as_raw(),
                    command = %self.args.display(),
                    ?outcome,
                    "spawned"
                );
                Ok(StageProcess::new(self.index, child, self.args.display(), outcome))
            }
        }
    }
}

/// Runs in the forked child; only returns if the image was not replaced.
fn exec_child(wiring: &Wiring, argv: &[*const c_char]) -> LaunchFailure {
    if let Err(errno) = signal_handler::reset_child_signals().and_then(|()| wiring.apply()) {
        return LaunchFailure::Wiring(errno);
    }
    unsafe { libc::execvp(argv[0], argv.as_ptr()) };
    LaunchFailure::Exec(Errno::last())
}

/// Read the child's launch report. EOF without data means the exec went
/// through and closed the close-on-exec write end.
fn read_report(report_read: OwnedFd) -> io::Result<Option<LaunchFailure>> {
    let mut file = File::from(report_read);
    let mut report = [0u8; REPORT_LEN];
    let mut filled = 0;
    while filled < REPORT_LEN {
        match file.read(&mut report[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    match filled {
        0 => Ok(None),
        REPORT_LEN => Ok(LaunchFailure::decode(&report)),
        _ => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated launch report")),
    }
}
