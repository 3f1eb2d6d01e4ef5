use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::Pid;

/// Restore default dispositions the orchestrator changed for itself.
///
/// The Rust runtime ignores SIGPIPE and ignored signals survive exec, so
/// without this a writer whose reader went away would spin on EPIPE
/// instead of terminating. Called in the child between fork and exec.
pub fn reset_child_signals() -> Result<(), Errno> {
    unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }.map(drop)
}

/// Kill a stage that will never be waited on as part of a normal run.
pub fn terminate_stage(pid: Pid) -> Result<(), Errno> {
    match signal::kill(pid, Signal::SIGKILL) {
        // Already exited; it only needs reaping.
        Err(Errno::ESRCH) => Ok(()),
        result => result,
    }
}
