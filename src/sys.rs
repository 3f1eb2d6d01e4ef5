//! Thin wrappers over the descriptor syscalls used on both sides of fork.
//!
//! Nothing here allocates, so the child may call these between `fork`
//! and `execvp`.

use std::os::fd::RawFd;

use nix::errno::Errno;

/// Retry a system call interrupted by a signal.
pub(crate) fn syscall<F, T>(mut f: F) -> nix::Result<T>
where
    F: FnMut() -> nix::Result<T>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => (),
            result => return result,
        }
    }
}

/// Close a raw descriptor. Not retried on EINTR: Linux releases the
/// descriptor even when close is interrupted.
pub(crate) fn close_fd(fd: RawFd) -> nix::Result<()> {
    Errno::result(unsafe { libc::close(fd) }).map(drop)
}

/// Make `target` refer to the same open file as `fd`, then drop `fd`.
///
/// Graph pipes are close-on-exec; `dup2` never copies that flag, so the
/// new standard stream survives the exec. When the kernel already handed
/// out `fd == target` the flag is cleared in place instead.
pub(crate) fn dup_onto(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd == target {
        return Errno::result(unsafe { libc::fcntl(fd, libc::F_SETFD, 0) }).map(drop);
    }
    syscall(|| Errno::result(unsafe { libc::dup2(fd, target) }))?;
    close_fd(fd)
}
