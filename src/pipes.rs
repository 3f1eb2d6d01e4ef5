use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd;
use tracing::debug;

use crate::error::PipelineError;
use crate::sys::{close_fd, syscall};

/// End of a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Read,
    Write,
}

/// Which process is allowed to keep a pipe endpoint open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    Stage(usize),
    Orchestrator,
}

/// One connection between adjacent stages.
#[derive(Debug)]
pub struct PipePair {
    read: OwnedFd,
    write: OwnedFd,
}

impl PipePair {
    fn end(&self, side: Side) -> RawFd {
        match side {
            Side::Read => self.read.as_raw_fd(),
            Side::Write => self.write.as_raw_fd(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Owners {
    writer: Holder,
    reader: Holder,
}

impl Owners {
    fn of(&self, side: Side) -> Holder {
        match side {
            Side::Read => self.reader,
            Side::Write => self.writer,
        }
    }
}

/// All inter-stage pipes of one invocation plus the table saying who
/// holds each end. Pipe `i` connects stage `i` (writer) to stage `i + 1`
/// (reader); the orchestrator holds nothing.
#[derive(Debug)]
pub struct PipeGraph {
    pipes: Vec<PipePair>,
    owners: Vec<Owners>,
}

impl PipeGraph {
    /// Allocate every pipe for a pipeline of `stages` stages up front.
    ///
    /// On failure the pipes opened so far are closed when the partial
    /// vector drops.
    pub fn build(stages: usize) -> Result<Self, PipelineError> {
        let count = stages.saturating_sub(1);
        let mut pipes = Vec::with_capacity(count);
        for _ in 0..count {
            let (read, write) = syscall(|| unistd::pipe2(OFlag::O_CLOEXEC))
                .map_err(PipelineError::PipeAllocation)?;
            debug!(read = read.as_raw_fd(), write = write.as_raw_fd(), "allocated pipe");
            pipes.push(PipePair { read, write });
        }
        let owners = (0..count)
            .map(|index| Owners {
                writer: Holder::Stage(index),
                reader: Holder::Stage(index + 1),
            })
            .collect();
        Ok(Self { pipes, owners })
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    #[cfg(test)]
    fn holder(&self, index: usize, side: Side) -> Option<Holder> {
        self.owners.get(index).map(|owners| owners.of(side))
    }

    /// Every endpoint `holder` must hand over to the stage it belongs to.
    fn held_by(&self, holder: Holder) -> impl Iterator<Item = (RawFd, Side)> + '_ {
        self.pipes
            .iter()
            .zip(&self.owners)
            .flat_map(|(pair, owners)| {
                [Side::Read, Side::Write].map(|side| (pair.end(side), side, owners.of(side)))
            })
            .filter(move |&(_, _, owner)| owner == holder)
            .map(|(fd, side, _)| (fd, side))
    }

    /// The descriptor `stage` should read standard input from, or `None`
    /// to inherit the invoker's.
    pub fn stdin_of(&self, stage: usize) -> Option<RawFd> {
        self.held_by(Holder::Stage(stage))
            .find(|&(_, side)| side == Side::Read)
            .map(|(fd, _)| fd)
    }

    /// The descriptor `stage` should write standard output to, or `None`
    /// to inherit the invoker's.
    pub fn stdout_of(&self, stage: usize) -> Option<RawFd> {
        self.held_by(Holder::Stage(stage))
            .find(|&(_, side)| side == Side::Write)
            .map(|(fd, _)| fd)
    }

    /// Endpoints `holder` does not own and therefore must close.
    pub fn close_set(&self, holder: Holder) -> Vec<RawFd> {
        self.pipes
            .iter()
            .zip(&self.owners)
            .flat_map(|(pair, owners)| {
                [Side::Read, Side::Write].map(|side| (pair.end(side), owners.of(side)))
            })
            .filter(|&(_, owner)| owner != holder)
            .map(|(fd, _)| fd)
            .collect()
    }

    /// Orchestrator side: close both ends of every pipe. Every endpoint is
    /// attempted; the first failure is returned.
    pub fn close_all(self) -> nix::Result<()> {
        let mut first_error: Option<Errno> = None;
        for pair in self.pipes {
            for fd in [pair.read.into_raw_fd(), pair.write.into_raw_fd()] {
                if let Err(errno) = close_fd(fd) {
                    first_error.get_or_insert(errno);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_stage_has_no_pipes() {
        let graph = PipeGraph::build(1).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.stdin_of(0), None);
        assert_eq!(graph.stdout_of(0), None);
        assert!(graph.close_set(Holder::Orchestrator).is_empty());
    }

    #[test]
    fn test_ownership_table() {
        let graph = PipeGraph::build(3).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.holder(0, Side::Write), Some(Holder::Stage(0)));
        assert_eq!(graph.holder(0, Side::Read), Some(Holder::Stage(1)));
        assert_eq!(graph.holder(1, Side::Write), Some(Holder::Stage(1)));
        assert_eq!(graph.holder(1, Side::Read), Some(Holder::Stage(2)));
        assert_eq!(graph.holder(2, Side::Read), None);
    }

    #[test]
    fn test_ends_are_wired_between_neighbours() {
        let graph = PipeGraph::build(3).unwrap();
        assert_eq!(graph.stdin_of(0), None);
        assert_eq!(graph.stdout_of(2), None);
        assert_eq!(graph.stdout_of(0), Some(graph.pipes[0].write.as_raw_fd()));
        assert_eq!(graph.stdin_of(1), Some(graph.pipes[0].read.as_raw_fd()));
        assert_eq!(graph.stdout_of(1), Some(graph.pipes[1].write.as_raw_fd()));
        assert_eq!(graph.stdin_of(2), Some(graph.pipes[1].read.as_raw_fd()));
    }

    #[test]
    fn test_close_sets_exclude_only_owned_ends() {
        let graph = PipeGraph::build(4).unwrap();
        assert_eq!(graph.close_set(Holder::Orchestrator).len(), 6);
        for stage in 0..4 {
            let close = graph.close_set(Holder::Stage(stage));
            let owned: Vec<RawFd> = [graph.stdin_of(stage), graph.stdout_of(stage)]
                .into_iter()
                .flatten()
                .collect();
            assert_eq!(close.len() + owned.len(), 6, "stage {stage}");
            assert!(owned.iter().all(|fd| !close.contains(fd)), "stage {stage}");
        }
    }

    #[test]
    fn test_close_all() {
        let graph = PipeGraph::build(3).unwrap();
        assert_eq!(graph.close_all(), Ok(()));
    }
}
