use std::ffi::OsStr;

use tracing::{debug, warn};

use crate::command::Pipeline;
use crate::config::Config;
use crate::error::PipelineError;
use crate::jobs::{PipelineResult, Supervisor};
use crate::pipes::PipeGraph;
use crate::redirects::{StageLauncher, Wiring};

/// Where an invocation is. Phases only move forward; `Done` is reached
/// once every stage status is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Parsing,
    Building,
    Launching,
    Running,
    Collecting,
    Done,
}

pub struct Runner<'a> {
    config: &'a Config,
    phase: Phase,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            phase: Phase::Parsing,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "pipeline phase");
        self.phase = phase;
    }

    /// Run one pipeline described by `args` (the invocation arguments
    /// without the program name) against the current stdin/stdout.
    pub fn run<S: AsRef<OsStr>>(&mut self, args: &[S]) -> Result<PipelineResult, PipelineError> {
        self.enter(Phase::Parsing);
        let pipeline = Pipeline::split(args, &self.config.delimiter)?;

        self.enter(Phase::Building);
        let graph = PipeGraph::build(pipeline.len())?;

        self.enter(Phase::Launching);
        let mut supervisor = Supervisor::with_capacity(pipeline.len());
        for (index, stage) in pipeline.stages().iter().enumerate() {
            let launched = StageLauncher::new(index, stage)
                .wiring(Wiring::for_stage(&graph, index))
                .spawn();
            match launched {
                Ok(process) => supervisor.push(process),
                Err(err) => {
                    drop(graph);
                    supervisor.abort();
                    return Err(err);
                }
            }
        }

        self.enter(Phase::Running);
        if let Err(errno) = graph.close_all() {
            warn!(%errno, "cannot close pipe in orchestrator");
        }

        self.enter(Phase::Collecting);
        let result = supervisor.collect()?;

        self.enter(Phase::Done);
        Ok(result)
    }
}

/// Convenience wrapper: run `args` with `config` in one call.
pub fn run<S: AsRef<OsStr>>(args: &[S], config: &Config) -> Result<PipelineResult, PipelineError> {
    Runner::new(config).run(args)
}
