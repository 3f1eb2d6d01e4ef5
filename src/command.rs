use std::borrow::Cow;
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;

use crate::error::PipelineError;

/// The argv of one stage, program name first. Never empty.
///
/// Arguments are stored as `CString` so that nothing needs converting
/// once the stage is being launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageArgs {
    argv: Vec<CString>,
}

impl StageArgs {
    fn from_group<S: AsRef<OsStr>>(stage: usize, group: &[S]) -> Result<Self, PipelineError> {
        let argv = group
            .iter()
            .map(|arg| CString::new(arg.as_ref().as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| PipelineError::NulArgument { stage })?;
        Ok(Self { argv })
    }

    pub fn program(&self) -> Cow<'_, str> {
        self.argv[0].to_string_lossy()
    }

    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// Lossy rendering of the whole argv, for messages and logs.
    pub fn display(&self) -> String {
        self.argv
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Stages in left-to-right command order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<StageArgs>,
}

/// Number of stages the arguments describe: one more than the number of
/// delimiter tokens.
pub fn count_stages<S: AsRef<OsStr>>(args: &[S], delimiter: &str) -> usize {
    args.iter().filter(|arg| arg.as_ref() == delimiter).count() + 1
}

impl Pipeline {
    /// Partition the invocation arguments (without the program's own name)
    /// into stage groups.
    ///
    /// A delimiter only matches as a whole token; `a|b` is an ordinary
    /// argument.
    pub fn split<S: AsRef<OsStr>>(args: &[S], delimiter: &str) -> Result<Self, PipelineError> {
        if args.is_empty() {
            return Err(PipelineError::Usage);
        }

        let mut stages = Vec::with_capacity(count_stages(args, delimiter));
        for (stage, group) in args.split(|arg| arg.as_ref() == delimiter).enumerate() {
            if group.is_empty() {
                return Err(PipelineError::EmptyStage {
                    stage,
                    delimiter: delimiter.to_string(),
                });
            }
            stages.push(StageArgs::from_group(stage, group)?);
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[StageArgs] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
