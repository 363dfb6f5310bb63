//! External source tables: pre-existing files wrapped as zero-dependency
//! table-producing tasks.

use std::io;
use std::path::PathBuf;

use crate::engine::{Dependencies, LocalTarget, Target, Task};
use crate::error::{PipelineError, PipelineResult};

/// Wraps a pre-existing external table file as a pipeline task.
///
/// Source tables are inputs, never generated: the engine only invokes `run`
/// when the output is missing, and a missing source file is an error
/// surfaced with its path.
pub struct SourceTable {
    path: PathBuf,
}

impl SourceTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Task for SourceTable {
    fn requires(&self) -> Dependencies {
        Dependencies::None
    }

    fn output(&self) -> Box<dyn Target> {
        Box::new(LocalTarget::new(&self.path))
    }

    fn run(&self) -> PipelineResult<()> {
        Err(PipelineError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source table {} does not exist", self.path.display()),
        )))
    }
}
