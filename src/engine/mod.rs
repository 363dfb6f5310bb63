//! # Task Graph Boundary
//!
//! The traits the pipeline core consumes from its execution engine, plus
//! local filesystem reference implementations.
//!
//! A [`Task`] declares upstream dependencies, one output [`Target`], and a
//! `run` procedure. The engine contract is: `run` executes at most once per
//! invocation, only when the output target does not already exist, and only
//! after every dependency has produced its own output. That ordering
//! guarantee, not locking, is what makes concurrent execution of independent
//! branches safe: each target is written by exactly one task and read-only
//! to everything downstream.
//!
//! [`LocalRunner`] is the bundled sequential engine; any scheduler
//! implementing [`TaskGraphRunner`] can drive the same task types.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::error::{PipelineError, PipelineResult};

/// A named, persisted location holding one table.
pub trait Target {
    /// Location of this target.
    fn path(&self) -> &Path;

    /// Whether the target has already been produced.
    fn exists(&self) -> bool;

    /// Open the target for reading.
    fn reader(&self) -> PipelineResult<Box<dyn Read>>;

    /// Open the target for writing. Nothing is visible at `path()` until
    /// the returned writer is committed.
    fn writer(&self) -> PipelineResult<Box<dyn TargetWriter>>;
}

/// A staged write to a [`Target`]. Dropping the writer without calling
/// [`commit`](TargetWriter::commit) discards everything written, so a failed
/// task run never leaves a partial output behind.
pub trait TargetWriter: Write {
    /// Atomically publish the written content at the target's path.
    fn commit(self: Box<Self>) -> PipelineResult<()>;
}

/// Upstream dependency declaration of a task.
pub enum Dependencies {
    /// No upstream tasks (external source data).
    None,
    /// Exactly one upstream task.
    Single(Arc<dyn Task>),
    /// An ordered collection of upstream tasks.
    Many(Vec<Arc<dyn Task>>),
    /// Upstream tasks addressed by role name.
    Named(HashMap<String, Arc<dyn Task>>),
}

impl Dependencies {
    /// All declared upstream tasks, in declaration order where one exists.
    pub fn tasks(&self) -> Vec<Arc<dyn Task>> {
        match self {
            Dependencies::None => Vec::new(),
            Dependencies::Single(task) => vec![Arc::clone(task)],
            Dependencies::Many(tasks) => tasks.iter().map(Arc::clone).collect(),
            Dependencies::Named(tasks) => tasks.values().map(Arc::clone).collect(),
        }
    }

    /// Number of declared upstream tasks.
    pub fn len(&self) -> usize {
        match self {
            Dependencies::None => 0,
            Dependencies::Single(_) => 1,
            Dependencies::Many(tasks) => tasks.len(),
            Dependencies::Named(tasks) => tasks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A unit of pipeline work managed by an external execution engine.
///
/// The output target's path must be fully determined before `run` executes;
/// it may depend on configuration and upstream task identities but never on
/// table contents.
pub trait Task: Send + Sync {
    /// Upstream tasks that must have produced their outputs before `run`.
    fn requires(&self) -> Dependencies;

    /// The single target this task writes.
    fn output(&self) -> Box<dyn Target>;

    /// Produce the output target. Invoked only when `output().exists()` is
    /// false and every dependency is satisfied.
    fn run(&self) -> PipelineResult<()>;
}

/// Abstract engine interface the task types are portable across.
pub trait TaskGraphRunner {
    /// Satisfy `task`'s dependencies, then run it unless its output already
    /// exists.
    fn run_if_needed(&self, task: &Arc<dyn Task>) -> PipelineResult<()>;
}

/// A [`Target`] over a local filesystem path.
///
/// Writes are staged into a sibling temp file and renamed into place on
/// commit, so readers never observe a half-written table.
pub struct LocalTarget {
    path: PathBuf,
}

impl LocalTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Target for LocalTarget {
    fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn reader(&self) -> PipelineResult<Box<dyn Read>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn writer(&self) -> PipelineResult<Box<dyn TargetWriter>> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let staged = NamedTempFile::new_in(&dir)?;
        Ok(Box::new(LocalTargetWriter {
            staged,
            dest: self.path.clone(),
        }))
    }
}

struct LocalTargetWriter {
    staged: NamedTempFile,
    dest: PathBuf,
}

impl Write for LocalTargetWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.staged.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.staged.flush()
    }
}

impl TargetWriter for LocalTargetWriter {
    fn commit(self: Box<Self>) -> PipelineResult<()> {
        self.staged
            .persist(&self.dest)
            .map_err(|e| PipelineError::Io(e.error))?;
        Ok(())
    }
}

/// Sequential depth-first reference engine.
///
/// Tracks completed outputs per invocation so shared upstream tasks run at
/// most once, and detects dependency cycles instead of recursing forever.
#[derive(Default)]
pub struct LocalRunner {
    satisfied: Mutex<HashSet<PathBuf>>,
    in_progress: Mutex<HashSet<PathBuf>>,
}

impl LocalRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskGraphRunner for LocalRunner {
    fn run_if_needed(&self, task: &Arc<dyn Task>) -> PipelineResult<()> {
        let output = task.output();
        let path = output.path().to_path_buf();

        if self.satisfied.lock().unwrap().contains(&path) {
            return Ok(());
        }
        if !self.in_progress.lock().unwrap().insert(path.clone()) {
            return Err(PipelineError::DependencyCycle {
                path: path.display().to_string(),
            });
        }

        let result = (|| {
            for upstream in task.requires().tasks() {
                self.run_if_needed(&upstream)?;
            }
            if output.exists() {
                debug!("output {} exists, skipping run", path.display());
            } else {
                info!("running task for {}", path.display());
                task.run()?;
                if !output.exists() {
                    warn!("task finished without producing {}", path.display());
                }
            }
            Ok(())
        })();

        self.in_progress.lock().unwrap().remove(&path);
        if result.is_ok() {
            self.satisfied.lock().unwrap().insert(path);
        }
        result
    }
}
