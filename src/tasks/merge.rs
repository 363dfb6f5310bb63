//! Multi-table merging: a left-to-right chain of outer joins over an
//! ordered collection of table specifications.
//!
//! Chaining adjacent pairs rather than attempting one n-way join keeps the
//! join order and per-pair key semantics explicit and debuggable, matching
//! declaration order, at the cost of not sharing scans between entries.

use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::engine::{Dependencies, LocalTarget, Target, Task};
use crate::error::{PipelineError, PipelineResult};
use crate::table::Table;
use crate::tasks::{read_table, write_table, ColumnSpec};

/// One entry of a merge: the task producing the table, an optional column
/// subset to read, and an optional join-key column. An absent join key means
/// the table joins on its row key; absent columns mean a full read.
#[derive(Clone)]
pub struct MergeSpec {
    task: Arc<dyn Task>,
    columns: Option<ColumnSpec>,
    join_key: Option<String>,
}

impl MergeSpec {
    pub fn new(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            columns: None,
            join_key: None,
        }
    }

    /// Restrict the read to these columns (plus the row key and join key).
    pub fn with_columns(mut self, columns: impl Into<ColumnSpec>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    /// Join on this column instead of the row key.
    pub fn with_join_key(mut self, column: impl Into<String>) -> Self {
        self.join_key = Some(column.into());
        self
    }

    /// Value columns to request from storage; `None` reads everything.
    fn projection(&self) -> Option<Vec<String>> {
        let columns = self.columns.as_ref()?;
        let mut wanted = columns.columns_to_read();
        if let Some(key) = &self.join_key {
            if !wanted.iter().any(|c| c == key) {
                wanted.push(key.clone());
            }
        }
        Some(wanted)
    }

    fn read(&self) -> PipelineResult<Table> {
        let projection = self.projection();
        read_table(self.task.as_ref(), projection.as_deref())
    }
}

/// Merges an ordered collection of tables into one via a deterministic left
/// fold of outer joins, carrying each entry's join key into the next step.
pub struct TableMerger {
    specs: Vec<MergeSpec>,
    savedir: PathBuf,
    outname: String,
}

impl TableMerger {
    /// Configure a merge. Fewer than two entries is a configuration error,
    /// raised here before any file is opened.
    pub fn new(specs: Vec<MergeSpec>, outname: impl Into<String>) -> PipelineResult<Self> {
        if specs.len() < 2 {
            return Err(PipelineError::config(format!(
                "need at least two tables to merge, got {}",
                specs.len()
            )));
        }
        for spec in &specs {
            if let Some(columns) = &spec.columns {
                columns.validate()?;
            }
        }
        Ok(Self {
            specs,
            savedir: PathBuf::new(),
            outname: outname.into(),
        })
    }

    pub fn with_savedir(mut self, savedir: impl Into<PathBuf>) -> Self {
        self.savedir = savedir.into();
        self
    }
}

impl Task for TableMerger {
    fn requires(&self) -> Dependencies {
        Dependencies::Many(self.specs.iter().map(|s| Arc::clone(&s.task)).collect())
    }

    fn output(&self) -> Box<dyn Target> {
        Box::new(LocalTarget::new(self.savedir.join(&self.outname)))
    }

    fn run(&self) -> PipelineResult<()> {
        let mut merged = self.specs[0].read()?;
        let mut carried_key = self.specs[0].join_key.clone();

        for spec in &self.specs[1..] {
            let right = spec.read()?;
            debug!(
                "outer join: {} rows x {} rows (left key {:?}, right key {:?})",
                merged.len(),
                right.len(),
                carried_key,
                spec.join_key
            );
            merged = merged.outer_join(&right, carried_key.as_deref(), spec.join_key.as_deref())?;
            carried_key = spec.join_key.clone();
        }

        write_table(self, &merged)
    }
}
