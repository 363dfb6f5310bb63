//! Column replacement: overwrite one named column of a primary table with
//! the same-named column from a replacement table, aligned by row key.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::{Dependencies, LocalTarget, Target, Task};
use crate::error::{PipelineError, PipelineResult};
use crate::identity::{derived_name, Identifiable};
use crate::tasks::{read_table, write_table};

/// What to do when the column being replaced does not exist in the
/// destination table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingColumnPolicy {
    /// Reject the replacement as a schema error.
    #[default]
    Error,
    /// Create the column and fill it from the replacement table.
    CreateIfMissing,
}

/// Replaces one column of an upstream table with the same-named column from
/// a second upstream table and writes the full merged result.
///
/// When no explicit output name is given, the output path is a hash of both
/// upstream content identifiers, so identical (table, replacement) pairs
/// always land on the same target and share cache behavior.
pub struct ColumnReplacer {
    table: Arc<dyn Task>,
    replacement: Arc<dyn Task>,
    colname: String,
    savedir: PathBuf,
    outname: Option<String>,
    on_missing: MissingColumnPolicy,
}

impl ColumnReplacer {
    pub fn builder() -> ColumnReplacerBuilder {
        ColumnReplacerBuilder::default()
    }
}

/// Builder for [`ColumnReplacer`]; [`build`](ColumnReplacerBuilder::build)
/// performs the fail-fast configuration check before any I/O can happen.
#[derive(Default)]
pub struct ColumnReplacerBuilder {
    table: Option<Arc<dyn Task>>,
    replacement: Option<Arc<dyn Task>>,
    colname: Option<String>,
    savedir: PathBuf,
    outname: Option<String>,
    on_missing: MissingColumnPolicy,
}

impl ColumnReplacerBuilder {
    /// The primary upstream table, read in full.
    pub fn table(mut self, task: Arc<dyn Task>) -> Self {
        self.table = Some(task);
        self
    }

    /// The upstream table supplying the replacement column.
    pub fn replacement(mut self, task: Arc<dyn Task>) -> Self {
        self.replacement = Some(task);
        self
    }

    /// Name of the column to replace.
    pub fn colname(mut self, name: impl Into<String>) -> Self {
        self.colname = Some(name.into());
        self
    }

    /// Output directory; defaults to the current working directory.
    pub fn savedir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.savedir = dir.into();
        self
    }

    /// Explicit output filename, overriding the hash-derived default.
    pub fn outname(mut self, name: impl Into<String>) -> Self {
        self.outname = Some(name.into());
        self
    }

    pub fn on_missing(mut self, policy: MissingColumnPolicy) -> Self {
        self.on_missing = policy;
        self
    }

    pub fn build(self) -> PipelineResult<ColumnReplacer> {
        let (table, replacement) = match (self.table, self.replacement) {
            (Some(table), Some(replacement)) => (table, replacement),
            _ => {
                return Err(PipelineError::config(
                    "column replacement requires both a table and a replacement dependency",
                ))
            }
        };
        let colname = self
            .colname
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PipelineError::config("column replacement requires a column name"))?;
        Ok(ColumnReplacer {
            table,
            replacement,
            colname,
            savedir: self.savedir,
            outname: self.outname,
            on_missing: self.on_missing,
        })
    }
}

impl Task for ColumnReplacer {
    fn requires(&self) -> Dependencies {
        let mut deps: HashMap<String, Arc<dyn Task>> = HashMap::new();
        deps.insert("table".to_string(), Arc::clone(&self.table));
        deps.insert("replacement".to_string(), Arc::clone(&self.replacement));
        Dependencies::Named(deps)
    }

    fn output(&self) -> Box<dyn Target> {
        let name = match &self.outname {
            Some(name) => name.clone(),
            None => derived_name(&[&self.table.identity(), &self.replacement.identity()]),
        };
        Box::new(LocalTarget::new(self.savedir.join(name)))
    }

    fn run(&self) -> PipelineResult<()> {
        let mut table = read_table(self.table.as_ref(), None)?;
        let projection = vec![self.colname.clone()];
        let replacement = read_table(self.replacement.as_ref(), Some(&projection))?;
        debug!(
            "replacing column {} in {} from {}",
            self.colname,
            self.table.identity().name(),
            self.replacement.identity().name()
        );
        table.replace_column(
            &self.colname,
            &replacement,
            self.on_missing == MissingColumnPolicy::CreateIfMissing,
        )?;
        write_table(self, &table)
    }
}
