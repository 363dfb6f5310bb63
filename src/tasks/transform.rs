//! Single-source transforms that apply a user-supplied column-rewriting
//! function to the columns of interest of one upstream table.

use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::engine::{Dependencies, LocalTarget, Target, Task};
use crate::error::{PipelineError, PipelineResult};
use crate::table::Table;
use crate::tasks::{read_upstream_table, write_table, AuxColumns, ColumnProjecting, ColumnSpec};

/// A column-rewriting function. Receives the table (restricted to the row
/// key and the columns of interest), the primary column name, and the
/// auxiliary columns, and mutates the table in place.
pub type TransformFn =
    Arc<dyn Fn(&mut Table, &str, AuxColumns<'_>) -> PipelineResult<()> + Send + Sync>;

/// Applies a function to the primary column(s) of interest of a single
/// upstream table and writes the full result.
///
/// The function is trusted with the table's mutation surface; the only
/// structural check afterwards is that the primary column still exists. A
/// schema-breaking function is surfaced as an error, not corrected.
pub struct FunctionApplyingTransform {
    upstream: Arc<dyn Task>,
    columns: ColumnSpec,
    savedir: PathBuf,
    outname: String,
    func: TransformFn,
}

impl FunctionApplyingTransform {
    /// Configure a transform of `upstream`'s table. `savedir` defaults to
    /// the current working directory.
    pub fn new(
        upstream: Arc<dyn Task>,
        columns: impl Into<ColumnSpec>,
        outname: impl Into<String>,
        func: TransformFn,
    ) -> PipelineResult<Self> {
        let columns = columns.into();
        columns.validate()?;
        let outname = outname.into();
        if outname.is_empty() {
            return Err(PipelineError::config("outname must not be empty"));
        }
        Ok(Self {
            upstream,
            columns,
            savedir: PathBuf::new(),
            outname,
            func,
        })
    }

    pub fn with_savedir(mut self, savedir: impl Into<PathBuf>) -> Self {
        self.savedir = savedir.into();
        self
    }
}

impl ColumnProjecting for FunctionApplyingTransform {
    fn columns_of_interest(&self) -> &ColumnSpec {
        &self.columns
    }
}

impl Task for FunctionApplyingTransform {
    fn requires(&self) -> Dependencies {
        Dependencies::Single(Arc::clone(&self.upstream))
    }

    fn output(&self) -> Box<dyn Target> {
        Box::new(LocalTarget::new(self.savedir.join(&self.outname)))
    }

    fn run(&self) -> PipelineResult<()> {
        let mut table = read_upstream_table(self)?;
        debug!(
            "applying function to column {} of {} rows",
            self.primary_column(),
            table.len()
        );
        (self.func)(&mut table, self.primary_column(), self.columns.auxiliary_arg())?;
        if !table.has_column(self.primary_column()) {
            return Err(PipelineError::schema(format!(
                "transform function dropped the primary column {}",
                self.primary_column()
            )));
        }
        write_table(self, &table)
    }
}
