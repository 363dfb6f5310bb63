//! # tabpipe
//!
//! Task types for building tabular-data transformation pipelines on a
//! dependency-driven execution engine: read source tables, select columns,
//! transform or merge them, and write new tables to deterministic,
//! content-addressably named locations.
//!
//! Tasks declare their upstream dependencies and one output target; an
//! engine (the bundled [`LocalRunner`] or any [`TaskGraphRunner`]) runs each
//! task at most once per invocation and only when its output is missing, so
//! replaying a pipeline whose outputs already exist performs no work.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabpipe::{
//!     ColumnReplacer, LocalRunner, MergeSpec, SourceTable, TableMerger, Task, TaskGraphRunner,
//! };
//!
//! # fn main() -> tabpipe::PipelineResult<()> {
//! let students: Arc<dyn Task> = Arc::new(SourceTable::new("data/students.csv"));
//! let corrections: Arc<dyn Task> = Arc::new(SourceTable::new("data/corrections.csv"));
//!
//! let fixed: Arc<dyn Task> = Arc::new(
//!     ColumnReplacer::builder()
//!         .table(Arc::clone(&students))
//!         .replacement(corrections)
//!         .colname("grade")
//!         .savedir("out")
//!         .build()?,
//! );
//!
//! let merged: Arc<dyn Task> = Arc::new(
//!     TableMerger::new(
//!         vec![MergeSpec::new(students), MergeSpec::new(Arc::clone(&fixed))],
//!         "combined.csv",
//!     )?
//!     .with_savedir("out"),
//! );
//!
//! LocalRunner::new().run_if_needed(&merged)?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod identity;
pub mod table;
pub mod tasks;

pub use engine::{
    Dependencies, LocalRunner, LocalTarget, Target, TargetWriter, Task, TaskGraphRunner,
};
pub use error::{PipelineError, PipelineResult};
pub use identity::{derived_name, Identifiable, TableIdentity};
pub use table::Table;
pub use tasks::{
    read_own_output, read_table, read_upstream_table, single_upstream, write_table, AuxColumns,
    ColumnProjecting, ColumnReplacer, ColumnReplacerBuilder, ColumnSpec, FunctionApplyingTransform,
    MergeSpec, MissingColumnPolicy, SourceTable, TableMerger, TransformFn,
};
