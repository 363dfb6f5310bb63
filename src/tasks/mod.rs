//! # Pipeline Task Types
//!
//! The domain-specific task types layered on the [`engine`](crate::engine)
//! boundary: external source tables, single-source column transforms, column
//! replacement, and multi-table merges.
//!
//! Shared behavior is expressed as small capability traits composed per task
//! type rather than an inheritance chain: [`ColumnProjecting`] for
//! column-of-interest resolution, [`Identifiable`](crate::identity::Identifiable)
//! for naming. Multi-source tasks simply never carry the column-selection
//! fields.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{Dependencies, Task};
use crate::error::{PipelineError, PipelineResult};
use crate::identity::Identifiable;
use crate::table::Table;

pub mod merge;
pub mod replace;
pub mod source;
pub mod transform;

pub use merge::{MergeSpec, TableMerger};
pub use replace::{ColumnReplacer, ColumnReplacerBuilder, MissingColumnPolicy};
pub use source::SourceTable;
pub use transform::{FunctionApplyingTransform, TransformFn};

/// The column(s) a transform task declares as its functional input. The
/// first name is the primary column; any others are auxiliary columns
/// consumed only by transform-specific logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    /// A single column of interest.
    Single(String),
    /// Primary column first, then auxiliary columns.
    Multi(Vec<String>),
}

impl ColumnSpec {
    /// The primary column of interest.
    pub fn primary(&self) -> &str {
        match self {
            ColumnSpec::Single(name) => name,
            ColumnSpec::Multi(names) => names.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Auxiliary columns, in declaration order.
    pub fn auxiliary(&self) -> &[String] {
        match self {
            ColumnSpec::Single(_) => &[],
            ColumnSpec::Multi(names) => names.get(1..).unwrap_or(&[]),
        }
    }

    /// Auxiliary columns shaped for a transform function: a lone auxiliary
    /// column is passed as a scalar, several as a list. Downstream functions
    /// written against a single grouping column rely on the scalar form.
    pub fn auxiliary_arg(&self) -> AuxColumns<'_> {
        match self.auxiliary() {
            [] => AuxColumns::None,
            [one] => AuxColumns::One(one),
            many => AuxColumns::Many(many),
        }
    }

    /// Every declared column, primary first, deduplicated. The row key is
    /// implied by all read paths and never listed here.
    pub fn columns_to_read(&self) -> Vec<String> {
        let mut cols: Vec<String> = vec![self.primary().to_string()];
        for name in self.auxiliary() {
            if !cols.iter().any(|c| c == name) {
                cols.push(name.clone());
            }
        }
        cols
    }

    pub(crate) fn validate(&self) -> PipelineResult<()> {
        let empty = match self {
            ColumnSpec::Single(name) => name.is_empty(),
            ColumnSpec::Multi(names) => names.is_empty() || names[0].is_empty(),
        };
        if empty {
            return Err(PipelineError::config(
                "colnames must name at least one column",
            ));
        }
        Ok(())
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::Single(name.to_string())
    }
}

impl From<String> for ColumnSpec {
    fn from(name: String) -> Self {
        ColumnSpec::Single(name)
    }
}

impl From<Vec<String>> for ColumnSpec {
    fn from(names: Vec<String>) -> Self {
        ColumnSpec::Multi(names)
    }
}

impl From<&[&str]> for ColumnSpec {
    fn from(names: &[&str]) -> Self {
        ColumnSpec::Multi(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Auxiliary-column argument passed to a transform function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxColumns<'a> {
    /// No auxiliary columns were declared.
    None,
    /// Exactly one auxiliary column.
    One(&'a str),
    /// Two or more auxiliary columns, in declaration order.
    Many(&'a [String]),
}

/// Capability of single-source transform tasks: knowing which columns are
/// of interest and which must be read from storage.
pub trait ColumnProjecting {
    fn columns_of_interest(&self) -> &ColumnSpec;

    /// First name in the columns of interest.
    fn primary_column(&self) -> &str {
        self.columns_of_interest().primary()
    }

    /// Value columns to request when reading from storage; the row key is
    /// added by the read path itself.
    fn columns_to_read(&self) -> Vec<String> {
        self.columns_of_interest().columns_to_read()
    }
}

/// Resolve a dependency declaration that must name exactly one upstream
/// table. Anything else is a wiring mistake and fails fast rather than
/// silently picking an arbitrary upstream.
pub fn single_upstream(deps: &Dependencies) -> PipelineResult<Arc<dyn Task>> {
    match deps {
        Dependencies::Single(task) => Ok(Arc::clone(task)),
        Dependencies::Many(tasks) if tasks.len() == 1 => Ok(Arc::clone(&tasks[0])),
        Dependencies::Many(tasks) => Err(PipelineError::AmbiguousUpstream { found: tasks.len() }),
        Dependencies::Named(tasks) => tasks
            .get("table")
            .map(Arc::clone)
            .ok_or(PipelineError::AmbiguousUpstream { found: tasks.len() }),
        Dependencies::None => Err(PipelineError::AmbiguousUpstream { found: 0 }),
    }
}

/// Read a task's output table, optionally projected to named value columns.
pub fn read_table(task: &dyn Task, projection: Option<&[String]>) -> PipelineResult<Table> {
    let identity = task.identity();
    Table::read_csv(task.output().reader()?, projection, identity.name())
}

/// Read the single upstream table of `task`, restricted to its columns of
/// interest.
pub fn read_upstream_table<T>(task: &T) -> PipelineResult<Table>
where
    T: Task + ColumnProjecting,
{
    let upstream = single_upstream(&task.requires())?;
    read_table(upstream.as_ref(), Some(&task.columns_to_read()))
}

/// Read a task's own already-written output, restricted to the row key and
/// primary column: the task's result rather than its full table.
pub fn read_own_output<T>(task: &T) -> PipelineResult<Table>
where
    T: Task + ColumnProjecting,
{
    let projection = vec![task.primary_column().to_string()];
    read_table(task, Some(&projection))
}

/// Write `table` to `task`'s output target, committing atomically.
pub fn write_table(task: &dyn Task, table: &Table) -> PipelineResult<()> {
    let mut writer = task.output().writer()?;
    table.write_csv(&mut writer)?;
    writer.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{LocalTarget, Target};
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct Stub(PathBuf);

    impl Task for Stub {
        fn requires(&self) -> Dependencies {
            Dependencies::None
        }

        fn output(&self) -> Box<dyn Target> {
            Box::new(LocalTarget::new(&self.0))
        }

        fn run(&self) -> PipelineResult<()> {
            Ok(())
        }
    }

    fn stub(name: &str) -> Arc<dyn Task> {
        Arc::new(Stub(PathBuf::from(name)))
    }

    #[test]
    fn test_columns_to_read_single() {
        let spec = ColumnSpec::from("grade");
        assert_eq!(spec.primary(), "grade");
        assert_eq!(spec.columns_to_read(), ["grade"]);
        assert_eq!(spec.auxiliary_arg(), AuxColumns::None);
    }

    #[test]
    fn test_columns_to_read_dedups_and_keeps_order() {
        let spec = ColumnSpec::from(["grade", "group", "grade", "term"].as_slice());
        assert_eq!(spec.primary(), "grade");
        assert_eq!(spec.columns_to_read(), ["grade", "group", "term"]);
    }

    #[test]
    fn test_single_auxiliary_is_scalar() {
        let spec = ColumnSpec::from(["grade", "group"].as_slice());
        assert_eq!(spec.auxiliary_arg(), AuxColumns::One("group"));

        let spec = ColumnSpec::from(["grade", "group", "term"].as_slice());
        assert!(matches!(spec.auxiliary_arg(), AuxColumns::Many(_)));
    }

    #[test]
    fn test_column_spec_untagged_serde() {
        let single: ColumnSpec = serde_json::from_str("\"grade\"").unwrap();
        assert_eq!(single, ColumnSpec::Single("grade".to_string()));

        let multi: ColumnSpec = serde_json::from_str("[\"grade\",\"group\"]").unwrap();
        assert_eq!(multi.primary(), "grade");
        assert_eq!(multi.auxiliary(), ["group".to_string()]);
    }

    #[test]
    fn test_single_upstream_resolution() {
        assert!(single_upstream(&Dependencies::Single(stub("a"))).is_ok());
        assert!(single_upstream(&Dependencies::Many(vec![stub("a")])).is_ok());

        let err = single_upstream(&Dependencies::Many(vec![stub("a"), stub("b")]))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::AmbiguousUpstream { found: 2 }));

        let err = single_upstream(&Dependencies::None).err().unwrap();
        assert!(matches!(err, PipelineError::AmbiguousUpstream { found: 0 }));

        let mut named = HashMap::new();
        named.insert("table".to_string(), stub("a"));
        assert!(single_upstream(&Dependencies::Named(named)).is_ok());

        let mut named = HashMap::new();
        named.insert("replacement".to_string(), stub("a"));
        assert!(single_upstream(&Dependencies::Named(named)).is_err());
    }
}
