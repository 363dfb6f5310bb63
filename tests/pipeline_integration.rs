//! End-to-end pipeline scenarios over temporary directories: replay
//! behavior, merge and replacement semantics, and default output naming.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tabpipe::{
    ColumnReplacer, Dependencies, FunctionApplyingTransform, LocalRunner, MergeSpec, PipelineResult,
    SourceTable, TableMerger, Target, Task, TaskGraphRunner, TransformFn,
};
use tempfile::{tempdir, TempDir};

/// Wraps a task and counts how many times the engine actually runs it.
struct Counted {
    inner: Arc<dyn Task>,
    runs: Arc<AtomicUsize>,
}

impl Counted {
    fn wrap(inner: Arc<dyn Task>) -> (Arc<dyn Task>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let task: Arc<dyn Task> = Arc::new(Counted {
            inner,
            runs: Arc::clone(&runs),
        });
        (task, runs)
    }
}

impl Task for Counted {
    fn requires(&self) -> Dependencies {
        self.inner.requires()
    }

    fn output(&self) -> Box<dyn Target> {
        self.inner.output()
    }

    fn run(&self) -> PipelineResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.inner.run()
    }
}

fn write_source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_three_table_merge_keeps_union_of_keys() -> PipelineResult<()> {
    let dir = tempdir()?;
    let a = write_source(&dir, "a.csv", "id,a\n1,a1\n2,a2\n3,a3\n");
    let b = write_source(&dir, "b.csv", "id,b\n2,b2\n3,b3\n4,b4\n");
    let c = write_source(&dir, "c.csv", "id,c\n3,c3\n4,c4\n5,c5\n");

    let merger: Arc<dyn Task> = Arc::new(
        TableMerger::new(
            vec![
                MergeSpec::new(Arc::new(SourceTable::new(a))),
                MergeSpec::new(Arc::new(SourceTable::new(b))),
                MergeSpec::new(Arc::new(SourceTable::new(c))),
            ],
            "merged.csv",
        )?
        .with_savedir(dir.path()),
    );
    LocalRunner::new().run_if_needed(&merger)?;

    let written = fs::read_to_string(dir.path().join("merged.csv"))?;
    assert_eq!(
        written,
        "id,a,b,c\n\
         1,a1,,\n\
         2,a2,b2,\n\
         3,a3,b3,c3\n\
         4,,b4,c4\n\
         5,,,c5\n"
    );
    Ok(())
}

#[test]
fn test_merge_with_column_subsets_and_join_keys() -> PipelineResult<()> {
    let dir = tempdir()?;
    let people = write_source(&dir, "people.csv", "id,name,dept\n1,ann,d1\n2,bob,d2\n");
    let depts = write_source(
        &dir,
        "depts.csv",
        "code,dept,label,budget\nc1,d1,Physics,9\nc2,d3,History,4\n",
    );

    // Left joins on its `dept` column against the right side's `dept`.
    let merger: Arc<dyn Task> = Arc::new(
        TableMerger::new(
            vec![
                MergeSpec::new(Arc::new(SourceTable::new(people))).with_join_key("dept"),
                MergeSpec::new(Arc::new(SourceTable::new(depts)))
                    .with_columns("label")
                    .with_join_key("dept"),
            ],
            "joined.csv",
        )?
        .with_savedir(dir.path()),
    );
    LocalRunner::new().run_if_needed(&merger)?;

    let written = fs::read_to_string(dir.path().join("joined.csv"))?;
    assert_eq!(
        written,
        "id,name,dept,label\n\
         1,ann,d1,Physics\n\
         2,bob,d2,\n\
         c2,,d3,History\n"
    );
    Ok(())
}

#[test]
fn test_column_replacement_scenario() -> PipelineResult<()> {
    let dir = tempdir()?;
    let table = write_source(&dir, "students.csv", "id,name,grade\n1,ann,A\n2,bob,B\n");
    let replacement = write_source(&dir, "corrections.csv", "id,grade\n1,A+\n3,C\n");

    let replacer: Arc<dyn Task> = Arc::new(
        ColumnReplacer::builder()
            .table(Arc::new(SourceTable::new(table)))
            .replacement(Arc::new(SourceTable::new(replacement)))
            .colname("grade")
            .savedir(dir.path())
            .build()?,
    );
    LocalRunner::new().run_if_needed(&replacer)?;

    // Default output name is hash-derived; resolve it through the task.
    let written = fs::read_to_string(replacer.output().path())?;
    assert_eq!(
        written,
        "id,name,grade\n\
         1,ann,A+\n\
         2,bob,\n"
    );
    Ok(())
}

#[test]
fn test_idempotent_replay_runs_nothing_twice() -> PipelineResult<()> {
    let dir = tempdir()?;
    let students = write_source(&dir, "students.csv", "id,grade\n1,a\n2,b\n");
    let corrections = write_source(&dir, "corrections.csv", "id,grade\n1,c\n");

    let upper: TransformFn = Arc::new(|table, primary, _| {
        table.map_column(primary, |_, cell| {
            *cell = cell.take().map(|v| v.to_uppercase());
        })
    });
    let (scrub, scrub_runs) = Counted::wrap(Arc::new(
        FunctionApplyingTransform::new(
            Arc::new(SourceTable::new(students)),
            "grade",
            "scrubbed.csv",
            upper,
        )?
        .with_savedir(dir.path()),
    ));
    let (replace, replace_runs) = Counted::wrap(Arc::new(
        ColumnReplacer::builder()
            .table(scrub)
            .replacement(Arc::new(SourceTable::new(corrections)))
            .colname("grade")
            .savedir(dir.path())
            .outname("final.csv")
            .build()?,
    ));

    LocalRunner::new().run_if_needed(&replace)?;
    assert_eq!(scrub_runs.load(Ordering::SeqCst), 1);
    assert_eq!(replace_runs.load(Ordering::SeqCst), 1);

    let scrubbed = fs::read_to_string(dir.path().join("scrubbed.csv"))?;
    let finalized = fs::read_to_string(dir.path().join("final.csv"))?;
    assert_eq!(scrubbed, "id,grade\n1,A\n2,B\n");
    assert_eq!(finalized, "id,grade\n1,c\n2,\n");

    // Second invocation: every output exists, so no task runs and every
    // file stays byte-identical.
    LocalRunner::new().run_if_needed(&replace)?;
    assert_eq!(scrub_runs.load(Ordering::SeqCst), 1);
    assert_eq!(replace_runs.load(Ordering::SeqCst), 1);
    assert_eq!(fs::read_to_string(dir.path().join("scrubbed.csv"))?, scrubbed);
    assert_eq!(fs::read_to_string(dir.path().join("final.csv"))?, finalized);
    Ok(())
}

#[test]
fn test_deleted_output_regenerates_only_that_task() -> PipelineResult<()> {
    let dir = tempdir()?;
    let students = write_source(&dir, "students.csv", "id,grade\n1,a\n");

    let noop: TransformFn = Arc::new(|_, _, _| Ok(()));
    let (scrub, scrub_runs) = Counted::wrap(Arc::new(
        FunctionApplyingTransform::new(
            Arc::new(SourceTable::new(students.clone())),
            "grade",
            "scrubbed.csv",
            Arc::clone(&noop),
        )?
        .with_savedir(dir.path()),
    ));
    let (shout, shout_runs) = Counted::wrap(Arc::new(
        FunctionApplyingTransform::new(scrub, "grade", "final.csv", noop)?
            .with_savedir(dir.path()),
    ));

    LocalRunner::new().run_if_needed(&shout)?;
    assert_eq!(scrub_runs.load(Ordering::SeqCst), 1);
    assert_eq!(shout_runs.load(Ordering::SeqCst), 1);

    // Deleting the downstream output re-runs it alone; its upstream output
    // still exists and is reused.
    fs::remove_file(dir.path().join("final.csv"))?;
    LocalRunner::new().run_if_needed(&shout)?;
    assert_eq!(scrub_runs.load(Ordering::SeqCst), 1);
    assert_eq!(shout_runs.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_failed_run_leaves_no_output_and_is_retryable() -> PipelineResult<()> {
    let dir = tempdir()?;
    write_source(&dir, "t.csv", "id,v\n1,x\n");
    let noop: TransformFn = Arc::new(|_, _, _| Ok(()));

    // First attempt points at a column that does not exist.
    let bad = FunctionApplyingTransform::new(
        Arc::new(SourceTable::new(dir.path().join("t.csv"))),
        "missing",
        "out.csv",
        Arc::clone(&noop),
    )?
    .with_savedir(dir.path());
    let task: Arc<dyn Task> = Arc::new(bad);

    assert!(LocalRunner::new().run_if_needed(&task).is_err());
    assert!(!dir.path().join("out.csv").exists());

    // A corrected task targeting the same output succeeds on retry.
    let good: Arc<dyn Task> = Arc::new(
        FunctionApplyingTransform::new(
            Arc::new(SourceTable::new(dir.path().join("t.csv"))),
            "v",
            "out.csv",
            noop,
        )?
        .with_savedir(dir.path()),
    );
    LocalRunner::new().run_if_needed(&good)?;
    assert_eq!(
        fs::read_to_string(dir.path().join("out.csv"))?,
        "id,v\n1,x\n"
    );
    Ok(())
}
