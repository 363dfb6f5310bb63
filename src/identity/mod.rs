//! # Table Identity
//!
//! Stable, human-readable names and content identifiers for table-producing
//! tasks, used wherever a deterministic output filename is needed.
//!
//! Both are pure functions of the task's configured output path, never of
//! file contents or memory addresses, so they survive process restarts and
//! keep cache behavior reproducible. The flip side is aliasing: two distinct
//! tasks whose outputs share a display name share a content id, and default
//! names derived from them will collide.

use sha2::{Digest, Sha256};

use crate::engine::Task;

/// Display name and content identifier of a table-producing task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdentity {
    name: String,
    content_id: String,
}

impl TableIdentity {
    /// Derive the identity from a task's output path: the display name is
    /// the path with directory and extension stripped, the content id is
    /// the hex SHA-256 digest of that name.
    pub fn of<T: Task + ?Sized>(task: &T) -> Self {
        let output = task.output();
        let name = output
            .path()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_id = hex_digest(&name);
        Self { name, content_id }
    }

    /// Human-readable name: the output's base filename without extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex-encoded hash of the display name.
    pub fn content_id(&self) -> &str {
        &self.content_id
    }
}

/// Blanket capability: every task has a derivable identity.
pub trait Identifiable {
    fn identity(&self) -> TableIdentity;
}

impl<T: Task + ?Sized> Identifiable for T {
    fn identity(&self) -> TableIdentity {
        TableIdentity::of(self)
    }
}

/// Deterministic default output name for a task derived from several
/// upstreams: the hex digest of their concatenated content ids, in order.
pub fn derived_name(upstreams: &[&TableIdentity]) -> String {
    let mut joined = String::new();
    for identity in upstreams {
        joined.push_str(identity.content_id());
    }
    hex_digest(&joined)
}

fn hex_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Dependencies, LocalTarget, Target};
    use crate::error::PipelineResult;

    struct FixedOutput(&'static str);

    impl Task for FixedOutput {
        fn requires(&self) -> Dependencies {
            Dependencies::None
        }

        fn output(&self) -> Box<dyn Target> {
            Box::new(LocalTarget::new(self.0))
        }

        fn run(&self) -> PipelineResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_name_strips_directory_and_extension() {
        let identity = FixedOutput("data/raw/students.csv").identity();
        assert_eq!(identity.name(), "students");
    }

    #[test]
    fn test_content_id_is_stable_and_path_derived() {
        let a = FixedOutput("a/students.csv").identity();
        let b = FixedOutput("b/students.txt").identity();
        // Same display name, regardless of directory or extension.
        assert_eq!(a.content_id(), b.content_id());
        assert_eq!(a.content_id().len(), 64);
        assert!(a.content_id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identity_through_trait_object() {
        use std::sync::Arc;

        let task: Arc<dyn Task> = Arc::new(FixedOutput("data/students.csv"));
        let by_ref = task.as_ref().identity();
        assert_eq!(by_ref.name(), "students");
        assert_eq!(by_ref, TableIdentity::of(task.as_ref()));
    }

    #[test]
    fn test_derived_name_changes_with_either_upstream() {
        let t = FixedOutput("students.csv").identity();
        let r = FixedOutput("corrections.csv").identity();
        let other = FixedOutput("amendments.csv").identity();

        let base = derived_name(&[&t, &r]);
        assert_eq!(base, derived_name(&[&t, &r]));
        assert_ne!(base, derived_name(&[&t, &other]));
        assert_ne!(base, derived_name(&[&r, &t])); // order matters
    }
}
