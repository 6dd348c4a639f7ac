//! Per-request scratch directory.
//!
//! A [`Workspace`] owns a uniquely named directory under the configured
//! root:
//!
//! ```text
//! {root}/mineru-job-XXXXXX/
//!   ├─ input.pdf
//!   └─ output/          (engine writes here)
//! ```
//!
//! The directory is a [`TempDir`], so it is removed when the workspace is
//! dropped, including while unwinding from a panic. [`Workspace::close`] is
//! the normal exit: it removes the tree explicitly so a deletion failure can
//! be logged, then swallows it.

use crate::error::WorkerError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "mineru-job-";

const INPUT_FILE: &str = "input.pdf";
const OUTPUT_DIR: &str = "output";

/// Scratch space owned by exactly one in-flight job.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    input_path: PathBuf,
    output_dir: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace (and its `output/` subdirectory) under `root`.
    ///
    /// `root` is created if it does not exist yet.
    pub fn create(root: &Path) -> Result<Self, WorkerError> {
        let wrap = |source| WorkerError::Workspace {
            path: root.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(root).map_err(wrap)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(wrap)?;

        let input_path = dir.path().join(INPUT_FILE);
        let output_dir = dir.path().join(OUTPUT_DIR);
        // On failure `dir` is dropped here and takes the half-built tree with it.
        std::fs::create_dir(&output_dir).map_err(wrap)?;

        debug!("Created workspace {}", dir.path().display());
        Ok(Self {
            dir,
            input_path,
            output_dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Fixed location of the materialised PDF.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Directory handed to the engine.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the decoded PDF to [`input_path`](Self::input_path).
    pub async fn write_input(&self, bytes: &[u8]) -> Result<(), WorkerError> {
        tokio::fs::write(&self.input_path, bytes)
            .await
            .map_err(|source| WorkerError::Workspace {
                path: self.input_path.clone(),
                source,
            })
    }

    /// Remove the workspace. Deletion errors are logged, never returned.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed workspace {}", path.display()),
            Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_lays_out_input_and_output() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();

        assert!(ws.path().starts_with(root.path()));
        assert!(ws
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORKSPACE_PREFIX));
        assert!(ws.output_dir().is_dir());
        assert_eq!(ws.input_path(), ws.path().join("input.pdf"));
        assert!(!ws.input_path().exists());
    }

    #[test]
    fn two_workspaces_never_collide() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path()).unwrap();
        let b = Workspace::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b/c");
        let ws = Workspace::create(&nested).unwrap();
        assert!(ws.path().starts_with(&nested));
    }

    #[tokio::test]
    async fn close_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        ws.write_input(b"%PDF-1.4").await.unwrap();
        std::fs::create_dir_all(ws.output_dir().join("deep/nested")).unwrap();
        std::fs::write(ws.output_dir().join("deep/nested/x.md"), "x").unwrap();

        let path = ws.path().to_path_buf();
        ws.close();
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn drop_also_removes_the_tree() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = Workspace::create(root.path()).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn unusable_root_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("occupied");
        std::fs::write(&file, "not a directory").unwrap();

        let err = Workspace::create(&file).unwrap_err();
        assert!(matches!(err, WorkerError::Workspace { .. }), "{err:?}");
    }
}
