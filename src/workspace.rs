use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};

/// A scratch directory exclusively owned by one pipeline invocation.
///
/// Created before clone, guaranteed to be released on every exit path
/// (success, failure, cancellation) via its `Drop` impl — no caller has to
/// remember to call `release()` on an early return.
pub struct Workspace {
    root: PathBuf,
    keep: bool,
}

impl Workspace {
    /// Acquire a fresh scratch directory under the OS temp area.
    ///
    /// Fatal if the ambient temp area is unwritable — there is no way to run
    /// the pipeline without somewhere to clone into.
    pub fn acquire() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("codescore-")
            .tempdir()
            .map_err(|e| Error::Workspace(format!("failed to create scratch directory: {e}")))?;
        // `into_path` hands ownership to us; we manage removal ourselves in
        // `Drop` so logging happens on the way out, matching the teacher's
        // worktree cleanup idiom of always logging removal.
        let root = dir.into_path();
        info!(path = %root.display(), "acquired workspace");
        Ok(Self { root, keep: false })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Prevent removal on drop. Only used by tests that want to inspect the
    /// scratch directory after the fact.
    #[cfg(test)]
    pub fn keep(mut self) -> (PathBuf, Self) {
        self.keep = true;
        let path = self.root.clone();
        (path, self)
    }

    /// Explicit, eager release. `Drop` calls this too, so this is only
    /// needed when the caller wants to observe removal outcomes.
    pub fn release(&mut self) {
        if self.keep || !self.root.exists() {
            return;
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => info!(path = %self.root.display(), "released workspace"),
            Err(e) => warn!(path = %self.root.display(), error = %e, "failed to release workspace"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}
