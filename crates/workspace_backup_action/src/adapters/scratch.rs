use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SCRATCH_DIR_PREFIX: &str = "workspace-backup";

/// Per-run local working directory.
pub trait ScratchSpace {
    fn path(&self) -> &Path;

    /// Removes the directory and everything in it. A directory that was never
    /// created is not an error.
    fn cleanup(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalScratchDir {
    path: PathBuf,
}

impl LocalScratchDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<root>/workspace-backup-<pid>`
    pub fn under(root: &Path) -> Self {
        Self::new(root.join(format!("{SCRATCH_DIR_PREFIX}-{}", std::process::id())))
    }
}

impl ScratchSpace for LocalScratchDir {
    fn path(&self) -> &Path {
        &self.path
    }

    fn cleanup(&self) -> Result<(), String> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(format!(
                "failed to remove scratch directory {}: {error}",
                self.path.display()
            )),
        }
    }
}
