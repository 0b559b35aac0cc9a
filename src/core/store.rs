//! Store abstraction for handover state.
//!
//! A store is a directory holding the SQLite database, the broker audit log
//! and the uploaded attachment copies for one handover workspace.

use std::path::{Path, PathBuf};

/// Name of the workspace marker directory searched for from the working directory.
pub const WORKSPACE_DIR: &str = ".handover";

/// Store handle representing a handover state workspace.
///
/// All subsystem state (projects, checklists, newsletter, ...) is scoped to a store.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory (`<project>/.handover/data`).
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at `<project_root>/.handover/data`.
    pub fn for_project_root(project_root: &Path) -> Self {
        Self::new(project_root.join(WORKSPACE_DIR).join("data"))
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// The `.handover` directory that holds `config.toml`, when the store uses the standard layout.
    pub fn workspace_dir(&self) -> Option<&Path> {
        self.root.parent()
    }
}
