//! Named-pipe feedback rendezvous
//!
//! The importer writes structured feedback to a FIFO rather than to its
//! stdout. Opening our read end blocks until the importer opens the write
//! end, and vice versa, which makes the first open the run's startup
//! barrier: neither side proceeds until both are attached.

use anyhow::{Context, Result};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An owner-only FIFO in a private temporary directory. The directory
/// (and the pipe with it) is removed when the value is dropped.
pub struct FeedbackPipe {
    path: PathBuf,
    _dir: TempDir,
}

impl FeedbackPipe {
    /// Create the FIFO with mode 0600.
    pub fn create() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temporary FIFO directory")?;
        let path = dir.path().join("feedback.pipe");

        mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR)
            .with_context(|| format!("could not create the temporary FIFO at {}", path.display()))?;

        Ok(Self { path, _dir: dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the read end. Blocks until a writer attaches.
    pub fn open_read(&self) -> Result<File> {
        File::open(&self.path)
            .with_context(|| format!("failed to open feedback FIFO {}", self.path.display()))
    }
}
