//! Run-scoped local scratch space.
//!
//! Stages materialize files locally before uploading them. Each stage
//! invocation gets its own [`ScratchDir`], named after its [`RunId`], so two
//! runs never share intermediate files. The directory is removed when the
//! handle is dropped, which covers success, schema failures and I/O failures
//! alike.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::id::RunId;

/// A temporary directory owned by one stage run.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Creates a scratch directory for `run_id`.
    ///
    /// When `root` is `None` the system temp directory is used.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn create(root: Option<&Path>, run_id: RunId) -> Result<Self> {
        let prefix = format!("brewlake-{run_id}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    Error::io(format!("create scratch root {}", root.display()), e)
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::io("create scratch directory", e))?;

        tracing::debug!(run_id = %run_id, path = %dir.path().display(), "created scratch directory");
        Ok(Self { dir })
    }

    /// Returns the scratch directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Resolves a relative path inside the scratch directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `relative` is absolute or escapes the
    /// directory via `..`.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe || relative.as_os_str().is_empty() {
            return Err(Error::InvalidInput(format!(
                "scratch path must be relative and stay inside the run directory: {}",
                relative.display()
            )));
        }
        Ok(self.dir.path().join(relative))
    }

    /// Creates (or truncates) a file inside the scratch directory, creating
    /// parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the file cannot be created.
    pub fn create_file(&self, relative: impl AsRef<Path>) -> Result<(PathBuf, File)> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("create {}", parent.display()), e))?;
        }
        let file =
            File::create(&path).map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        Ok((path, file))
    }

    /// Writes `data` to a file inside the scratch directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the write fails.
    pub fn write(&self, relative: impl AsRef<Path>, data: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("create {}", parent.display()), e))?;
        }
        std::fs::write(&path, data)
            .map_err(|e| Error::io(format!("write {}", path.display()), e))?;
        Ok(path)
    }

    /// Reads back a file previously materialized in this directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn read(&self, path: &Path) -> Result<Bytes> {
        std::fs::read(path)
            .map(Bytes::from)
            .map_err(|e| Error::io(format!("read {}", path.display()), e))
    }

    /// Removes the directory now, reporting any cleanup error.
    ///
    /// Dropping the handle also removes it, but silently.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if removal fails.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| Error::io(format!("remove scratch directory {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn scratch_dir_is_named_after_run_and_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let run_id = RunId::generate();
        let scratch = ScratchDir::create(Some(root.path()), run_id).unwrap();

        let path = scratch.path().to_path_buf();
        assert!(path.starts_with(root.path()));
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .contains(&run_id.to_string())
        );

        scratch.write("ca/breweries_ca.parquet", b"data").unwrap();
        assert!(path.join("ca/breweries_ca.parquet").exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn two_runs_get_distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchDir::create(Some(root.path()), RunId::generate()).unwrap();
        let b = ScratchDir::create(Some(root.path()), RunId::generate()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn resolve_rejects_escaping_paths() {
        let scratch = ScratchDir::create(None, RunId::generate()).unwrap();
        assert!(scratch.resolve("../outside").is_err());
        assert!(scratch.resolve("/etc/passwd").is_err());
        assert!(scratch.resolve("").is_err());
        assert!(scratch.resolve("ok/file.json").is_ok());
    }

    #[test]
    fn create_file_then_read_back() {
        let scratch = ScratchDir::create(None, RunId::generate()).unwrap();
        let (path, mut file) = scratch.create_file("gold/out.parquet").unwrap();
        file.write_all(b"abc").unwrap();
        drop(file);

        assert_eq!(scratch.read(&path).unwrap(), Bytes::from("abc"));

        let dir = scratch.path().to_path_buf();
        scratch.close().unwrap();
        assert!(!dir.exists());
    }
}
