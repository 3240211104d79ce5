//! Create-temp-then-rename file installation
//!
//! A [`StagedFile`] is written next to its destination so the final rename
//! stays on one filesystem and readers only ever see the old or the new
//! contents. Dropping a staged file without installing it removes it.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Contents written to a temporary sibling of `target`, not yet installed
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Write `contents` to a fresh temporary file in `target`'s directory
    pub fn new(target: impl AsRef<Path>, contents: &[u8]) -> std::io::Result<Self> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = match target.file_name() {
            Some(name) => format!(".{}.", name.to_string_lossy()),
            None => ".multicerti.".to_string(),
        };

        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }

        tracing::debug!("📝 Staged {} at {}", target.display(), file.path().display());
        Ok(Self { file, target })
    }

    /// Where the staged contents currently live
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Final destination
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically move the staged file onto its destination
    pub fn install(self) -> std::io::Result<()> {
        self.file
            .persist(&self.target)
            .map_err(|err| err.error)?;
        tracing::debug!("💾 Installed {}", self.target.display());
        Ok(())
    }
}

/// Stage and immediately install `contents` at `target`
pub fn write_atomic(target: impl AsRef<Path>, contents: &[u8]) -> std::io::Result<()> {
    StagedFile::new(target, contents)?.install()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_file_is_a_sibling() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nginx.conf");
        let staged = StagedFile::new(&target, b"events {}\n").unwrap();

        assert_eq!(staged.path().parent(), Some(tmp.path()));
        assert_eq!(staged.target(), target.as_path());
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"events {}\n");
        assert!(!target.exists());
    }

    #[test]
    fn test_install_replaces_target() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nginx.conf");
        std::fs::write(&target, "old").unwrap();

        let staged = StagedFile::new(&target, b"new").unwrap();
        let staged_path = staged.path().to_path_buf();
        staged.install().unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
        assert!(!staged_path.exists());
    }

    #[test]
    fn test_dropped_stage_leaves_target_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nginx.conf");
        std::fs::write(&target, "old").unwrap();

        let staged = StagedFile::new(&target, b"new").unwrap();
        let staged_path = staged.path().to_path_buf();
        drop(staged);

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
        assert!(!staged_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_installed_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("multicerti.conf");
        write_atomic(&target, b"{}").unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
