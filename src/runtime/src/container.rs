//! Container store: one root filesystem directory per container name.
//!
//! The store never creates a container directory implicitly. Importers
//! create it after validation and while holding the per-name lock.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use nodeprov_core::error::{ProvisionError, Result};

pub use nodeprov_core::name::valid_name;

/// Directory of container root filesystems.
#[derive(Debug, Clone)]
pub struct ContainerStore {
    root: PathBuf,
}

impl ContainerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root filesystem directory for `name`. Pure path join, no I/O.
    pub fn rootfs_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Fail with `InvalidName` unless `name` is a safe path segment.
    pub fn check_name(name: &str) -> Result<()> {
        if valid_name(name) {
            Ok(())
        } else {
            Err(ProvisionError::InvalidName {
                kind: "container",
                name: name.to_string(),
            })
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        valid_name(name) && self.rootfs_dir(name).is_dir()
    }

    /// Names of all containers, sorted.
    ///
    /// A missing container root is treated as an empty store.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProvisionError::io(&self.root)(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(ProvisionError::io(&self.root))?;
            let file_type = entry.file_type().map_err(ProvisionError::io(entry.path()))?;
            if !file_type.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if valid_name(name) && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Take the exclusive import lock for `name` without blocking.
    ///
    /// Fails with `ContainerBusy` when another holder has it.
    pub fn lock(&self, name: &str) -> Result<ContainerLock> {
        Self::check_name(name)?;
        std::fs::create_dir_all(&self.root).map_err(ProvisionError::io(&self.root))?;

        let path = self.root.join(format!(".{}.lock", name));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(ProvisionError::io(&path))?;

        file.try_lock_exclusive().map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
            {
                ProvisionError::ContainerBusy(name.to_string())
            } else {
                ProvisionError::io(&path)(e)
            }
        })?;

        tracing::debug!(container = %name, lock = %path.display(), "Acquired container lock");
        Ok(ContainerLock { file, path })
    }
}

/// Held import lock; released on drop.
#[derive(Debug)]
pub struct ContainerLock {
    file: File,
    path: PathBuf,
}

impl ContainerLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ContainerLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(lock = %self.path.display(), error = %e, "Failed to release container lock");
        }
    }
}
