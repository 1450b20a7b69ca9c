//! Streaming tarball extraction into a private directory.

use std::fs::{self, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nodeprov_core::error::{ProvisionError, Result};
use tar::EntryType;

use crate::archive::{check_no_symlink_ancestor, open_archive, safe_join};

/// Extract `archive_path` under `root`, one entry at a time.
///
/// Directories, regular files, symlinks and hard links are materialised;
/// other entry types are skipped. Returns the number of entries written.
pub fn extract_tar(archive_path: &Path, root: &Path) -> Result<usize> {
    let mut archive = open_archive(archive_path)?;
    let entries = archive.entries().map_err(ProvisionError::io(archive_path))?;
    let reject = |reason: String| ProvisionError::invalid_source(archive_path, reason);

    let mut written = 0;
    let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();

    for entry in entries {
        let mut entry = entry.map_err(ProvisionError::io(archive_path))?;
        let name = entry
            .path()
            .map_err(ProvisionError::io(archive_path))?
            .into_owned();
        let Some(target) = safe_join(root, &name).map_err(reject)? else {
            continue;
        };
        check_no_symlink_ancestor(root, &target).map_err(reject)?;
        let mode = entry.header().mode().unwrap_or(0o644) & 0o7777;

        match entry.header().entry_type() {
            EntryType::Directory => {
                remove_non_dir(&target)?;
                fs::create_dir_all(&target).map_err(ProvisionError::io(&target))?;
                dir_modes.push((target, mode));
            }
            EntryType::Regular | EntryType::Continuous => {
                ensure_parent(&target)?;
                remove_non_dir(&target)?;
                let mut file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .mode(mode)
                    .open(&target)
                    .map_err(ProvisionError::io(&target))?;
                io::copy(&mut entry, &mut file).map_err(ProvisionError::io(&target))?;
                fs::set_permissions(&target, Permissions::from_mode(mode))
                    .map_err(ProvisionError::io(&target))?;
            }
            EntryType::Symlink => {
                let link = link_name(&entry, archive_path)?;
                ensure_parent(&target)?;
                remove_non_dir(&target)?;
                std::os::unix::fs::symlink(&link, &target).map_err(ProvisionError::io(&target))?;
            }
            EntryType::Link => {
                let link = link_name(&entry, archive_path)?;
                let Some(source) = safe_join(root, &link).map_err(reject)? else {
                    return Err(reject(format!("hard link to archive root: {}", name.display())));
                };
                check_no_symlink_ancestor(root, &source).map_err(reject)?;
                ensure_parent(&target)?;
                remove_non_dir(&target)?;
                fs::hard_link(&source, &target).map_err(ProvisionError::io(&target))?;
            }
            other => {
                tracing::debug!(entry = %name.display(), kind = ?other, "Skipping tar entry");
                continue;
            }
        }
        written += 1;
    }

    // Deepest first so restrictive modes don't block earlier children.
    for (dir, mode) in dir_modes.into_iter().rev() {
        match fs::symlink_metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            _ => continue,
        }
        fs::set_permissions(&dir, Permissions::from_mode(mode)).map_err(ProvisionError::io(&dir))?;
    }

    tracing::debug!(archive = %archive_path.display(), entries = written, "Extracted tarball");
    Ok(written)
}

fn link_name<R: io::Read>(entry: &tar::Entry<'_, R>, archive_path: &Path) -> Result<PathBuf> {
    entry
        .link_name()
        .map_err(ProvisionError::io(archive_path))?
        .map(|l| l.into_owned())
        .ok_or_else(|| ProvisionError::invalid_source(archive_path, "link entry without target"))
}

fn ensure_parent(target: &Path) -> Result<()> {
    match target.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(ProvisionError::io(parent)),
        None => Ok(()),
    }
}

fn remove_non_dir(target: &Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(target).map_err(ProvisionError::io(target)),
        _ => Ok(()),
    }
}
