//! Apply image layers onto a root filesystem.
//!
//! Layers are applied in manifest order. Whiteout entries delete content
//! from earlier layers: `.wh.<name>` removes `<name>`, and `.wh..wh..opq`
//! empties its directory of everything this layer did not itself write.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use nodeprov_core::error::{ProvisionError, Result};

use crate::archive::{check_no_symlink_ancestor, open_archive, safe_join};

const WHITEOUT_PREFIX: &str = ".wh.";
const OPAQUE_WHITEOUT: &str = ".wh..wh..opq";

/// Unpack one layer blob onto `rootfs`.
pub fn apply_layer(layer: &Path, rootfs: &Path) -> Result<()> {
    let mut archive = open_archive(layer)?;
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.set_preserve_ownerships(unsafe { libc::geteuid() } == 0);
    archive.set_unpack_xattrs(false);

    let reject = |reason: String| ProvisionError::invalid_source(layer, reason);
    let mut written: HashSet<PathBuf> = HashSet::new();

    for entry in archive.entries().map_err(ProvisionError::io(layer))? {
        let mut entry = entry.map_err(ProvisionError::io(layer))?;
        let name = entry.path().map_err(ProvisionError::io(layer))?.into_owned();
        let Some(target) = safe_join(rootfs, &name).map_err(reject)? else {
            continue;
        };
        check_no_symlink_ancestor(rootfs, &target).map_err(reject)?;
        let relative = target.strip_prefix(rootfs).unwrap_or(&target).to_path_buf();

        let file_name = relative
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if file_name == OPAQUE_WHITEOUT {
            let dir = target.parent().unwrap_or(rootfs);
            let dir_relative = relative.parent().unwrap_or(Path::new(""));
            clear_opaque_dir(dir, dir_relative, &written)?;
            continue;
        }
        if let Some(hidden) = file_name.strip_prefix(WHITEOUT_PREFIX) {
            let victim = whiteout_victim(rootfs, &relative, hidden).map_err(reject)?;
            tracing::debug!(path = %victim.display(), "Applying whiteout");
            remove_path(&victim)?;
            continue;
        }

        replace_mismatched(&target, entry.header().entry_type().is_dir())?;
        entry.unpack_in(rootfs).map_err(ProvisionError::io(&target))?;
        written.insert(relative);
    }

    tracing::debug!(layer = %layer.display(), entries = written.len(), "Applied layer");
    Ok(())
}

/// Path a `.wh.<hidden>` entry at `relative` deletes.
fn whiteout_victim(
    rootfs: &Path,
    relative: &Path,
    hidden: &str,
) -> std::result::Result<PathBuf, String> {
    if hidden.is_empty() || hidden == "." || hidden == ".." || hidden.contains('/') {
        return Err(format!("invalid whiteout entry: {}", relative.display()));
    }
    let parent = relative.parent().unwrap_or(Path::new(""));
    let Some(victim) = safe_join(rootfs, &parent.join(hidden))? else {
        return Err(format!("whiteout names the layer root: {}", relative.display()));
    };
    check_no_symlink_ancestor(rootfs, &victim)?;
    Ok(victim)
}

/// Remove children of `dir` that no entry of the current layer wrote.
fn clear_opaque_dir(dir: &Path, dir_relative: &Path, written: &HashSet<PathBuf>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ProvisionError::io(dir)(e)),
    };
    for entry in entries {
        let entry = entry.map_err(ProvisionError::io(dir))?;
        let child = dir_relative.join(entry.file_name());
        if written.iter().any(|w| w.starts_with(&child)) {
            continue;
        }
        remove_path(&entry.path())?;
    }
    tracing::debug!(dir = %dir.display(), "Applied opaque whiteout");
    Ok(())
}

fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(ProvisionError::io(path)),
        Ok(_) => fs::remove_file(path).map_err(ProvisionError::io(path)),
        Err(_) => Ok(()),
    }
}

/// A layer may replace a directory with a file or the reverse.
fn replace_mismatched(target: &Path, entry_is_dir: bool) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() != entry_is_dir => remove_path(target),
        _ => Ok(()),
    }
}
