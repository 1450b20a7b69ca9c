//! Metadata-preserving tree copy with reflink support.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use nodeprov_core::error::{ProvisionError, Result};

#[cfg(target_os = "linux")]
const FICLONE: libc::c_ulong = 0x4004_9409;

/// Copy the contents of `src` into the existing directory `dst`.
///
/// Regular files are cloned when the filesystem supports it and byte-copied
/// otherwise. Symlinks are recreated, not followed. Mode is always kept;
/// ownership and device nodes only when running as root.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    let as_root = unsafe { libc::geteuid() } == 0;
    let mut copied = 0;
    copy_dir_contents(src, dst, as_root, &mut copied)?;
    let meta = fs::metadata(src).map_err(ProvisionError::io(src))?;
    apply_metadata(dst, &meta, as_root)?;
    Ok(copied)
}

fn copy_dir_contents(src: &Path, dst: &Path, as_root: bool, copied: &mut u64) -> Result<()> {
    for entry in fs::read_dir(src).map_err(ProvisionError::io(src))? {
        let entry = entry.map_err(ProvisionError::io(src))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let meta = fs::symlink_metadata(&src_path).map_err(ProvisionError::io(&src_path))?;
        let file_type = meta.file_type();

        if file_type.is_dir() {
            match fs::symlink_metadata(&dst_path) {
                Ok(existing) if !existing.is_dir() => {
                    fs::remove_file(&dst_path).map_err(ProvisionError::io(&dst_path))?
                }
                _ => {}
            }
            fs::create_dir_all(&dst_path).map_err(ProvisionError::io(&dst_path))?;
            copy_dir_contents(&src_path, &dst_path, as_root, copied)?;
            apply_metadata(&dst_path, &meta, as_root)?;
            continue;
        }

        remove_existing(&dst_path)?;
        if file_type.is_symlink() {
            let target = fs::read_link(&src_path).map_err(ProvisionError::io(&src_path))?;
            std::os::unix::fs::symlink(&target, &dst_path).map_err(ProvisionError::io(&dst_path))?;
            if as_root {
                std::os::unix::fs::lchown(&dst_path, Some(meta.uid()), Some(meta.gid()))
                    .map_err(ProvisionError::io(&dst_path))?;
            }
        } else if file_type.is_file() {
            reflink_or_copy(&src_path, &dst_path).map_err(ProvisionError::io(&dst_path))?;
            apply_metadata(&dst_path, &meta, as_root)?;
        } else if as_root {
            make_node(&dst_path, &meta).map_err(ProvisionError::io(&dst_path))?;
            apply_metadata(&dst_path, &meta, as_root)?;
        } else {
            tracing::debug!(path = %src_path.display(), "Skipping special file (not root)");
            continue;
        }
        *copied += 1;
    }
    Ok(())
}

fn remove_existing(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(ProvisionError::io(path)),
        Ok(_) => fs::remove_file(path).map_err(ProvisionError::io(path)),
        Err(_) => Ok(()),
    }
}

fn apply_metadata(path: &Path, meta: &fs::Metadata, as_root: bool) -> Result<()> {
    if as_root {
        std::os::unix::fs::chown(path, Some(meta.uid()), Some(meta.gid()))
            .map_err(ProvisionError::io(path))?;
    }
    fs::set_permissions(path, Permissions::from_mode(meta.mode() & 0o7777))
        .map_err(ProvisionError::io(path))
}

/// Clone `src` into `dst` with FICLONE, falling back to a byte copy.
fn reflink_or_copy(src: &Path, dst: &Path) -> io::Result<()> {
    let mut source = File::open(src)?;
    let mut target = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)?;

    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        let ret = unsafe { libc::ioctl(target.as_raw_fd(), FICLONE as _, source.as_raw_fd()) };
        if ret == 0 {
            return Ok(());
        }
    }

    io::copy(&mut source, &mut target)?;
    Ok(())
}

fn make_node(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let ret = unsafe { libc::mknod(c_path.as_ptr(), meta.mode() as libc::mode_t, meta.rdev() as libc::dev_t) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
