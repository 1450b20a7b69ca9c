//! Tar stream helpers shared by tarball import and layer unpacking.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use nodeprov_core::error::{ProvisionError, Result};

/// Compression detected from the first bytes of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    pub fn detect(magic: &[u8]) -> Self {
        if magic.starts_with(&[0x1f, 0x8b]) {
            Compression::Gzip
        } else if magic.starts_with(b"BZh") {
            Compression::Bzip2
        } else if magic.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Compression::Xz
        } else if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Open `path` as a tar archive, transparently decompressing it.
pub fn open_archive(path: &Path) -> Result<tar::Archive<Box<dyn Read>>> {
    let file = File::open(path).map_err(ProvisionError::io(path))?;
    let mut reader = BufReader::new(file);
    let compression = Compression::detect(reader.fill_buf().map_err(ProvisionError::io(path))?);
    tracing::debug!(path = %path.display(), ?compression, "Opening archive");

    let stream: Box<dyn Read> = match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        Compression::Zstd => {
            return Err(ProvisionError::invalid_source(
                path,
                "zstd-compressed archives are not supported",
            ))
        }
    };
    Ok(tar::Archive::new(stream))
}

/// Join an archive entry name onto `root`, refusing to leave it.
///
/// Leading `/` and `.` components are dropped; `..` is an error. Returns
/// `None` for names that resolve to `root` itself.
pub fn safe_join(root: &Path, name: &Path) -> std::result::Result<Option<PathBuf>, String> {
    let mut relative = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(format!("entry escapes extraction root: {}", name.display()))
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(root.join(relative)))
}

/// Fail if any directory between `root` and `target` is a symlink.
pub fn check_no_symlink_ancestor(root: &Path, target: &Path) -> std::result::Result<(), String> {
    let Ok(relative) = target.strip_prefix(root) else {
        return Err(format!("{} is outside {}", target.display(), root.display()));
    };
    let mut current = root.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(format!(
                    "refusing to write through symlink {}",
                    current.display()
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_detect() {
        assert_eq!(Compression::detect(&[0x1f, 0x8b, 0x08]), Compression::Gzip);
        assert_eq!(Compression::detect(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(
            Compression::detect(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00, 0x00]),
            Compression::Xz
        );
        assert_eq!(Compression::detect(&[0x28, 0xb5, 0x2f, 0xfd]), Compression::Zstd);
        assert_eq!(Compression::detect(b"etc/"), Compression::None);
        assert_eq!(Compression::detect(&[]), Compression::None);
    }

    #[test]
    fn test_safe_join() {
        let root = Path::new("/tmp/x");
        assert_eq!(
            safe_join(root, Path::new("./etc/hosts")).unwrap(),
            Some(PathBuf::from("/tmp/x/etc/hosts"))
        );
        assert_eq!(
            safe_join(root, Path::new("/usr/bin")).unwrap(),
            Some(PathBuf::from("/tmp/x/usr/bin"))
        );
        assert_eq!(safe_join(root, Path::new("./")).unwrap(), None);
        assert!(safe_join(root, Path::new("../etc/passwd")).is_err());
        assert!(safe_join(root, Path::new("a/../../b")).is_err());
    }

    #[test]
    fn test_symlink_ancestor_refused() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("real")).unwrap();
        std::os::unix::fs::symlink("/etc", tmp.path().join("link")).unwrap();

        assert!(check_no_symlink_ancestor(tmp.path(), &tmp.path().join("real/file")).is_ok());
        assert!(check_no_symlink_ancestor(tmp.path(), &tmp.path().join("link/passwd")).is_err());
        // The final component itself may be a symlink being replaced.
        assert!(check_no_symlink_ancestor(tmp.path(), &tmp.path().join("link")).is_ok());
    }

    #[test]
    fn test_open_gzip_and_plain() {
        let tmp = TempDir::new().unwrap();
        let mut data = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut data);
            let mut header = tar::Header::new_gnu();
            header.set_size(1);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, "f", &b"x"[..]).unwrap();
            builder.finish().unwrap();
        }

        let plain = tmp.path().join("plain.tar");
        std::fs::write(&plain, &data).unwrap();
        let gz = tmp.path().join("layer.tar.gz");
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&gz).unwrap(), flate2::Compression::default());
        encoder.write_all(&data).unwrap();
        encoder.finish().unwrap();

        for path in [&plain, &gz] {
            let mut archive = open_archive(path).unwrap();
            let names: Vec<String> = archive
                .entries()
                .unwrap()
                .map(|e| e.unwrap().path().unwrap().display().to_string())
                .collect();
            assert_eq!(names, vec!["f"]);
        }
    }

    #[test]
    fn test_zstd_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image.tar.zst");
        std::fs::write(&path, [0x28, 0xb5, 0x2f, 0xfd, 0, 0, 0]).unwrap();
        assert!(matches!(
            open_archive(&path),
            Err(ProvisionError::InvalidSource { .. })
        ));
    }
}
