//! Tarball import end to end.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nodeprov_core::error::ProvisionError;
use nodeprov_runtime::{ContainerStore, ImportOptions, Importer, PullContext, RegistryClient};
use tempfile::TempDir;

const SCRATCH_PREFIX: &str = ".nodeprov-tarfiles-";

fn importer(tmp: &TempDir) -> Importer {
    Importer::with_source(
        ContainerStore::new(tmp.path().join("chroots")),
        tmp.path().join("blobs"),
        RegistryClient::new(&PullContext::default()),
    )
    .with_tmp_dir(tmp.path().join("scratch"))
}

fn scratch_dirs(tmp: &TempDir) -> Vec<PathBuf> {
    match fs::read_dir(tmp.path().join("scratch")) {
        Ok(entries) => entries
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(SCRATCH_PREFIX))
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn write_rootfs_tar(path: &Path, with_shell: bool) {
    let mut builder = tar::Builder::new(Vec::new());

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_mode(0o755);
    header.set_size(0);
    header.set_cksum();
    builder.append_data(&mut header, "a/", std::io::empty()).unwrap();

    let mut header = tar::Header::new_gnu();
    header.set_mode(0o644);
    header.set_size(1);
    header.set_cksum();
    builder.append_data(&mut header, "a/f", &b"x"[..]).unwrap();

    if with_shell {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o755);
        header.set_size(5);
        header.set_cksum();
        builder.append_data(&mut header, "bin/sh", &b"shell"[..]).unwrap();
    }

    fs::write(path, builder.into_inner().unwrap()).unwrap();
}

#[test]
fn test_tar_import_success_cleans_scratch() {
    let tmp = TempDir::new().unwrap();
    let tarball = tmp.path().join("rootfs.tar");
    write_rootfs_tar(&tarball, true);
    let importer = importer(&tmp);

    let report = importer
        .import_tar(&tarball, "tiny", ImportOptions::default())
        .unwrap();

    assert_eq!(fs::read(report.rootfs.join("a/f")).unwrap(), b"x");
    let mode = fs::metadata(report.rootfs.join("a/f")).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
    assert!(scratch_dirs(&tmp).is_empty());
}

#[test]
fn test_tar_import_without_shell_cleans_scratch() {
    let tmp = TempDir::new().unwrap();
    let tarball = tmp.path().join("rootfs.tar");
    write_rootfs_tar(&tarball, false);
    let importer = importer(&tmp);

    let err = importer
        .import_tar(&tarball, "tiny", ImportOptions::default())
        .unwrap_err();

    assert!(matches!(err, ProvisionError::InvalidSource { .. }));
    assert!(scratch_dirs(&tmp).is_empty());
    assert!(!importer.store().rootfs_dir("tiny").exists());
}

#[test]
fn test_unreadable_archive_cleans_scratch() {
    let tmp = TempDir::new().unwrap();
    let tarball = tmp.path().join("garbage.tar.gz");
    // Valid gzip magic, truncated stream.
    fs::write(&tarball, [0x1f, 0x8b, 0x08, 0x00, 0x01]).unwrap();
    let importer = importer(&tmp);

    assert!(importer
        .import_tar(&tarball, "tiny", ImportOptions::default())
        .is_err());
    assert!(scratch_dirs(&tmp).is_empty());
}

#[test]
fn test_tar_import_into_populated_container_refused_early() {
    let tmp = TempDir::new().unwrap();
    let tarball = tmp.path().join("rootfs.tar");
    write_rootfs_tar(&tarball, true);
    let importer = importer(&tmp);

    importer
        .import_tar(&tarball, "tiny", ImportOptions::default())
        .unwrap();
    let err = importer
        .import_tar(&tarball, "tiny", ImportOptions::default())
        .unwrap_err();
    assert!(matches!(err, ProvisionError::AlreadyExists { .. }));
    assert!(scratch_dirs(&tmp).is_empty());
}
