//! Registry import against an in-memory blob source.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nodeprov_core::error::{ProvisionError, Result};
use nodeprov_runtime::{
    BlobRef, BlobSource, ContainerStore, ImageReference, ImportOptions, Importer, ManifestInfo,
};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

struct CountingSource {
    manifest: ManifestInfo,
    blobs: HashMap<String, Vec<u8>>,
    manifest_fetches: AtomicUsize,
    blob_fetches: AtomicUsize,
}

#[async_trait]
impl BlobSource for CountingSource {
    async fn fetch_manifest(&self, _reference: &ImageReference) -> Result<ManifestInfo> {
        self.manifest_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.manifest.clone())
    }

    async fn fetch_blob(&self, reference: &ImageReference, blob: &BlobRef) -> Result<Vec<u8>> {
        self.blob_fetches.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .get(&blob.digest)
            .cloned()
            .ok_or_else(|| ProvisionError::Pull {
                reference: reference.to_string(),
                message: format!("blob unknown to registry: {}", blob.digest),
            })
    }
}

fn digest_of(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

fn gzip_layer(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o755);
        header.set_uid(0);
        header.set_gid(0);
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    let tar = builder.into_inner().unwrap();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

fn blob(data: &[u8], media_type: &str) -> BlobRef {
    BlobRef {
        media_type: media_type.to_string(),
        digest: digest_of(data),
        size: data.len() as i64,
    }
}

fn image_source() -> CountingSource {
    let config = br#"{"architecture":"amd64","os":"linux"}"#.to_vec();
    let base = gzip_layer(&[("bin/sh", b"#!shell"), ("etc/os-release", b"ID=rocky")]);
    let top = gzip_layer(&[("etc/os-release", b"ID=rocky\nVERSION=9"), ("etc/.wh.motd", b"")]);

    let layer_type = "application/vnd.oci.image.layer.v1.tar+gzip";
    let manifest = ManifestInfo {
        digest: digest_of(b"manifest"),
        config: blob(&config, "application/vnd.oci.image.config.v1+json"),
        layers: vec![blob(&base, layer_type), blob(&top, layer_type)],
    };
    let blobs = [config, base, top]
        .into_iter()
        .map(|data| (digest_of(&data), data))
        .collect();

    CountingSource {
        manifest,
        blobs,
        manifest_fetches: AtomicUsize::new(0),
        blob_fetches: AtomicUsize::new(0),
    }
}

fn importer(tmp: &TempDir, source: CountingSource) -> Importer<CountingSource> {
    Importer::with_source(
        ContainerStore::new(tmp.path().join("chroots")),
        tmp.path().join("state/oci/blobs"),
        source,
    )
    .with_pull_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_import_docker_unpacks_layers_in_order() {
    let tmp = TempDir::new().unwrap();
    let importer = importer(&tmp, image_source());

    let report = importer
        .import_docker("docker://ghcr.io/example/rocky:9", "rocky-9", ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.rootfs, tmp.path().join("chroots/rocky-9"));
    assert_eq!(report.image_id, Some(digest_of(b"manifest")));
    assert_eq!(
        std::fs::read_to_string(report.rootfs.join("etc/os-release")).unwrap(),
        "ID=rocky\nVERSION=9"
    );
    assert!(report.rootfs.join("bin/sh").is_file());
    assert!(!report.rootfs.join("etc/.wh.motd").exists());
    assert!(tmp.path().join("state/oci/blobs/sha256").is_dir());
    assert_eq!(importer.source().blob_fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_reimport_reuses_cached_blobs() {
    let tmp = TempDir::new().unwrap();
    let importer = importer(&tmp, image_source());
    let uri = "docker://ghcr.io/example/rocky:9";

    importer
        .import_docker(uri, "rocky-9", ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(importer.source().blob_fetches.load(Ordering::SeqCst), 3);

    let force = ImportOptions {
        force: true,
        ..Default::default()
    };
    importer.import_docker(uri, "rocky-9", force).await.unwrap();
    importer
        .import_docker(uri, "rocky-9-copy", ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(importer.source().blob_fetches.load(Ordering::SeqCst), 3);
    assert!(importer.source().manifest_fetches.load(Ordering::SeqCst) >= 3);
    assert!(tmp.path().join("chroots/rocky-9-copy/bin/sh").is_file());
}

#[tokio::test]
async fn test_import_docker_invalid_name() {
    let tmp = TempDir::new().unwrap();
    let importer = importer(&tmp, image_source());

    let err = importer
        .import_docker("docker://rocky", "bad/name", ImportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::InvalidName { .. }));
    assert_eq!(importer.source().manifest_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_blob_is_pull_error() {
    let tmp = TempDir::new().unwrap();
    let mut source = image_source();
    source.blobs.clear();
    let importer = importer(&tmp, source);

    let err = importer
        .import_docker("docker://rocky", "rocky", ImportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Pull { .. }));
}

#[tokio::test]
async fn test_import_dispatches_on_uri() {
    let tmp = TempDir::new().unwrap();
    let importer = importer(&tmp, image_source());

    let report = importer
        .import("docker://ghcr.io/example/rocky:9", "rocky", ImportOptions::default())
        .await
        .unwrap();
    assert!(report.image_id.is_some());

    let src = report.rootfs.clone();
    let copy = importer
        .import(src.to_str().unwrap(), "rocky-copy", ImportOptions::default())
        .await
        .unwrap();
    assert!(copy.image_id.is_none());
    assert!(copy.rootfs.join("bin/sh").is_file());
}
