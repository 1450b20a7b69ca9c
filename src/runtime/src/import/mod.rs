//! Image importer: populate a container root filesystem from a registry
//! image, an existing directory, or a tarball.
//!
//! Every strategy validates the container name and takes the per-name lock
//! before touching the target. A failure part-way through ingestion may leave
//! a partially populated root filesystem; re-run with `force` to replace it.

pub mod copy;
pub mod tarball;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nodeprov_core::config::ProvisionConfig;
use nodeprov_core::error::{ProvisionError, Result};

use crate::container::ContainerStore;
use crate::oci::{BlobCache, BlobSource, ImageReference, PullContext, Puller, RegistryClient, DOCKER_SCHEME};

/// Marker every importable root filesystem must contain.
const SHELL_MARKER: &str = "bin/sh";

const TARBALL_TMP_PREFIX: &str = ".nodeprov-tarfiles-";

/// Import source kind, detected from the URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    Registry(String),
    Directory(PathBuf),
    Tarball(PathBuf),
}

impl ImportSource {
    /// `docker://…` is a registry reference, otherwise the path decides.
    pub fn detect(uri: &str) -> Result<Self> {
        if uri.starts_with(DOCKER_SCHEME) {
            return Ok(ImportSource::Registry(uri.to_string()));
        }
        let path = Path::new(uri);
        if path.is_dir() {
            Ok(ImportSource::Directory(path.to_path_buf()))
        } else if path.is_file() {
            Ok(ImportSource::Tarball(path.to_path_buf()))
        } else {
            Err(ProvisionError::invalid_source(
                uri,
                "not a docker:// reference, directory or file",
            ))
        }
    }
}

/// What to do when the target container already has content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Remove the existing root filesystem first
    pub force: bool,
    /// Import on top of the existing root filesystem
    pub update: bool,
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub name: String,
    pub rootfs: PathBuf,
    /// Manifest digest for registry imports
    pub image_id: Option<String>,
}

/// Imports images into a [`ContainerStore`].
pub struct Importer<S: BlobSource = RegistryClient> {
    store: ContainerStore,
    blob_dir: PathBuf,
    tmp_dir: Option<PathBuf>,
    pull_timeout: Duration,
    source: S,
}

impl Importer<RegistryClient> {
    /// Importer wired to the configured paths and a registry client built
    /// from the `NODEPROV_OCI_*` environment.
    pub fn from_config(config: &ProvisionConfig) -> Self {
        let mut importer = Importer::with_source(
            ContainerStore::new(&config.container_root),
            config.blob_cache_dir(),
            RegistryClient::new(&PullContext::from_env()),
        )
        .with_pull_timeout(Duration::from_secs(config.pull_timeout_secs));
        importer.tmp_dir = config.tmp_dir.clone();
        importer
    }
}

impl<S: BlobSource> Importer<S> {
    pub fn with_source(store: ContainerStore, blob_dir: PathBuf, source: S) -> Self {
        Self {
            store,
            blob_dir,
            tmp_dir: None,
            pull_timeout: Duration::from_secs(crate::DEFAULT_PULL_TIMEOUT_SECS),
            source,
        }
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Parent directory for ephemeral tarball extraction.
    pub fn with_tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &ContainerStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Detect the source kind of `uri` and import it as `name`.
    pub async fn import(&self, uri: &str, name: &str, options: ImportOptions) -> Result<ImportReport> {
        match ImportSource::detect(uri)? {
            ImportSource::Registry(reference) => self.import_docker(&reference, name, options).await,
            ImportSource::Directory(dir) => self.import_directory(&dir, name, options),
            ImportSource::Tarball(file) => self.import_tar(&file, name, options),
        }
    }

    /// Pull a registry image into container `name`.
    pub async fn import_docker(
        &self,
        uri: &str,
        name: &str,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        ContainerStore::check_name(name)?;
        let reference = ImageReference::parse(uri)?;
        let _lock = self.store.lock(name)?;
        let rootfs = self.prepare_target(name, options)?;

        let cache = BlobCache::new(&self.blob_dir)?;
        let puller = Puller::new(&self.source, cache, self.pull_timeout);

        tracing::info!(container = %name, reference = %reference, "Importing registry image");
        let image_id = puller.generate_id(&reference).await?;
        let summary = puller.pull(&reference, &rootfs).await?;
        if summary.image_id != image_id {
            tracing::warn!(
                container = %name,
                resolved = %image_id,
                pulled = %summary.image_id,
                "Image changed upstream during import"
            );
        }

        tracing::info!(container = %name, id = %summary.image_id, "Container imported");
        Ok(ImportReport {
            name: name.to_string(),
            rootfs,
            image_id: Some(summary.image_id),
        })
    }

    /// Copy an existing root filesystem directory into container `name`.
    pub fn import_directory(
        &self,
        uri: &Path,
        name: &str,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        ContainerStore::check_name(name)?;
        let _lock = self.store.lock(name)?;
        self.copy_directory(uri, name, options)
    }

    /// Extract a tarball into a private directory and import that.
    ///
    /// The extraction directory is removed on every exit path.
    pub fn import_tar(&self, uri: &Path, name: &str, options: ImportOptions) -> Result<ImportReport> {
        if !uri.is_file() {
            return Err(ProvisionError::invalid_source(uri, "tarball was not found"));
        }
        ContainerStore::check_name(name)?;
        let _lock = self.store.lock(name)?;
        self.check_target(name, options)?;

        tracing::debug!(tarball = %uri.display(), "Creating temporary directory for tarball import");
        let mut builder = tempfile::Builder::new();
        builder.prefix(TARBALL_TMP_PREFIX);
        let scratch = match &self.tmp_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(ProvisionError::io(dir))?;
                builder.tempdir_in(dir).map_err(ProvisionError::io(dir))?
            }
            None => builder.tempdir().map_err(ProvisionError::io(std::env::temp_dir()))?,
        };

        // The copy carries the root directory's mode over to the container.
        std::fs::set_permissions(scratch.path(), std::fs::Permissions::from_mode(0o755))
            .map_err(ProvisionError::io(scratch.path()))?;
        tarball::extract_tar(uri, scratch.path())?;
        let report = self.copy_directory(scratch.path(), name, options).map_err(|e| match e {
            ProvisionError::InvalidSource { reason, .. } => {
                ProvisionError::invalid_source(uri, format!("extracted tarball {}", reason))
            }
            other => other,
        })?;

        let scratch_path = scratch.path().to_path_buf();
        scratch.close().map_err(ProvisionError::io(&scratch_path))?;
        Ok(report)
    }

    /// Directory strategy without locking; the caller holds the lock.
    fn copy_directory(&self, src: &Path, name: &str, options: ImportOptions) -> Result<ImportReport> {
        if !src.is_dir() {
            return Err(ProvisionError::invalid_source(src, "import directory does not exist"));
        }
        check_rootfs_marker(src)?;
        self.check_not_overlapping(src, name)?;
        let rootfs = self.prepare_target(name, options)?;

        tracing::info!(container = %name, source = %src.display(), "Importing directory");
        let copied = copy::copy_tree(src, &rootfs)?;
        tracing::info!(container = %name, entries = copied, "Container imported");

        Ok(ImportReport {
            name: name.to_string(),
            rootfs,
            image_id: None,
        })
    }

    /// The source may neither be the target nor contain it, nor live inside it.
    fn check_not_overlapping(&self, src: &Path, name: &str) -> Result<()> {
        let source = src.canonicalize().map_err(ProvisionError::io(src))?;
        let target = self.store.rootfs_dir(name);
        let target = match target.canonicalize() {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let root = self.store.root();
                match root.canonicalize() {
                    Ok(root) => root.join(name),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(ProvisionError::io(root)(e)),
                }
            }
            Err(e) => return Err(ProvisionError::io(&target)(e)),
        };
        if source.starts_with(&target) || target.starts_with(&source) {
            return Err(ProvisionError::invalid_source(
                src,
                format!("source overlaps the container root filesystem {}", target.display()),
            ));
        }
        Ok(())
    }

    /// Refuse to overwrite a populated container unless asked to.
    fn check_target(&self, name: &str, options: ImportOptions) -> Result<()> {
        let rootfs = self.store.rootfs_dir(name);
        if options.force || options.update || !is_populated(&rootfs)? {
            return Ok(());
        }
        Err(ProvisionError::AlreadyExists {
            kind: "container",
            name: name.to_string(),
        })
    }

    /// Apply the overwrite policy and create the target directory.
    fn prepare_target(&self, name: &str, options: ImportOptions) -> Result<PathBuf> {
        self.check_target(name, options)?;
        let rootfs = self.store.rootfs_dir(name);
        if options.force && rootfs.exists() {
            tracing::info!(container = %name, "Removing existing root filesystem");
            std::fs::remove_dir_all(&rootfs).map_err(ProvisionError::io(&rootfs))?;
        }
        std::fs::create_dir_all(&rootfs).map_err(ProvisionError::io(&rootfs))?;
        Ok(rootfs)
    }
}

fn is_populated(dir: &Path) -> Result<bool> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ProvisionError::io(dir)(e)),
    }
}

/// `bin/sh` must exist as a file or a symlink.
fn check_rootfs_marker(src: &Path) -> Result<()> {
    let marker = src.join(SHELL_MARKER);
    match std::fs::symlink_metadata(&marker) {
        Ok(meta) if meta.is_file() || meta.file_type().is_symlink() => Ok(()),
        _ => Err(ProvisionError::invalid_source(src, "source directory has no /bin/sh")),
    }
}
