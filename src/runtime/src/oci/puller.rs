//! Registry pull: manifest, cached blobs, ordered layer unpacking.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use nodeprov_core::error::{ProvisionError, Result};

use super::blob_cache::BlobCache;
use super::reference::ImageReference;
use super::source::{BlobSource, ManifestInfo};
use super::unpack::apply_layer;

/// Outcome of a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSummary {
    /// Manifest digest of the pulled image
    pub image_id: String,
    pub layers: usize,
    /// Blobs downloaded (the rest came from the cache)
    pub fetched: usize,
}

/// Pulls images through a [`BlobSource`] into a [`BlobCache`].
pub struct Puller<'a, S: BlobSource + ?Sized> {
    source: &'a S,
    cache: BlobCache,
    timeout: Duration,
}

impl<'a, S: BlobSource + ?Sized> Puller<'a, S> {
    pub fn new(source: &'a S, cache: BlobCache, timeout: Duration) -> Self {
        Self {
            source,
            cache,
            timeout,
        }
    }

    pub fn cache(&self) -> &BlobCache {
        &self.cache
    }

    /// Resolve `reference` to its manifest digest.
    pub async fn generate_id(&self, reference: &ImageReference) -> Result<String> {
        let manifest = self.manifest(reference).await?;
        tracing::debug!(reference = %reference, id = %manifest.digest, "Resolved image id");
        Ok(manifest.digest)
    }

    /// Fetch missing blobs and unpack every layer onto `rootfs`, in order.
    pub async fn pull(&self, reference: &ImageReference, rootfs: &Path) -> Result<PullSummary> {
        let manifest = self.manifest(reference).await?;
        let mut fetched = 0;

        for blob in std::iter::once(&manifest.config).chain(manifest.layers.iter()) {
            if self.cache.contains(&blob.digest) {
                tracing::debug!(digest = %blob.digest, "Blob cache hit");
                continue;
            }
            tracing::debug!(digest = %blob.digest, size = blob.size, "Fetching blob");
            let data = self
                .bounded(
                    format!("fetching {} for {}", blob.digest, reference),
                    self.source.fetch_blob(reference, blob),
                )
                .await?;
            self.cache.put(&blob.digest, &data)?;
            fetched += 1;
        }

        for layer in &manifest.layers {
            let path = self.cache.path_for(&layer.digest)?;
            apply_layer(&path, rootfs)?;
        }

        tracing::info!(
            reference = %reference,
            digest = %manifest.digest,
            layers = manifest.layers.len(),
            fetched,
            "Image pulled"
        );
        Ok(PullSummary {
            image_id: manifest.digest,
            layers: manifest.layers.len(),
            fetched,
        })
    }

    async fn manifest(&self, reference: &ImageReference) -> Result<ManifestInfo> {
        self.bounded(
            format!("fetching manifest for {}", reference),
            self.source.fetch_manifest(reference),
        )
        .await
    }

    async fn bounded<T>(&self, what: String, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProvisionError::Timeout(format!(
                "{} after {}s",
                what,
                self.timeout.as_secs()
            ))),
        }
    }
}
