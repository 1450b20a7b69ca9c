//! Where manifests and blobs come from.
//!
//! [`BlobSource`] is the network seam of the puller. [`RegistryClient`]
//! implements it with `oci-distribution`.

use async_trait::async_trait;
use nodeprov_core::error::{ProvisionError, Result};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::manifest::{ImageIndexEntry, OciDescriptor};
use oci_distribution::{Client, Reference};

use super::auth::{PullContext, RegistryAuth};
use super::reference::ImageReference;

/// A content-addressed blob named by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub media_type: String,
    pub digest: String,
    pub size: i64,
}

impl From<&OciDescriptor> for BlobRef {
    fn from(d: &OciDescriptor) -> Self {
        Self {
            media_type: d.media_type.clone(),
            digest: d.digest.clone(),
            size: d.size,
        }
    }
}

/// Image manifest resolved for the host platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInfo {
    /// Manifest digest, the image's stable content identifier
    pub digest: String,
    pub config: BlobRef,
    /// Layers, base first
    pub layers: Vec<BlobRef>,
}

/// Fetches manifests and blobs for an image.
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch_manifest(&self, reference: &ImageReference) -> Result<ManifestInfo>;

    async fn fetch_blob(&self, reference: &ImageReference, blob: &BlobRef) -> Result<Vec<u8>>;
}

/// Registry-backed blob source.
pub struct RegistryClient {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryClient {
    pub fn new(ctx: &PullContext) -> Self {
        let config = ClientConfig {
            protocol: if ctx.plain_http {
                ClientProtocol::Http
            } else {
                ClientProtocol::Https
            },
            accept_invalid_certificates: ctx.insecure,
            platform_resolver: Some(Box::new(linux_platform_resolver)),
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            auth: ctx.auth.clone(),
        }
    }

    fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
        let full = reference.full_reference();
        full.parse::<Reference>().map_err(|e| ProvisionError::Pull {
            reference: full.clone(),
            message: format!("invalid reference: {}", e),
        })
    }
}

#[async_trait]
impl BlobSource for RegistryClient {
    async fn fetch_manifest(&self, reference: &ImageReference) -> Result<ManifestInfo> {
        let oci_ref = Self::to_oci_reference(reference)?;
        let (manifest, digest) = self
            .client
            .pull_image_manifest(&oci_ref, &self.auth.to_oci_auth())
            .await
            .map_err(|e| ProvisionError::Pull {
                reference: reference.to_string(),
                message: format!("failed to pull manifest: {}", e),
            })?;

        Ok(ManifestInfo {
            digest,
            config: BlobRef::from(&manifest.config),
            layers: manifest.layers.iter().map(BlobRef::from).collect(),
        })
    }

    async fn fetch_blob(&self, reference: &ImageReference, blob: &BlobRef) -> Result<Vec<u8>> {
        let oci_ref = Self::to_oci_reference(reference)?;
        let descriptor = OciDescriptor {
            media_type: blob.media_type.clone(),
            digest: blob.digest.clone(),
            size: blob.size,
            ..Default::default()
        };
        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&oci_ref, &descriptor, &mut data)
            .await
            .map_err(|e| ProvisionError::Pull {
                reference: reference.to_string(),
                message: format!("failed to pull blob {}: {}", blob.digest, e),
            })?;
        Ok(data)
    }
}

/// Select the linux image for the host architecture from an index.
fn linux_platform_resolver(manifests: &[ImageIndexEntry]) -> Option<String> {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    manifests
        .iter()
        .find(|entry| {
            entry
                .platform
                .as_ref()
                .map_or(false, |p| p.os == "linux" && p.architecture == arch)
        })
        .map(|entry| entry.digest.clone())
}
