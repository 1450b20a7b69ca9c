//! Registry import path: references, credentials, blob cache, pull, unpack.

pub mod auth;
pub mod blob_cache;
pub mod puller;
pub mod reference;
pub mod source;
pub mod unpack;

pub use auth::{PullContext, RegistryAuth};
pub use blob_cache::BlobCache;
pub use puller::{PullSummary, Puller};
pub use reference::{ImageReference, DOCKER_SCHEME};
pub use source::{BlobRef, BlobSource, ManifestInfo, RegistryClient};
pub use unpack::apply_layer;
