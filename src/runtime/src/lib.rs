//! nodeprov runtime - container store and image importer.
//!
//! Container root filesystems live under a configured root, one directory
//! per validated name. They are populated from registry images (through a
//! shared, content-addressed blob cache), existing directories, or tarballs.

#![allow(clippy::result_large_err)]

pub mod archive;
pub mod container;
pub mod import;
pub mod oci;

// Re-export common types
pub use container::{valid_name, ContainerLock, ContainerStore};
pub use import::{ImportOptions, ImportReport, ImportSource, Importer};
pub use oci::{BlobCache, BlobRef, BlobSource, ImageReference, ManifestInfo, PullContext, Puller, RegistryAuth, RegistryClient};

/// nodeprov runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default upper bound for a single registry round-trip.
pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 600;
