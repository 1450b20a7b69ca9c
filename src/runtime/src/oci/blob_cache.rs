//! Content-addressed blob cache shared by every registry import.
//!
//! Blobs live at `<dir>/sha256/<hex>` and are verified before they are
//! renamed into place, so a present file is always a complete, correct blob.

use std::path::{Path, PathBuf};

use nodeprov_core::error::{ProvisionError, Result};
use sha2::{Digest, Sha256};

pub struct BlobCache {
    dir: PathBuf,
}

impl BlobCache {
    /// Open (creating if needed) the cache at `dir`.
    pub fn new(dir: &Path) -> Result<Self> {
        let algo_dir = dir.join("sha256");
        std::fs::create_dir_all(&algo_dir).map_err(ProvisionError::io(&algo_dir))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a blob with `digest` is stored at.
    pub fn path_for(&self, digest: &str) -> Result<PathBuf> {
        let hex = sha256_hex(digest)?;
        Ok(self.dir.join("sha256").join(hex))
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.path_for(digest).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Verify `data` against `digest` and store it atomically.
    pub fn put(&self, digest: &str, data: &[u8]) -> Result<PathBuf> {
        let expected = sha256_hex(digest)?;
        let actual = hex::encode(Sha256::digest(data));
        if actual != expected {
            return Err(ProvisionError::Pull {
                reference: digest.to_string(),
                message: format!("digest mismatch: content hashes to sha256:{}", actual),
            });
        }

        let path = self.path_for(digest)?;
        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&tmp_path, data).map_err(ProvisionError::io(&tmp_path))?;
        std::fs::rename(&tmp_path, &path).map_err(ProvisionError::io(&path))?;

        tracing::debug!(digest = %digest, size = data.len(), "Cached blob");
        Ok(path)
    }
}

/// Hex part of a `sha256:<64 hex>` digest.
fn sha256_hex(digest: &str) -> Result<&str> {
    let unsupported = |message: &str| ProvisionError::Pull {
        reference: digest.to_string(),
        message: message.to_string(),
    };
    let hex = digest
        .strip_prefix("sha256:")
        .ok_or_else(|| unsupported("unsupported digest algorithm"))?;
    if hex.len() != 64 || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(unsupported("malformed sha256 digest"));
    }
    Ok(hex)
}
