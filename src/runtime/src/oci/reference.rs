//! Registry reference parsing.
//!
//! Accepts `docker://` URIs as used on the command line, e.g.
//! `docker://ghcr.io/hpcng/rocky:9` or `docker://rockylinux`.

use nodeprov_core::error::{ProvisionError, Result};

/// URI scheme that marks a registry import source.
pub const DOCKER_SCHEME: &str = "docker://";

const DEFAULT_REGISTRY: &str = "docker.io";
const DEFAULT_TAG: &str = "latest";

/// Parsed registry image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname, optionally with port
    pub registry: String,
    /// Repository path, `library/` prefixed for Docker Hub short names
    pub repository: String,
    pub tag: Option<String>,
    /// `algorithm:hex` digest
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse a reference, with or without the `docker://` scheme.
    ///
    /// A tag defaults to `latest` unless a digest pins the image.
    pub fn parse(uri: &str) -> Result<Self> {
        let raw = uri.trim();
        let reference = raw.strip_prefix(DOCKER_SCHEME).unwrap_or(raw);
        let invalid = |reason: &str| ProvisionError::invalid_source(uri, reason);

        if reference.is_empty() {
            return Err(invalid("empty image reference"));
        }

        let (name_tag, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                if !digest.contains(':') {
                    return Err(invalid("digest must be algorithm:hex"));
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A colon after the last slash is a tag; before it, a registry port.
        let last_segment_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_segment_start..].rfind(':') {
            Some(pos) => {
                let split = last_segment_start + pos;
                (&name_tag[..split], Some(name_tag[split + 1..].to_string()))
            }
            None => (name_tag, None),
        };
        if tag.as_deref() == Some("") {
            return Err(invalid("empty tag"));
        }

        let (registry, repository) = split_registry(name);
        if repository.is_empty() {
            return Err(invalid("empty repository"));
        }

        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag,
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Canonical `registry/repository[:tag][@digest]` form.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(tag) = &self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_reference())
    }
}

fn split_registry(name: &str) -> (String, String) {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            return (first.to_string(), rest.to_string());
        }
        return (DEFAULT_REGISTRY.to_string(), name.to_string());
    }
    (DEFAULT_REGISTRY.to_string(), format!("library/{}", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_docker_uri_short_name() {
        let r = ImageReference::parse("docker://rockylinux").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/rockylinux");
        assert_eq!(r.tag.as_deref(), Some("latest"));
        assert_eq!(r.digest, None);
    }

    #[test]
    fn test_parse_custom_registry_with_tag() {
        let r = ImageReference::parse("docker://ghcr.io/hpcng/warewulf-rockylinux:8").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.repository, "hpcng/warewulf-rockylinux");
        assert_eq!(r.tag.as_deref(), Some("8"));
        assert_eq!(r.to_string(), "ghcr.io/hpcng/warewulf-rockylinux:8");
    }

    #[test]
    fn test_parse_registry_port_without_tag() {
        let r = ImageReference::parse("localhost:5000/base").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "base");
        assert_eq!(r.tag.as_deref(), Some("latest"));
    }

    #[test]
    fn test_parse_user_repo() {
        let r = ImageReference::parse("myuser/node:v2").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "myuser/node");
        assert_eq!(r.tag.as_deref(), Some("v2"));
    }

    #[test]
    fn test_parse_digest_has_no_default_tag() {
        let digest = format!("sha256:{}", "ab".repeat(32));
        let r = ImageReference::parse(&format!("quay.io/org/img@{digest}")).unwrap();
        assert_eq!(r.tag, None);
        assert_eq!(r.digest.as_deref(), Some(digest.as_str()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(ImageReference::parse("docker://").is_err());
        assert!(ImageReference::parse("img@nodigest").is_err());
        assert!(ImageReference::parse("ghcr.io/").is_err());
        assert!(ImageReference::parse("img:").is_err());
    }
}
