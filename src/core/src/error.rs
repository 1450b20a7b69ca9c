use std::path::{Path, PathBuf};

use thiserror::Error;

/// nodeprov error types
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Container or record name failed the character allow-list
    #[error("Invalid {kind} name: {name}")]
    InvalidName { kind: &'static str, name: String },

    /// Import source is missing, of the wrong type, or not a usable root filesystem
    #[error("Invalid import source {source_path}: {reason}")]
    InvalidSource { source_path: String, reason: String },

    /// Filesystem failure, always tagged with the offending path
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registry or network failure during manifest/blob fetch
    #[error("Pull error: {reference} - {message}")]
    Pull { reference: String, message: String },

    /// A mutation needs a key (network, tag) that is not present
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// A raw value could not be coerced into the field's type
    #[error("Cannot parse '{value}' for {field}: {reason}")]
    Parse {
        field: String,
        value: String,
        reason: String,
    },

    /// Named entity does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Named entity already exists
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// Another import holds the container lock
    #[error("Container is busy (another import is running): {0}")]
    ContainerBusy(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ProvisionError {
    /// Build a `map_err` adapter that tags an I/O error with `path`.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| ProvisionError::Io { path, source }
    }

    pub fn invalid_source(source_path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        ProvisionError::InvalidSource {
            source_path: source_path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_yaml::Error> for ProvisionError {
    fn from(err: serde_yaml::Error) -> Self {
        ProvisionError::Serialization(err.to_string())
    }
}

/// Result type alias for nodeprov operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_display() {
        let error = ProvisionError::InvalidName {
            kind: "container",
            name: "../etc".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid container name: ../etc");
    }

    #[test]
    fn test_invalid_source_display() {
        let error = ProvisionError::invalid_source("/srv/rootfs", "missing bin/sh");
        assert_eq!(
            error.to_string(),
            "Invalid import source /srv/rootfs: missing bin/sh"
        );
    }

    #[test]
    fn test_io_helper_keeps_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = ProvisionError::io("/var/lib/x")(io_error);
        assert!(matches!(error, ProvisionError::Io { .. }));
        let msg = error.to_string();
        assert!(msg.contains("/var/lib/x"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_pull_error_display() {
        let error = ProvisionError::Pull {
            reference: "docker.io/library/rocky:9".to_string(),
            message: "manifest unknown".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Pull error: docker.io/library/rocky:9 - manifest unknown"
        );
    }

    #[test]
    fn test_parse_error_display() {
        let error = ProvisionError::Parse {
            field: "discoverable".to_string(),
            value: "maybe".to_string(),
            reason: "not a boolean".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Cannot parse 'maybe' for discoverable: not a boolean"
        );
    }

    #[test]
    fn test_not_found_display() {
        let error = ProvisionError::NotFound {
            kind: "profile",
            name: "compute".to_string(),
        };
        assert_eq!(error.to_string(), "profile not found: compute");
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let error: ProvisionError = result.unwrap_err().into();
        assert!(matches!(error, ProvisionError::Serialization(_)));
    }
}
