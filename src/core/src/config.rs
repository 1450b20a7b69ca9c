use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV: &str = "NODEPROV_CONFIG";

/// Configuration file used when neither `--config` nor `NODEPROV_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nodeprov/nodeprov.conf";

/// Top-level nodeprov configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Directory holding one root filesystem per container name
    pub container_root: PathBuf,

    /// Local state directory (blob cache lives under `oci/blobs`)
    pub state_dir: PathBuf,

    /// Node database file
    pub node_db: PathBuf,

    /// Parent for ephemeral extraction directories (system temp when unset)
    pub tmp_dir: Option<PathBuf>,

    /// Daemon pid file, signalled on reload
    pub pid_file: PathBuf,

    /// Upper bound for a single registry round-trip, in seconds
    pub pull_timeout_secs: u64,

    /// Log level used when RUST_LOG is not set
    pub log_level: Option<String>,

    /// Documented fallbacks for fields nobody set
    pub defaults: NodeDefaults,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            container_root: PathBuf::from("/var/lib/nodeprov/chroots"),
            state_dir: PathBuf::from("/var/lib/nodeprov"),
            node_db: PathBuf::from("/etc/nodeprov/nodes.yaml"),
            tmp_dir: None,
            pid_file: PathBuf::from("/run/nodeprov.pid"),
            pull_timeout_secs: 600,
            log_level: None,
            defaults: NodeDefaults::default(),
        }
    }
}

impl ProvisionConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ProvisionError::io(path))?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            ProvisionError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration the way the CLI does.
    ///
    /// An explicit path must exist. The default path may be absent, in
    /// which case built-in defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.is_file() {
            Self::from_file(default_path)
        } else {
            tracing::debug!(path = DEFAULT_CONFIG_PATH, "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Shared registry blob cache.
    pub fn blob_cache_dir(&self) -> PathBuf {
        self.state_dir.join("oci").join("blobs")
    }

    fn validate(&self) -> Result<()> {
        if self.container_root.as_os_str().is_empty() {
            return Err(ProvisionError::Config("container_root must not be empty".to_string()));
        }
        if self.pull_timeout_secs == 0 {
            return Err(ProvisionError::Config(
                "pull_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Values the resolver falls back to when neither node nor profile set a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDefaults {
    pub init: String,
    pub root: String,
    pub kernel_args: String,
    pub ipxe: String,
    pub ipmi_port: String,
    pub ipmi_interface: String,
    pub netdev_type: String,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            init: "/sbin/init".to_string(),
            root: "initramfs".to_string(),
            kernel_args: "quiet crashkernel=no vga=791".to_string(),
            ipxe: "default".to_string(),
            ipmi_port: "623".to_string(),
            ipmi_interface: "lan".to_string(),
            netdev_type: "ethernet".to_string(),
        }
    }
}
