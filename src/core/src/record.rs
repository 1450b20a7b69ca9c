//! Configuration records: profiles, nodes and their nested collections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{ProvisionError, Result};

/// Free-form string tags keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMap(BTreeMap<String, Entry<String>>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `raw`, creating the key on first write.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        if key.is_empty() {
            return Err(ProvisionError::Parse {
                field: "tag".to_string(),
                value: raw.to_string(),
                reason: "empty tag key".to_string(),
            });
        }
        self.0
            .entry(key.to_string())
            .or_default()
            .set(&format!("tag '{key}'"), raw)
    }

    /// Remove `key`; a missing key is an error and leaves the map untouched.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        match self.0.remove(key) {
            Some(_) => Ok(()),
            None => Err(ProvisionError::Resolution(format!(
                "tag key does not exist: {key}"
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Entry<String>> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One network device of a record, keyed by network name in the parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetDev {
    pub device: Entry<String>,
    #[serde(rename = "type")]
    pub kind: Entry<String>,
    pub netmask: Entry<String>,
    pub gateway: Entry<String>,
    pub on_boot: Entry<bool>,
    pub primary: Entry<bool>,
    pub tags: TagMap,
}

/// Kernel selection and arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConf {
    #[serde(rename = "override")]
    pub override_version: Entry<String>,
    pub args: Entry<String>,
}

/// Out-of-band management settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpmiConf {
    pub netmask: Entry<String>,
    pub port: Entry<String>,
    pub gateway: Entry<String>,
    pub username: Entry<String>,
    pub password: Entry<String>,
    pub interface: Entry<String>,
    pub write: Entry<bool>,
}

/// The field bundle shared by profiles and nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub comment: Entry<String>,
    pub cluster_name: Entry<String>,
    pub container_name: Entry<String>,
    pub ipxe: Entry<String>,
    pub kernel: KernelConf,
    pub init: Entry<String>,
    pub root: Entry<String>,
    pub asset_key: Entry<String>,
    pub runtime_overlay: Entry<Vec<String>>,
    pub system_overlay: Entry<Vec<String>>,
    pub ipmi: IpmiConf,
    pub discoverable: Entry<bool>,
    pub netdevs: BTreeMap<String, NetDev>,
    pub tags: TagMap,
}

impl RecordConfig {
    /// Fetch the network device `name`, creating an empty one if absent.
    ///
    /// Every network sub-field mutation goes through here first.
    pub fn netdev_or_create(&mut self, name: &str) -> &mut NetDev {
        self.netdevs.entry(name.to_string()).or_default()
    }

    /// Fetch an existing network device.
    pub fn netdev_mut(&mut self, name: &str) -> Result<&mut NetDev> {
        self.netdevs
            .get_mut(name)
            .ok_or_else(|| ProvisionError::Resolution(format!("network name doesn't exist: {name}")))
    }

    pub fn delete_netdev(&mut self, name: &str) -> Result<()> {
        self.netdevs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProvisionError::Resolution(format!("network name doesn't exist: {name}")))
    }

    /// Set or clear the primary flag on `name`.
    ///
    /// Making a device primary clears the flag on every sibling.
    pub fn set_primary(&mut self, name: &str, primary: bool) {
        if primary {
            for netdev in self.netdevs.values_mut() {
                netdev.primary.set_value(false);
            }
        }
        self.netdev_or_create(name).primary.set_value(primary);
    }

    /// Name of the primary network device, if any.
    pub fn primary_netdev(&self) -> Option<&str> {
        self.netdevs
            .iter()
            .find(|(_, nd)| nd.primary.get())
            .map(|(name, _)| name.as_str())
    }
}

/// A named, reusable bundle of configuration that nodes inherit from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub config: RecordConfig,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: RecordConfig::default(),
        }
    }
}

/// A cluster member, optionally inheriting from one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default)]
    pub config: RecordConfig,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            profile: None,
            config: RecordConfig::default(),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}
