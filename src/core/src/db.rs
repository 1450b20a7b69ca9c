//! In-memory node database with YAML persistence.
//!
//! Holds every profile and node for the duration of one command. The file is
//! rewritten atomically (temp file + rename) on [`NodeDb::persist`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::NodeDefaults;
use crate::error::{ProvisionError, Result};
use crate::name::valid_name;
use crate::record::{Node, Profile};
use crate::resolve::{resolve_node, EffectiveNode};

/// On-disk shape of the database.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DbFile {
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    nodes: Vec<Node>,
}

/// Which records a batch operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every record of the kind.
    All,
    /// Exactly these ids, in the given order.
    Named(Vec<String>),
    /// The profile called `default`.
    DefaultProfile,
}

impl Selection {
    /// Selection for a profile command given positional names and `--all`.
    pub fn for_profiles(all: bool, names: &[String]) -> Self {
        if all {
            Selection::All
        } else if names.is_empty() {
            Selection::DefaultProfile
        } else {
            Selection::Named(names.to_vec())
        }
    }
}

/// Profiles and nodes of one cluster.
#[derive(Debug)]
pub struct NodeDb {
    path: PathBuf,
    profiles: BTreeMap<String, Profile>,
    nodes: BTreeMap<String, Node>,
}

impl NodeDb {
    /// Empty database that will persist to `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            profiles: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }

    /// Load from disk. A missing file yields an empty database.
    pub fn load(path: &Path) -> Result<Self> {
        let mut db = Self::new(path);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Node database not found, starting empty");
            return Ok(db);
        }
        let content = std::fs::read_to_string(path).map_err(ProvisionError::io(path))?;
        let file: DbFile = serde_yaml::from_str(&content)?;
        db.profiles = file.profiles.into_iter().map(|p| (p.id.clone(), p)).collect();
        db.nodes = file.nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Ok(db)
    }

    /// Write the database to disk atomically.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(ProvisionError::io(parent))?;
        }
        let file = DbFile {
            profiles: self.profiles.values().cloned().collect(),
            nodes: self.nodes.values().cloned().collect(),
        };
        let data = serde_yaml::to_string(&file)?;
        let tmp_path = self.path.with_extension("yaml.tmp");
        std::fs::write(&tmp_path, data).map_err(ProvisionError::io(&tmp_path))?;
        std::fs::rename(&tmp_path, &self.path).map_err(ProvisionError::io(&self.path))?;
        tracing::info!(path = %self.path.display(), "Persisted node database");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_profile(&mut self, id: &str) -> Result<&mut Profile> {
        check_name("profile", id)?;
        if self.profiles.contains_key(id) {
            return Err(ProvisionError::AlreadyExists {
                kind: "profile",
                name: id.to_string(),
            });
        }
        Ok(self
            .profiles
            .entry(id.to_string())
            .or_insert_with(|| Profile::new(id)))
    }

    /// Delete a profile no node refers to.
    pub fn delete_profile(&mut self, id: &str) -> Result<Profile> {
        if let Some(node) = self.nodes.values().find(|n| n.profile.as_deref() == Some(id)) {
            return Err(ProvisionError::Other(format!(
                "profile {id} is still used by node {}",
                node.id
            )));
        }
        self.profiles.remove(id).ok_or_else(|| ProvisionError::NotFound {
            kind: "profile",
            name: id.to_string(),
        })
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    pub fn profile_mut(&mut self, id: &str) -> Result<&mut Profile> {
        self.profiles.get_mut(id).ok_or_else(|| ProvisionError::NotFound {
            kind: "profile",
            name: id.to_string(),
        })
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    /// Add a node, optionally bound to an existing profile.
    pub fn add_node(&mut self, id: &str, profile: Option<&str>) -> Result<&mut Node> {
        check_name("node", id)?;
        if self.nodes.contains_key(id) {
            return Err(ProvisionError::AlreadyExists {
                kind: "node",
                name: id.to_string(),
            });
        }
        if let Some(p) = profile {
            if !self.profiles.contains_key(p) {
                return Err(ProvisionError::NotFound {
                    kind: "profile",
                    name: p.to_string(),
                });
            }
        }
        let mut node = Node::new(id);
        node.profile = profile.map(str::to_string);
        Ok(self.nodes.entry(id.to_string()).or_insert(node))
    }

    pub fn delete_node(&mut self, id: &str) -> Result<Node> {
        self.nodes.remove(id).ok_or_else(|| ProvisionError::NotFound {
            kind: "node",
            name: id.to_string(),
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or_else(|| ProvisionError::NotFound {
            kind: "node",
            name: id.to_string(),
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Ids of the profiles a selection names. Unknown names are an error.
    pub fn select_profiles(&self, selection: &Selection) -> Result<Vec<String>> {
        select(&self.profiles, selection, "profile")
    }

    /// Ids of the nodes a selection names. Unknown names are an error.
    pub fn select_nodes(&self, selection: &Selection) -> Result<Vec<String>> {
        select(&self.nodes, selection, "node")
    }

    /// Resolve a node against its profile.
    ///
    /// A dangling profile reference resolves as if no profile were set.
    pub fn effective_node(&self, id: &str, defaults: &NodeDefaults) -> Result<EffectiveNode> {
        let node = self.node(id).ok_or_else(|| ProvisionError::NotFound {
            kind: "node",
            name: id.to_string(),
        })?;
        let profile = match node.profile.as_deref() {
            Some(name) => {
                let found = self.profile(name);
                if found.is_none() {
                    tracing::warn!(node = %id, profile = %name, "Node references a missing profile");
                }
                found
            }
            None => None,
        };
        Ok(resolve_node(node, profile, defaults))
    }
}

fn check_name(kind: &'static str, id: &str) -> Result<()> {
    if valid_name(id) {
        Ok(())
    } else {
        Err(ProvisionError::InvalidName {
            kind,
            name: id.to_string(),
        })
    }
}

fn select<T>(
    records: &BTreeMap<String, T>,
    selection: &Selection,
    kind: &'static str,
) -> Result<Vec<String>> {
    let ids: Vec<String> = match selection {
        Selection::All => records.keys().cloned().collect(),
        Selection::DefaultProfile => vec!["default".to_string()],
        Selection::Named(names) => names.clone(),
    };
    for id in &ids {
        if !records.contains_key(id) {
            return Err(ProvisionError::NotFound {
                kind,
                name: id.clone(),
            });
        }
    }
    if ids.is_empty() {
        return Err(ProvisionError::NotFound {
            kind,
            name: "(none selected)".to_string(),
        });
    }
    Ok(ids)
}
