//! Effective configuration of a node.
//!
//! Scalars and sequences: an explicit node value wins, then an explicit
//! profile value, then a default (an `Entry::Default` at either level, then
//! the configured fallback). Maps (network devices, tags) are a key union:
//! node keys shadow profile keys of the same name wholesale.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::NodeDefaults;
use crate::entry::{Entry, EntryValue};
use crate::record::{NetDev, Node, Profile, RecordConfig, TagMap};

/// Where an effective value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Node,
    Profile(String),
    Default,
    Unset,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Node => write!(f, "node"),
            Source::Profile(name) => write!(f, "profile:{name}"),
            Source::Default => write!(f, "default"),
            Source::Unset => write!(f, "--"),
        }
    }
}

/// An effective value and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: Source,
}

/// A network device after resolution. Sub-fields are never merged across levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveNetDev {
    pub device: String,
    pub kind: String,
    pub netmask: String,
    pub gateway: String,
    pub on_boot: bool,
    pub primary: bool,
    pub tags: BTreeMap<String, String>,
}

/// Fully resolved configuration of one node.
#[derive(Debug, Clone)]
pub struct EffectiveNode {
    pub id: String,
    pub profile: Option<String>,
    pub comment: Resolved<String>,
    pub cluster_name: Resolved<String>,
    pub container_name: Resolved<String>,
    pub ipxe: Resolved<String>,
    pub kernel_override: Resolved<String>,
    pub kernel_args: Resolved<String>,
    pub init: Resolved<String>,
    pub root: Resolved<String>,
    pub asset_key: Resolved<String>,
    pub runtime_overlay: Resolved<Vec<String>>,
    pub system_overlay: Resolved<Vec<String>>,
    pub ipmi_netmask: Resolved<String>,
    pub ipmi_port: Resolved<String>,
    pub ipmi_gateway: Resolved<String>,
    pub ipmi_username: Resolved<String>,
    pub ipmi_password: Resolved<String>,
    pub ipmi_interface: Resolved<String>,
    pub ipmi_write: Resolved<bool>,
    pub discoverable: Resolved<bool>,
    pub netdevs: BTreeMap<String, Resolved<EffectiveNetDev>>,
    pub tags: BTreeMap<String, Resolved<String>>,
}

impl EffectiveNode {
    /// Flattened `(field, value, source)` rows for display.
    pub fn rows(&self) -> Vec<(String, String, Source)> {
        fn row<T: ToString>(name: &str, r: &Resolved<T>) -> (String, String, Source) {
            (name.to_string(), r.value.to_string(), r.source.clone())
        }
        fn list_row(name: &str, r: &Resolved<Vec<String>>) -> (String, String, Source) {
            (name.to_string(), r.value.join(","), r.source.clone())
        }

        let mut rows = vec![
            ("Profile".to_string(), self.profile.clone().unwrap_or_default(), Source::Node),
            row("Comment", &self.comment),
            row("Cluster", &self.cluster_name),
            row("Container", &self.container_name),
            row("Ipxe", &self.ipxe),
            row("KernelOverride", &self.kernel_override),
            row("KernelArgs", &self.kernel_args),
            row("Init", &self.init),
            row("Root", &self.root),
            row("AssetKey", &self.asset_key),
            list_row("RuntimeOverlay", &self.runtime_overlay),
            list_row("SystemOverlay", &self.system_overlay),
            row("IpmiNetmask", &self.ipmi_netmask),
            row("IpmiPort", &self.ipmi_port),
            row("IpmiGateway", &self.ipmi_gateway),
            row("IpmiUserName", &self.ipmi_username),
            row("IpmiInterface", &self.ipmi_interface),
            row("IpmiWrite", &self.ipmi_write),
            row("Discoverable", &self.discoverable),
        ];
        for (key, tag) in &self.tags {
            rows.push((format!("Tag[{key}]"), tag.value.clone(), tag.source.clone()));
        }
        for (name, nd) in &self.netdevs {
            let v = &nd.value;
            let src = &nd.source;
            rows.push((format!("{name}:DEVICE"), v.device.clone(), src.clone()));
            rows.push((format!("{name}:TYPE"), v.kind.clone(), src.clone()));
            rows.push((format!("{name}:NETMASK"), v.netmask.clone(), src.clone()));
            rows.push((format!("{name}:GATEWAY"), v.gateway.clone(), src.clone()));
            rows.push((format!("{name}:ONBOOT"), v.on_boot.to_string(), src.clone()));
            rows.push((format!("{name}:PRIMARY"), v.primary.to_string(), src.clone()));
            for (key, value) in &v.tags {
                rows.push((format!("{name}:TAG[{key}]"), value.clone(), src.clone()));
            }
        }
        rows
    }
}

/// Resolve one field.
pub fn resolve_entry<T: EntryValue>(
    node: &Entry<T>,
    profile: Option<(&str, &Entry<T>)>,
    fallback: Option<T>,
) -> Resolved<T> {
    if let Entry::Set(v) = node {
        return Resolved {
            value: v.clone(),
            source: Source::Node,
        };
    }
    if let Some((name, Entry::Set(v))) = profile {
        return Resolved {
            value: v.clone(),
            source: Source::Profile(name.to_string()),
        };
    }
    let system_default = node
        .value()
        .or_else(|| profile.and_then(|(_, e)| e.value()))
        .cloned()
        .or(fallback);
    match system_default {
        Some(value) => Resolved {
            value,
            source: Source::Default,
        },
        None => Resolved {
            value: T::default(),
            source: Source::Unset,
        },
    }
}

/// Compute the effective configuration of `node` under `profile`.
pub fn resolve_node(node: &Node, profile: Option<&Profile>, defaults: &NodeDefaults) -> EffectiveNode {
    let n = &node.config;
    let p: Option<(&str, &RecordConfig)> = profile.map(|p| (p.id.as_str(), &p.config));

    macro_rules! field {
        ($($path:ident).+) => {
            field!($($path).+, None)
        };
        ($($path:ident).+, $fallback:expr) => {
            resolve_entry(&n.$($path).+, p.map(|(name, c)| (name, &c.$($path).+)), $fallback)
        };
    }

    EffectiveNode {
        id: node.id.clone(),
        profile: node.profile.clone(),
        comment: field!(comment),
        cluster_name: field!(cluster_name),
        container_name: field!(container_name),
        ipxe: field!(ipxe, Some(defaults.ipxe.clone())),
        kernel_override: field!(kernel.override_version),
        kernel_args: field!(kernel.args, Some(defaults.kernel_args.clone())),
        init: field!(init, Some(defaults.init.clone())),
        root: field!(root, Some(defaults.root.clone())),
        asset_key: field!(asset_key),
        runtime_overlay: field!(runtime_overlay),
        system_overlay: field!(system_overlay),
        ipmi_netmask: field!(ipmi.netmask),
        ipmi_port: field!(ipmi.port, Some(defaults.ipmi_port.clone())),
        ipmi_gateway: field!(ipmi.gateway),
        ipmi_username: field!(ipmi.username),
        ipmi_password: field!(ipmi.password),
        ipmi_interface: field!(ipmi.interface, Some(defaults.ipmi_interface.clone())),
        ipmi_write: field!(ipmi.write),
        discoverable: field!(discoverable),
        netdevs: resolve_netdevs(n, p, defaults),
        tags: resolve_tags(&n.tags, p.map(|(name, c)| (name, &c.tags))),
    }
}

fn resolve_netdevs(
    node: &RecordConfig,
    profile: Option<(&str, &RecordConfig)>,
    defaults: &NodeDefaults,
) -> BTreeMap<String, Resolved<EffectiveNetDev>> {
    let mut out = BTreeMap::new();
    if let Some((name, config)) = profile {
        for (net, nd) in &config.netdevs {
            out.insert(
                net.clone(),
                Resolved {
                    value: effective_netdev(nd, defaults),
                    source: Source::Profile(name.to_string()),
                },
            );
        }
    }
    for (net, nd) in &node.netdevs {
        out.insert(
            net.clone(),
            Resolved {
                value: effective_netdev(nd, defaults),
                source: Source::Node,
            },
        );
    }
    out
}

fn effective_netdev(nd: &NetDev, defaults: &NodeDefaults) -> EffectiveNetDev {
    EffectiveNetDev {
        device: nd.device.get(),
        kind: nd
            .kind
            .value()
            .cloned()
            .unwrap_or_else(|| defaults.netdev_type.clone()),
        netmask: nd.netmask.get(),
        gateway: nd.gateway.get(),
        on_boot: nd.on_boot.get(),
        primary: nd.primary.get(),
        tags: nd
            .tags
            .iter()
            .filter_map(|(k, v)| v.value().map(|v| (k.clone(), v.clone())))
            .collect(),
    }
}

fn resolve_tags(node: &TagMap, profile: Option<(&str, &TagMap)>) -> BTreeMap<String, Resolved<String>> {
    let mut out = BTreeMap::new();
    if let Some((name, tags)) = profile {
        for (key, entry) in tags.iter() {
            if let Some(value) = entry.value() {
                out.insert(
                    key.clone(),
                    Resolved {
                        value: value.clone(),
                        source: Source::Profile(name.to_string()),
                    },
                );
            }
        }
    }
    for (key, entry) in node.iter() {
        if let Some(value) = entry.value() {
            out.insert(
                key.clone(),
                Resolved {
                    value: value.clone(),
                    source: Source::Node,
                },
            );
        }
    }
    out
}
