//! nodeprov core - configuration model for provisioned cluster nodes.
//!
//! Profiles and nodes are bundles of [`Entry`] fields. A node's effective
//! configuration is computed by the resolver from the node and its profile;
//! "set" operations are expressed as [`SetRequest`]s and applied in batches.

pub mod batch;
pub mod config;
pub mod db;
pub mod entry;
pub mod error;
pub mod mutate;
pub mod name;
pub mod record;
pub mod resolve;

// Re-export commonly used types
pub use batch::{
    apply_to_nodes, apply_to_profiles, commit_changes, commit_confirmed, persist_and_reload,
    AssumeAnswer, Confirm, DaemonReload, RecordStore,
};
pub use config::{NodeDefaults, ProvisionConfig};
pub use db::{NodeDb, Selection};
pub use entry::{parse_flag_bool, Entry, EntryState, EntryValue, UNSET};
pub use error::{ProvisionError, Result};
pub use mutate::{parse_key_value, SetRequest};
pub use name::valid_name;
pub use record::{IpmiConf, KernelConf, NetDev, Node, Profile, RecordConfig, TagMap};
pub use resolve::{resolve_node, EffectiveNetDev, EffectiveNode, Resolved, Source};

/// nodeprov version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
