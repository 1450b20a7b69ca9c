//! Declarative "set" requests applied to a record.
//!
//! A [`SetRequest`] is built once (from command-line flags or in code) and
//! applied to each selected record. Application is all-or-nothing per
//! record: mutations run against a copy that replaces the record only when
//! every step succeeded.

use crate::entry::{parse_flag_bool, Entry, UNSET};
use crate::error::{ProvisionError, Result};
use crate::record::RecordConfig;

/// Every mutation a profile/node "set" operation can request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetRequest {
    pub comment: Option<String>,
    pub cluster_name: Option<String>,
    pub container: Option<String>,
    pub ipxe: Option<String>,
    pub kernel_override: Option<String>,
    pub kernel_args: Option<String>,
    pub init: Option<String>,
    pub root: Option<String>,
    pub asset_key: Option<String>,
    pub runtime_overlay: Option<Vec<String>>,
    pub system_overlay: Option<Vec<String>>,
    pub ipmi_netmask: Option<String>,
    pub ipmi_port: Option<String>,
    pub ipmi_gateway: Option<String>,
    pub ipmi_username: Option<String>,
    pub ipmi_password: Option<String>,
    pub ipmi_interface: Option<String>,
    /// Raw yes/no token
    pub ipmi_write: Option<String>,
    pub discoverable: Option<bool>,
    pub netname: Option<String>,
    pub netdev: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    pub net_type: Option<String>,
    /// Raw yes/no token
    pub on_boot: Option<String>,
    /// Raw yes/no token
    pub primary: Option<String>,
    pub netdev_delete: bool,
    pub tags: Vec<(String, String)>,
    pub tag_deletes: Vec<String>,
    pub net_tags: Vec<(String, String)>,
    pub net_tag_deletes: Vec<String>,
}

/// Split a `key=value` argument.
pub fn parse_key_value(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(ProvisionError::Parse {
            field: "tag".to_string(),
            value: raw.to_string(),
            reason: "expected key=value".to_string(),
        }),
    }
}

impl SetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the request touches a network device.
    pub fn touches_netdev(&self) -> bool {
        self.netdev.is_some()
            || self.netmask.is_some()
            || self.gateway.is_some()
            || self.net_type.is_some()
            || self.on_boot.is_some()
            || self.primary.is_some()
            || self.netdev_delete
            || !self.net_tags.is_empty()
            || !self.net_tag_deletes.is_empty()
    }

    /// Apply the request to `config`, replacing it only on full success.
    pub fn apply(&self, record_id: &str, config: &mut RecordConfig) -> Result<()> {
        let mut working = config.clone();
        self.apply_in_place(record_id, &mut working)?;
        *config = working;
        Ok(())
    }

    fn apply_in_place(&self, id: &str, c: &mut RecordConfig) -> Result<()> {
        let scalars = [
            ("comment", &self.comment, &mut c.comment),
            ("cluster name", &self.cluster_name, &mut c.cluster_name),
            ("container name", &self.container, &mut c.container_name),
            ("iPXE template", &self.ipxe, &mut c.ipxe),
            ("kernel override", &self.kernel_override, &mut c.kernel.override_version),
            ("kernel args", &self.kernel_args, &mut c.kernel.args),
            ("init", &self.init, &mut c.init),
            ("root", &self.root, &mut c.root),
            ("asset key", &self.asset_key, &mut c.asset_key),
            ("IPMI netmask", &self.ipmi_netmask, &mut c.ipmi.netmask),
            ("IPMI port", &self.ipmi_port, &mut c.ipmi.port),
            ("IPMI gateway", &self.ipmi_gateway, &mut c.ipmi.gateway),
            ("IPMI username", &self.ipmi_username, &mut c.ipmi.username),
            ("IPMI password", &self.ipmi_password, &mut c.ipmi.password),
            ("IPMI interface", &self.ipmi_interface, &mut c.ipmi.interface),
        ];
        for (field, value, entry) in scalars {
            if let Some(raw) = value {
                tracing::debug!(record = %id, field, value = %raw, "Setting field");
                entry.set(field, raw)?;
            }
        }

        if let Some(values) = &self.runtime_overlay {
            tracing::debug!(record = %id, ?values, "Setting runtime overlay");
            c.runtime_overlay.set_slice(values);
        }
        if let Some(values) = &self.system_overlay {
            tracing::debug!(record = %id, ?values, "Setting system overlay");
            c.system_overlay.set_slice(values);
        }

        if let Some(raw) = &self.ipmi_write {
            tracing::debug!(record = %id, value = %raw, "Setting IPMI write");
            set_flag(&mut c.ipmi.write, raw);
        }

        if let Some(discoverable) = self.discoverable {
            tracing::debug!(record = %id, discoverable, "Setting discoverable");
            c.discoverable.set_value(discoverable);
        }

        if self.touches_netdev() {
            self.apply_netdev(id, c)?;
        }

        for (key, value) in &self.tags {
            tracing::debug!(record = %id, key = %key, value = %value, "Setting tag");
            c.tags.set(key, value)?;
        }
        for key in &self.tag_deletes {
            tracing::debug!(record = %id, key = %key, "Deleting tag");
            c.tags.delete(key).map_err(|_| {
                ProvisionError::Resolution(format!("{id}: tag key does not exist: {key}"))
            })?;
        }

        Ok(())
    }

    fn apply_netdev(&self, id: &str, c: &mut RecordConfig) -> Result<()> {
        let net = self.netname.as_deref().filter(|n| !n.is_empty()).ok_or_else(|| {
            ProvisionError::Resolution(format!(
                "{id}: a network name is required to modify a network device"
            ))
        })?;

        if self.netdev_delete {
            tracing::debug!(record = %id, network = %net, "Deleting network");
            return c.delete_netdev(net).map_err(|_| {
                ProvisionError::Resolution(format!("{id}: network name doesn't exist: {net}"))
            });
        }

        let nd = c.netdev_or_create(net);
        if let Some(raw) = &self.netdev {
            nd.device.set("network device", raw)?;
        }
        if let Some(raw) = &self.netmask {
            nd.netmask.set("netmask", raw)?;
        }
        if let Some(raw) = &self.gateway {
            nd.gateway.set("gateway", raw)?;
        }
        if let Some(raw) = &self.net_type {
            nd.kind.set("network type", raw)?;
        }
        if let Some(raw) = &self.on_boot {
            set_flag(&mut nd.on_boot, raw);
        }
        for (key, value) in &self.net_tags {
            tracing::debug!(record = %id, network = %net, key = %key, "Setting network tag");
            nd.tags.set(key, value)?;
        }
        for key in &self.net_tag_deletes {
            tracing::debug!(record = %id, network = %net, key = %key, "Deleting network tag");
            nd.tags.delete(key).map_err(|_| {
                ProvisionError::Resolution(format!("{id}:{net}: tag key does not exist: {key}"))
            })?;
        }

        if let Some(raw) = &self.primary {
            if raw == UNSET {
                c.netdev_or_create(net).primary.unset();
            } else {
                c.set_primary(net, parse_flag_bool(raw));
            }
        }
        Ok(())
    }
}

/// Lenient boolean flag; [`UNSET`] clears the entry instead of meaning `false`.
fn set_flag(entry: &mut Entry<bool>, raw: &str) {
    if raw == UNSET {
        entry.unset();
    } else {
        entry.set_value(parse_flag_bool(raw));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_applied() {
        let mut config = RecordConfig::default();
        let req = SetRequest {
            comment: Some("login nodes".to_string()),
            container: Some("rocky-9".to_string()),
            kernel_args: Some("quiet".to_string()),
            ..Default::default()
        };
        req.apply("default", &mut config).unwrap();
        assert_eq!(config.comment.get(), "login nodes");
        assert_eq!(config.container_name.get(), "rocky-9");
        assert_eq!(config.kernel.args.get(), "quiet");
        assert!(config.init.is_unset());
    }

    #[test]
    fn test_unset_sentinel_through_request() {
        let mut config = RecordConfig::default();
        config.container_name.set_value("old".to_string());
        let req = SetRequest {
            container: Some(UNSET.to_string()),
            ..Default::default()
        };
        req.apply("default", &mut config).unwrap();
        assert!(config.container_name.is_unset());
    }

    #[test]
    fn test_ipmi_write_only_touched_when_given() {
        let mut config = RecordConfig::default();
        config.ipmi.write.set_value(true);
        SetRequest {
            comment: Some("x".to_string()),
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap();
        assert!(config.ipmi.write.get());

        SetRequest {
            ipmi_write: Some("no".to_string()),
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap();
        assert!(!config.ipmi.write.get());
        assert!(config.ipmi.write.is_set());
    }

    #[test]
    fn test_netdev_created_on_demand_only() {
        let mut config = RecordConfig::default();
        SetRequest {
            netname: Some("default".to_string()),
            comment: Some("x".to_string()),
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap();
        assert!(config.netdevs.is_empty());

        SetRequest {
            netname: Some("default".to_string()),
            netdev: Some("eth0".to_string()),
            on_boot: Some("yes".to_string()),
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap();
        let nd = &config.netdevs["default"];
        assert_eq!(nd.device.get(), "eth0");
        assert!(nd.on_boot.get());
    }

    #[test]
    fn test_net_field_without_netname_fails() {
        let mut config = RecordConfig::default();
        let err = SetRequest {
            netmask: Some("255.255.255.0".to_string()),
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Resolution(_)));
        assert!(config.netdevs.is_empty());
    }

    #[test]
    fn test_unset_clears_boolean_flags() {
        let mut config = RecordConfig::default();
        SetRequest {
            ipmi_write: Some("yes".to_string()),
            netname: Some("default".to_string()),
            on_boot: Some("yes".to_string()),
            primary: Some("yes".to_string()),
            ..Default::default()
        }
        .apply("n1", &mut config)
        .unwrap();
        config.set_primary("ib", false);

        SetRequest {
            ipmi_write: Some(UNSET.to_string()),
            netname: Some("default".to_string()),
            on_boot: Some(UNSET.to_string()),
            primary: Some(UNSET.to_string()),
            ..Default::default()
        }
        .apply("n1", &mut config)
        .unwrap();
        assert!(config.ipmi.write.is_unset());
        let nd = &config.netdevs["default"];
        assert!(nd.on_boot.is_unset());
        assert!(nd.primary.is_unset());
        assert!(config.netdevs["ib"].primary.is_set());
    }

    #[test]
    fn test_primary_clears_siblings() {
        let mut config = RecordConfig::default();
        config.set_primary("default", true);
        SetRequest {
            netname: Some("ib".to_string()),
            primary: Some("y".to_string()),
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap();
        assert!(!config.netdevs["default"].primary.get());
        assert!(config.netdevs["ib"].primary.get());
    }

    #[test]
    fn test_failed_batch_leaves_record_untouched() {
        let mut config = RecordConfig::default();
        config.tags.set("rack", "1").unwrap();
        let before = config.clone();

        let err = SetRequest {
            comment: Some("changed".to_string()),
            tags: vec![("row".to_string(), "b".to_string())],
            tag_deletes: vec!["missing".to_string()],
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Resolution(_)));
        assert_eq!(config, before);
    }

    #[test]
    fn test_netdev_delete_missing_fails() {
        let mut config = RecordConfig::default();
        let err = SetRequest {
            netname: Some("ib".to_string()),
            netdev_delete: true,
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap_err();
        assert!(err.to_string().contains("network name doesn't exist"));
    }

    #[test]
    fn test_net_tags() {
        let mut config = RecordConfig::default();
        SetRequest {
            netname: Some("default".to_string()),
            net_tags: vec![("mtu".to_string(), "9000".to_string())],
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap();
        assert_eq!(config.netdevs["default"].tags.get("mtu").unwrap().get(), "9000");

        let err = SetRequest {
            netname: Some("default".to_string()),
            net_tag_deletes: vec!["vlan".to_string()],
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Resolution(_)));
        assert!(config.netdevs["default"].tags.contains("mtu"));
    }

    #[test]
    fn test_overlays_replace() {
        let mut config = RecordConfig::default();
        config.runtime_overlay.set_slice(&["generic".to_string()]);
        SetRequest {
            runtime_overlay: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        }
        .apply("p", &mut config)
        .unwrap();
        assert_eq!(config.runtime_overlay.get(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("rack=12").unwrap(),
            ("rack".to_string(), "12".to_string())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("rack").is_err());
        assert!(parse_key_value("=1").is_err());
    }
}
