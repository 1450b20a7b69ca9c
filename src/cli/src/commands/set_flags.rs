//! Flags shared by `profile set` and `node set`.

use clap::Args;
use nodeprov_core::{parse_key_value, ProvisionError, SetRequest};

#[derive(Args, Debug, Default)]
pub struct SetFlags {
    /// Set a comment
    #[arg(long)]
    pub comment: Option<String>,

    /// Set the container (VNFS)
    #[arg(short = 'C', long)]
    pub container: Option<String>,

    /// Set kernel override version
    #[arg(short = 'K', long = "kerneloverride")]
    pub kernel_override: Option<String>,

    /// Set kernel arguments
    #[arg(short = 'A', long = "kernelargs", allow_hyphen_values = true)]
    pub kernel_args: Option<String>,

    /// Set the cluster group
    #[arg(short = 'c', long = "cluster")]
    pub cluster: Option<String>,

    /// Set the iPXE template name
    #[arg(short = 'P', long)]
    pub ipxe: Option<String>,

    /// Define the init process to boot the container
    #[arg(short = 'i', long)]
    pub init: Option<String>,

    /// Define the rootfs
    #[arg(long)]
    pub root: Option<String>,

    /// Set the asset tag (key)
    #[arg(long = "assetkey")]
    pub asset_key: Option<String>,

    /// Set the runtime overlay (comma separated or repeated)
    #[arg(short = 'R', long = "runtime", value_delimiter = ',')]
    pub runtime_overlay: Option<Vec<String>>,

    /// Set the system overlay (comma separated or repeated)
    #[arg(short = 'S', long = "system", value_delimiter = ',')]
    pub system_overlay: Option<Vec<String>>,

    /// Set the IPMI netmask
    #[arg(long = "ipminetmask")]
    pub ipmi_netmask: Option<String>,

    /// Set the IPMI port
    #[arg(long = "ipmiport")]
    pub ipmi_port: Option<String>,

    /// Set the IPMI gateway
    #[arg(long = "ipmigateway")]
    pub ipmi_gateway: Option<String>,

    /// Set the IPMI username
    #[arg(long = "ipmiuser")]
    pub ipmi_username: Option<String>,

    /// Set the IPMI password
    #[arg(long = "ipmipass")]
    pub ipmi_password: Option<String>,

    /// Set the IPMI interface (defaults to 'lan')
    #[arg(long = "ipmiinterface")]
    pub ipmi_interface: Option<String>,

    /// Enable/disable writing the IPMI configuration (yes/no)
    #[arg(long = "ipmiwrite")]
    pub ipmi_write: Option<String>,

    /// Network name to configure
    #[arg(short = 'n', long = "netname", default_value = "default")]
    pub netname: String,

    /// Set the network device
    #[arg(short = 'N', long)]
    pub netdev: Option<String>,

    /// Enable/disable the device as primary (yes/no)
    #[arg(long)]
    pub primary: Option<String>,

    /// Set the network device netmask
    #[arg(short = 'M', long)]
    pub netmask: Option<String>,

    /// Set the network device gateway
    #[arg(short = 'G', long)]
    pub gateway: Option<String>,

    /// Set the network device type
    #[arg(short = 'T', long = "type")]
    pub net_type: Option<String>,

    /// Enable/disable the device at boot (yes/no)
    #[arg(long = "onboot")]
    pub on_boot: Option<String>,

    /// Delete the network device
    #[arg(long = "netdel")]
    pub netdel: bool,

    /// Add a tag to the network device (key=value)
    #[arg(long = "nettag", value_delimiter = ',')]
    pub net_tags: Vec<String>,

    /// Delete a tag from the network device
    #[arg(long = "netdeltag", value_delimiter = ',')]
    pub net_tag_deletes: Vec<String>,

    /// Add a tag (key=value)
    #[arg(short = 't', long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Delete a tag
    #[arg(long = "tagdel", value_delimiter = ',')]
    pub tag_deletes: Vec<String>,

    /// Make nodes discoverable
    #[arg(long, conflicts_with = "undiscoverable")]
    pub discoverable: bool,

    /// Remove the discoverable flag
    #[arg(long)]
    pub undiscoverable: bool,
}

impl SetFlags {
    /// Build the mutation request these flags describe.
    pub fn to_request(&self) -> Result<SetRequest, ProvisionError> {
        let discoverable = match (self.discoverable, self.undiscoverable) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };
        Ok(SetRequest {
            comment: self.comment.clone(),
            cluster_name: self.cluster.clone(),
            container: self.container.clone(),
            ipxe: self.ipxe.clone(),
            kernel_override: self.kernel_override.clone(),
            kernel_args: self.kernel_args.clone(),
            init: self.init.clone(),
            root: self.root.clone(),
            asset_key: self.asset_key.clone(),
            runtime_overlay: self.runtime_overlay.clone(),
            system_overlay: self.system_overlay.clone(),
            ipmi_netmask: self.ipmi_netmask.clone(),
            ipmi_port: self.ipmi_port.clone(),
            ipmi_gateway: self.ipmi_gateway.clone(),
            ipmi_username: self.ipmi_username.clone(),
            ipmi_password: self.ipmi_password.clone(),
            ipmi_interface: self.ipmi_interface.clone(),
            ipmi_write: self.ipmi_write.clone(),
            discoverable,
            netname: Some(self.netname.clone()),
            netdev: self.netdev.clone(),
            netmask: self.netmask.clone(),
            gateway: self.gateway.clone(),
            net_type: self.net_type.clone(),
            on_boot: self.on_boot.clone(),
            primary: self.primary.clone(),
            netdev_delete: self.netdel,
            tags: self
                .tags
                .iter()
                .map(|t| parse_key_value(t))
                .collect::<Result<_, _>>()?,
            tag_deletes: self.tag_deletes.clone(),
            net_tags: self
                .net_tags
                .iter()
                .map(|t| parse_key_value(t))
                .collect::<Result<_, _>>()?,
            net_tag_deletes: self.net_tag_deletes.clone(),
        })
    }
}
