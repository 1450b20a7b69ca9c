//! Registry credentials and transport options.

use nodeprov_core::entry::parse_flag_bool;

pub const USERNAME_ENV: &str = "NODEPROV_OCI_USERNAME";
pub const PASSWORD_ENV: &str = "NODEPROV_OCI_PASSWORD";
pub const NOHTTPS_ENV: &str = "NODEPROV_OCI_NOHTTPS";
pub const INSECURE_ENV: &str = "NODEPROV_OCI_INSECURE";

/// Authentication credentials for a container registry.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none() || self.password.is_none()
    }

    pub(crate) fn to_oci_auth(&self) -> oci_distribution::secrets::RegistryAuth {
        use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

// Never print the password.
impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Authentication and TLS context for one import.
#[derive(Debug, Clone, Default)]
pub struct PullContext {
    pub auth: RegistryAuth,
    /// Talk plain HTTP to the registry
    pub plain_http: bool,
    /// Accept invalid TLS certificates
    pub insecure: bool,
}

impl PullContext {
    /// Build the context from `NODEPROV_OCI_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let auth = match (lookup(USERNAME_ENV), lookup(PASSWORD_ENV)) {
            (Some(user), Some(pass)) => RegistryAuth::basic(user, pass),
            _ => RegistryAuth::anonymous(),
        };
        let flag = |key: &str| lookup(key).map_or(false, |v| parse_flag_bool(&v.to_ascii_lowercase()));
        Self {
            auth,
            plain_http: flag(NOHTTPS_ENV),
            insecure: flag(INSECURE_ENV),
        }
    }
}
