//! Configuration types for the provider
//!
//! Everything the provider block carries: tenant credentials, which cloud
//! to talk to, which API generation to prefer and the default operation
//! timeouts.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::provider::Operation;
use crate::{Error, Result};

/// Default timeout for each CRUD operation
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Provider-wide configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Directory (tenant) ID
    pub tenant_id: String,

    /// Client ID of the service principal used to authenticate
    pub client_id: String,

    /// Client secret of that service principal
    pub client_secret: String,

    /// Cloud the tenant lives in
    #[serde(default)]
    pub environment: CloudEnvironment,

    /// Route resources to the MS Graph handlers where both backends exist
    #[serde(default)]
    pub use_msgraph: bool,

    /// MS Graph API version segment
    #[serde(default)]
    pub msgraph_api_version: MsGraphApiVersion,

    /// Default per-operation timeouts
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl ProviderConfig {
    /// Create a configuration for the public cloud with default settings
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            environment: CloudEnvironment::default(),
            use_msgraph: false,
            msgraph_api_version: MsGraphApiVersion::default(),
            timeouts: Timeouts::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.is_empty() {
            return Err(Error::config("tenant_id cannot be empty"));
        }
        if uuid::Uuid::parse_str(&self.tenant_id).is_err() {
            return Err(Error::config(format!(
                "tenant_id {:?} is not a valid UUID",
                self.tenant_id
            )));
        }
        if self.client_id.is_empty() {
            return Err(Error::config("client_id cannot be empty"));
        }
        if self.client_secret.is_empty() {
            return Err(Error::config("client_secret cannot be empty"));
        }
        self.timeouts.validate()?;
        Ok(())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("environment", &self.environment)
            .field("use_msgraph", &self.use_msgraph)
            .field("msgraph_api_version", &self.msgraph_api_version)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Azure cloud the tenant belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudEnvironment {
    /// Azure public cloud
    #[default]
    Global,
    /// Azure US Government
    UsGovernment,
    /// Azure China (21Vianet)
    China,
    /// Azure Germany
    Germany,
}

impl CloudEnvironment {
    /// OAuth2 authority host
    pub fn login_endpoint(&self) -> &'static str {
        match self {
            CloudEnvironment::Global => "https://login.microsoftonline.com",
            CloudEnvironment::UsGovernment => "https://login.microsoftonline.us",
            CloudEnvironment::China => "https://login.chinacloudapi.cn",
            CloudEnvironment::Germany => "https://login.microsoftonline.de",
        }
    }

    /// Legacy AAD Graph host, also the token audience for it
    pub fn aad_graph_endpoint(&self) -> &'static str {
        match self {
            CloudEnvironment::Global | CloudEnvironment::UsGovernment => {
                "https://graph.windows.net"
            }
            CloudEnvironment::China => "https://graph.chinacloudapi.cn",
            CloudEnvironment::Germany => "https://graph.cloudapi.de",
        }
    }

    /// MS Graph host, also the token audience for it
    pub fn ms_graph_endpoint(&self) -> &'static str {
        match self {
            CloudEnvironment::Global => "https://graph.microsoft.com",
            CloudEnvironment::UsGovernment => "https://graph.microsoft.us",
            CloudEnvironment::China => "https://microsoftgraph.chinacloudapi.cn",
            CloudEnvironment::Germany => "https://graph.microsoft.de",
        }
    }
}

impl FromStr for CloudEnvironment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "global" | "public" => Ok(CloudEnvironment::Global),
            "usgovernment" | "usgovernmentl4" => Ok(CloudEnvironment::UsGovernment),
            "china" => Ok(CloudEnvironment::China),
            "german" | "germany" => Ok(CloudEnvironment::Germany),
            other => Err(Error::config(format!(
                "unknown environment {other:?}, expected one of global, usgovernment, china, germany"
            ))),
        }
    }
}

/// API version segment used in MS Graph URLs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsGraphApiVersion {
    /// `beta`, required for some application properties
    #[default]
    #[serde(rename = "beta")]
    Beta,
    /// `v1.0`
    #[serde(rename = "v1.0")]
    V1,
}

impl MsGraphApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsGraphApiVersion::Beta => "beta",
            MsGraphApiVersion::V1 => "v1.0",
        }
    }
}

impl FromStr for MsGraphApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "beta" => Ok(MsGraphApiVersion::Beta),
            "v1.0" => Ok(MsGraphApiVersion::V1),
            other => Err(Error::config(format!(
                "unknown MS Graph API version {other:?}, expected beta or v1.0"
            ))),
        }
    }
}

/// Per-operation timeouts, serialized as whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(with = "secs", default = "default_timeout")]
    pub create: Duration,
    #[serde(with = "secs", default = "default_timeout")]
    pub read: Duration,
    #[serde(with = "secs", default = "default_timeout")]
    pub update: Duration,
    #[serde(with = "secs", default = "default_timeout")]
    pub delete: Duration,
}

impl Timeouts {
    /// Same timeout for every operation
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
        }
    }

    /// Timeout that bounds `operation`; import and state upgrades count as reads
    pub fn for_operation(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
            Operation::Read | Operation::Import | Operation::UpgradeState => self.read,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("create", self.create),
            ("read", self.read),
            ("update", self.update),
            ("delete", self.delete),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} timeout must be > 0")));
            }
        }
        Ok(())
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(DEFAULT_OPERATION_TIMEOUT)
    }
}

fn default_timeout() -> Duration {
    DEFAULT_OPERATION_TIMEOUT
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "00000000-0000-0000-0000-000000000001";

    #[test]
    fn valid_config_passes() {
        let config = ProviderConfig::new(TENANT, "client", "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tenant_must_be_uuid() {
        let config = ProviderConfig::new("contoso", "client", "secret");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn debug_redacts_secret() {
        let config = ProviderConfig::new(TENANT, "client", "hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn environment_names() {
        assert_eq!(
            "usgovernment".parse::<CloudEnvironment>().unwrap(),
            CloudEnvironment::UsGovernment
        );
        assert_eq!(
            "China".parse::<CloudEnvironment>().unwrap().ms_graph_endpoint(),
            "https://microsoftgraph.chinacloudapi.cn"
        );
        assert!("mars".parse::<CloudEnvironment>().is_err());
    }

    #[test]
    fn timeouts_deserialize_from_seconds_with_defaults() {
        let timeouts: Timeouts = serde_json::from_str(r#"{"create": 60}"#).unwrap();
        assert_eq!(timeouts.create, Duration::from_secs(60));
        assert_eq!(timeouts.delete, DEFAULT_OPERATION_TIMEOUT);
    }

    #[test]
    fn msgraph_version_serializes_as_segment() {
        let json = serde_json::to_string(&MsGraphApiVersion::V1).unwrap();
        assert_eq!(json, "\"v1.0\"");
    }
}
