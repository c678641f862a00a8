//! Backend-neutral lookups used by the `azuread_user(s)` and
//! `azuread_group(s)` data sources.
//!
//! Lookups return `Ok(None)` for "no such object"; any other failure is an
//! error.

use async_trait::async_trait;

use crate::Result;

/// A user as seen by the data sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryUser {
    pub object_id: String,
    pub user_principal_name: String,
    pub account_enabled: bool,
    pub display_name: Option<String>,
    pub immutable_id: Option<String>,
    pub mail: Option<String>,
    pub mail_nickname: Option<String>,
    pub onpremises_sam_account_name: Option<String>,
    pub onpremises_user_principal_name: Option<String>,
    pub usage_location: Option<String>,
}

/// A group as seen by the data sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryGroup {
    pub object_id: String,
    pub display_name: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_by_object_id(&self, object_id: &str) -> Result<Option<DirectoryUser>>;

    async fn user_by_principal_name(&self, upn: &str) -> Result<Option<DirectoryUser>>;

    async fn user_by_mail(&self, mail: &str) -> Result<Option<DirectoryUser>>;

    async fn user_by_mail_nickname(&self, mail_nickname: &str) -> Result<Option<DirectoryUser>>;
}

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn group_by_object_id(&self, object_id: &str) -> Result<Option<DirectoryGroup>>;

    /// Every group whose display name equals `display_name`
    async fn groups_by_display_name(&self, display_name: &str) -> Result<Vec<DirectoryGroup>>;

    async fn group_members(&self, object_id: &str) -> Result<Vec<String>>;

    async fn group_owners(&self, object_id: &str) -> Result<Vec<String>>;
}
