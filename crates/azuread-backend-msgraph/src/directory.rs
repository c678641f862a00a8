//! User and group lookups backing the data sources.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::Result;
use azuread_core::traits::{DirectoryGroup, DirectoryUser, GroupDirectory, UserDirectory};

use crate::client::{MsGraphClient, eq_filter};
use crate::models::{Group, User};

const USER_SELECT: &str = "id,userPrincipalName,accountEnabled,displayName,mail,mailNickname,onPremisesImmutableId,onPremisesSamAccountName,onPremisesUserPrincipalName,usageLocation";

pub struct MsGraphDirectory {
    client: Arc<MsGraphClient>,
}

impl MsGraphDirectory {
    pub fn new(client: Arc<MsGraphClient>) -> Self {
        Self { client }
    }

    async fn user_where(&self, field: &str, value: &str) -> Result<Option<DirectoryUser>> {
        let users: Vec<User> = self
            .client
            .list(&format!("/users?$select={USER_SELECT}"), Some(&eq_filter(field, value)))
            .await?;
        Ok(users.into_iter().next().map(DirectoryUser::from))
    }
}

#[async_trait]
impl UserDirectory for MsGraphDirectory {
    async fn user_by_object_id(&self, object_id: &str) -> Result<Option<DirectoryUser>> {
        match self
            .client
            .get::<User>(&format!("/users/{object_id}?$select={USER_SELECT}"))
            .await
        {
            Ok(user) => Ok(Some(user.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn user_by_principal_name(&self, upn: &str) -> Result<Option<DirectoryUser>> {
        self.user_where("userPrincipalName", upn).await
    }

    async fn user_by_mail(&self, mail: &str) -> Result<Option<DirectoryUser>> {
        self.user_where("mail", mail).await
    }

    async fn user_by_mail_nickname(&self, mail_nickname: &str) -> Result<Option<DirectoryUser>> {
        self.user_where("mailNickname", mail_nickname).await
    }
}

#[async_trait]
impl GroupDirectory for MsGraphDirectory {
    async fn group_by_object_id(&self, object_id: &str) -> Result<Option<DirectoryGroup>> {
        match self.client.get::<Group>(&format!("/groups/{object_id}")).await {
            Ok(group) => Ok(Some(group.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn groups_by_display_name(&self, display_name: &str) -> Result<Vec<DirectoryGroup>> {
        let groups: Vec<Group> = self
            .client
            .list("/groups", Some(&eq_filter("displayName", display_name)))
            .await?;
        Ok(groups.into_iter().map(DirectoryGroup::from).collect())
    }

    async fn group_members(&self, object_id: &str) -> Result<Vec<String>> {
        self.client
            .list_refs(&format!("/groups/{object_id}/members?$select=id"))
            .await
    }

    async fn group_owners(&self, object_id: &str) -> Result<Vec<String>> {
        self.client
            .list_refs(&format!("/groups/{object_id}/owners?$select=id"))
            .await
    }
}
