//! User and group lookups backing the data sources.
//!
//! AAD Graph addresses a user directly by object ID or UPN; mail and mail
//! nickname lookups go through a filtered collection read.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::Result;
use azuread_core::traits::{DirectoryGroup, DirectoryUser, GroupDirectory, UserDirectory};
use serde::de::DeserializeOwned;

use crate::client::{AadGraphClient, eq_filter};
use crate::models::{Group, User};

pub struct AadGraphDirectory {
    client: Arc<AadGraphClient>,
}

impl AadGraphDirectory {
    pub fn new(client: Arc<AadGraphClient>) -> Self {
        Self { client }
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.client.get::<T>(path).await {
            Ok(found) => Ok(Some(found)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn user_where(&self, field: &str, value: &str) -> Result<Option<DirectoryUser>> {
        let users: Vec<User> = self.client.list("users", Some(&eq_filter(field, value))).await?;
        Ok(users.into_iter().next().map(DirectoryUser::from))
    }
}

#[async_trait]
impl UserDirectory for AadGraphDirectory {
    async fn user_by_object_id(&self, object_id: &str) -> Result<Option<DirectoryUser>> {
        let user: Option<User> = self.get_optional(&format!("users/{object_id}")).await?;
        Ok(user.map(Into::into))
    }

    async fn user_by_principal_name(&self, upn: &str) -> Result<Option<DirectoryUser>> {
        let user: Option<User> = self
            .get_optional(&format!("users/{}", urlencoding::encode(upn)))
            .await?;
        Ok(user.map(Into::into))
    }

    async fn user_by_mail(&self, mail: &str) -> Result<Option<DirectoryUser>> {
        self.user_where("mail", mail).await
    }

    async fn user_by_mail_nickname(&self, mail_nickname: &str) -> Result<Option<DirectoryUser>> {
        self.user_where("mailNickname", mail_nickname).await
    }
}

#[async_trait]
impl GroupDirectory for AadGraphDirectory {
    async fn group_by_object_id(&self, object_id: &str) -> Result<Option<DirectoryGroup>> {
        let group: Option<Group> = self.get_optional(&format!("groups/{object_id}")).await?;
        Ok(group.map(Into::into))
    }

    async fn groups_by_display_name(&self, display_name: &str) -> Result<Vec<DirectoryGroup>> {
        let groups: Vec<Group> = self
            .client
            .list("groups", Some(&eq_filter("displayName", display_name)))
            .await?;
        Ok(groups.into_iter().map(DirectoryGroup::from).collect())
    }

    async fn group_members(&self, object_id: &str) -> Result<Vec<String>> {
        self.client
            .list_object_ids(&format!("groups/{object_id}/members"))
            .await
    }

    async fn group_owners(&self, object_id: &str) -> Result<Vec<String>> {
        self.client
            .list_object_ids(&format!("groups/{object_id}/owners"))
            .await
    }
}
