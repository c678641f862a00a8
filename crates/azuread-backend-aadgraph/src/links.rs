//! `$links` navigation for owners and group members.
//!
//! AAD Graph binds a directory object with `POST {object}/$links/{rel}` and
//! a `{"url": ...}` body, and unbinds with `DELETE {object}/$links/{rel}/{id}`.
//! Removals are issued one at a time; member removals can additionally wait
//! until the directory stops listing the removed object.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::{RelationshipApi, ReplicationWaiter, Result};
use serde_json::json;
use tracing::debug;

use crate::client::AadGraphClient;

/// One navigation property of one object type, e.g. `groups` / `members`
pub struct LinkRelationship {
    client: Arc<AadGraphClient>,
    collection: &'static str,
    relationship: &'static str,
    removal_wait: Option<ReplicationWaiter>,
}

impl LinkRelationship {
    pub fn owners(client: Arc<AadGraphClient>, collection: &'static str) -> Self {
        Self {
            client,
            collection,
            relationship: "owners",
            removal_wait: None,
        }
    }

    pub fn members(client: Arc<AadGraphClient>) -> Self {
        Self {
            client,
            collection: "groups",
            relationship: "members",
            removal_wait: None,
        }
    }

    /// Wait after each removal until the removed object is no longer listed
    pub fn waiting_for_removal(mut self, waiter: ReplicationWaiter) -> Self {
        self.removal_wait = Some(waiter);
        self
    }

    fn link_path(&self, object_id: &str) -> String {
        format!("{}/{object_id}/$links/{}", self.collection, self.relationship)
    }
}

#[async_trait]
impl RelationshipApi for LinkRelationship {
    fn relationship(&self) -> &'static str {
        self.relationship
    }

    async fn list(&self, object_id: &str) -> Result<Vec<String>> {
        self.client
            .list_object_ids(&format!("{}/{object_id}/{}", self.collection, self.relationship))
            .await
    }

    async fn add(&self, object_id: &str, ids: &[String]) -> Result<()> {
        let path = self.link_path(object_id);
        for id in ids {
            let body = json!({ "url": self.client.directory_object_url(id) });
            self.client.post_no_content(&path, &body).await?;
        }
        Ok(())
    }

    async fn remove(&self, object_id: &str, ids: &[String]) -> Result<()> {
        for id in ids {
            let path = format!("{}/{id}", self.link_path(object_id));
            match self.client.delete(&path).await {
                Err(e) if e.is_not_found() => {
                    debug!(object_id, id, relationship = self.relationship, "link already removed");
                }
                other => other?,
            }

            if let Some(waiter) = &self.removal_wait {
                waiter
                    .wait_for_list_remove(self.relationship, id, || self.list(object_id))
                    .await?;
            }
        }
        Ok(())
    }
}
