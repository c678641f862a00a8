//! `owners` and `members` reference collections.
//!
//! Additions bind `directoryObjects/{id}` through `POST .../$ref`, one
//! request per object. Removals delete the single reference; a reference
//! that is already gone counts as removed.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::{RelationshipApi, Result};
use serde_json::json;
use tracing::debug;

use crate::client::MsGraphClient;

/// One reference collection of one object type, e.g. `groups` / `members`
pub struct DirectoryRelationship {
    client: Arc<MsGraphClient>,
    collection: &'static str,
    relationship: &'static str,
}

impl DirectoryRelationship {
    pub fn owners(client: Arc<MsGraphClient>, collection: &'static str) -> Self {
        Self {
            client,
            collection,
            relationship: "owners",
        }
    }

    pub fn members(client: Arc<MsGraphClient>) -> Self {
        Self {
            client,
            collection: "groups",
            relationship: "members",
        }
    }

    fn path(&self, object_id: &str) -> String {
        format!("/{}/{object_id}/{}", self.collection, self.relationship)
    }
}

#[async_trait]
impl RelationshipApi for DirectoryRelationship {
    fn relationship(&self) -> &'static str {
        self.relationship
    }

    async fn list(&self, object_id: &str) -> Result<Vec<String>> {
        self.client
            .list_refs(&format!("{}?$select=id", self.path(object_id)))
            .await
    }

    async fn add(&self, object_id: &str, ids: &[String]) -> Result<()> {
        let path = format!("{}/$ref", self.path(object_id));
        for id in ids {
            let body = json!({ "@odata.id": self.client.directory_object_url(id) });
            self.client.post_no_content(&path, &body).await?;
        }
        Ok(())
    }

    async fn remove(&self, object_id: &str, ids: &[String]) -> Result<()> {
        for id in ids {
            let path = format!("{}/{id}/$ref", self.path(object_id));
            match self.client.delete(&path).await {
                Err(e) if e.is_not_found() => {
                    debug!(object_id, id, relationship = self.relationship, "reference already removed");
                }
                other => other?,
            }
        }
        Ok(())
    }
}
