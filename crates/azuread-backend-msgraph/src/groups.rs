//! `azuread_group` on Microsoft Graph.
//!
//! Groups are always security groups with mail disabled. Members and owners
//! are reconciled after the group itself has replicated.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::reconcile::reconcile;
use azuread_core::resources::group::{self, check_duplicate_name};
use azuread_core::traits::DirectoryGroup;
use azuread_core::{
    BackendContext, Error, Operation, RelationshipApi, ReplicationPolicy, ReplicationWaiter,
    ResourceData, ResourceHandler, Result,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{MsGraphClient, eq_filter};
use crate::models::Group;
use crate::relationships::DirectoryRelationship;

pub struct GroupHandler {
    client: Arc<MsGraphClient>,
    members: DirectoryRelationship,
    owners: DirectoryRelationship,
}

impl GroupHandler {
    pub fn new(client: Arc<MsGraphClient>) -> Self {
        Self {
            members: DirectoryRelationship::members(client.clone()),
            owners: DirectoryRelationship::owners(client.clone(), "groups"),
            client,
        }
    }

    async fn get(&self, object_id: &str) -> Result<Group> {
        self.client.get(&format!("/groups/{object_id}")).await
    }

    async fn ensure_unique_name(&self, display_name: &str) -> Result<()> {
        let existing: Vec<Group> = self
            .client
            .list("/groups", Some(&eq_filter("displayName", display_name)))
            .await
            .backend_context("Checking for existing groups", display_name)?;
        let existing: Vec<DirectoryGroup> = existing.into_iter().map(Into::into).collect();
        check_duplicate_name(display_name, &existing, None)
    }

    async fn update_relationships(&self, d: &ResourceData, object_id: &str) -> Result<()> {
        if d.has_change("members") {
            reconcile(&self.members, object_id, &d.get_string_list("members"))
                .await
                .backend_context("Setting members for group", object_id)?;
        }
        if d.has_change("owners") {
            reconcile(&self.owners, object_id, &d.get_string_list("owners"))
                .await
                .backend_context("Setting owners for group", object_id)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for GroupHandler {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let display_name = group::display_name(d);
        if d.get_bool("prevent_duplicate_names") {
            self.ensure_unique_name(&display_name).await?;
        }

        let body = Group {
            display_name: Some(display_name.clone()),
            description: d.get_string("description"),
            mail_enabled: Some(false),
            mail_nickname: Some(Uuid::new_v4().to_string()),
            security_enabled: Some(true),
            ..Default::default()
        };
        let created: Group = self
            .client
            .post("/groups", &body)
            .await
            .backend_context("Creating group", &display_name)?;
        let object_id = created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Other("Object ID returned for group is nil/empty".into()))?;
        d.set_id(object_id.clone());
        info!(object_id = %object_id, display_name = %display_name, "created group");

        let waiter = ReplicationWaiter::new(ReplicationPolicy::new(d.remaining(Operation::Create)));
        waiter
            .wait_for_creation("group", || self.get(&object_id))
            .await
            .backend_context("Waiting for group", &object_id)?;

        // Only explicitly configured sets are applied; leaving either
        // attribute out keeps whatever the directory assigned.
        let members = d.get_string_list("members");
        if !members.is_empty() {
            reconcile(&self.members, &object_id, &members)
                .await
                .backend_context("Setting members for group", &object_id)?;
        }
        let owners = d.get_string_list("owners");
        if !owners.is_empty() {
            reconcile(&self.owners, &object_id, &owners)
                .await
                .backend_context("Setting owners for group", &object_id)?;
        }

        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        let found = match self.get(&object_id).await {
            Ok(g) => g,
            Err(e) if e.is_not_found() => {
                debug!(object_id = %object_id, "group was not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e).backend_context("Retrieving group", &object_id),
        };

        let members = self
            .members
            .list(&object_id)
            .await
            .backend_context("Retrieving members for group", &object_id)?;
        let owners = self
            .owners
            .list(&object_id)
            .await
            .backend_context("Retrieving owners for group", &object_id)?;

        d.set("object_id", &found.id);
        d.set("display_name", &found.display_name);
        d.set("name", &found.display_name);
        d.set("description", found.description.unwrap_or_default());
        d.set("members", members);
        d.set("owners", owners);
        let prevent_duplicates = d.get_bool("prevent_duplicate_names");
        d.set("prevent_duplicate_names", prevent_duplicates);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        // Name and description are replace-only; only relationships change in place.
        self.update_relationships(d, &object_id).await?;
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        match self.client.delete(&format!("/groups/{object_id}")).await {
            Err(e) if e.is_not_found() => {
                debug!(object_id = %object_id, "group already deleted");
                Ok(())
            }
            other => {
                other.backend_context("Deleting group", &object_id)?;
                info!(object_id = %object_id, "deleted group");
                Ok(())
            }
        }
    }
}
