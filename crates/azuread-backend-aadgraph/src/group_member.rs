//! `azuread_group_member` on Azure AD Graph.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::resources::GROUP_MEMBER;
use azuread_core::{
    BackendContext, Error, GroupMemberId, LockRegistry, Operation, RelationshipApi,
    ReplicationPolicy, ReplicationWaiter, ResourceData, ResourceHandler, Result,
};
use tracing::{debug, info};

use crate::client::AadGraphClient;
use crate::links::LinkRelationship;

pub struct GroupMemberHandler {
    client: Arc<AadGraphClient>,
    locks: Arc<LockRegistry>,
}

impl GroupMemberHandler {
    pub fn new(client: Arc<AadGraphClient>, locks: Arc<LockRegistry>) -> Self {
        Self { client, locks }
    }

    fn members(&self) -> LinkRelationship {
        LinkRelationship::members(self.client.clone())
    }

    /// The member ID as the directory spells it, if present
    async fn find_member(&self, id: &GroupMemberId) -> Result<Option<String>> {
        let members = self.members().list(&id.group_id).await?;
        Ok(members
            .into_iter()
            .find(|m| m.eq_ignore_ascii_case(&id.member_id)))
    }
}

#[async_trait]
impl ResourceHandler for GroupMemberHandler {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let id = GroupMemberId::new(d.get_str("group_object_id"), d.get_str("member_object_id"));
        let _lock = self.locks.acquire(GROUP_MEMBER, &id.group_id).await;

        let existing = self
            .find_member(&id)
            .await
            .backend_context("Listing existing members for group", &id.group_id)?;
        if existing.is_some() {
            return Err(Error::already_exists(GROUP_MEMBER, &id.to_string()));
        }

        self.members()
            .add(&id.group_id, std::slice::from_ref(&id.member_id))
            .await
            .backend_context("Adding group member", &id.member_id)?;
        d.set_id(id.to_string());
        info!(group_id = %id.group_id, member_id = %id.member_id, "added group member");

        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let id = GroupMemberId::parse(d.id())?;
        let member = match self.find_member(&id).await {
            Ok(member) => member,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e).backend_context("Retrieving members for group", &id.group_id),
        };
        let Some(member_id) = member else {
            debug!(group_id = %id.group_id, member_id = %id.member_id, "member not in group, removing from state");
            d.clear_id();
            return Ok(());
        };

        d.set("group_object_id", &id.group_id);
        d.set("member_object_id", member_id);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        // Both attributes force replacement
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id = GroupMemberId::parse(d.id())?;
        let _lock = self.locks.acquire(GROUP_MEMBER, &id.group_id).await;

        let waiter = ReplicationWaiter::new(ReplicationPolicy::new(d.remaining(Operation::Delete)));
        self.members()
            .waiting_for_removal(waiter)
            .remove(&id.group_id, std::slice::from_ref(&id.member_id))
            .await
            .backend_context("Removing group member", &id.to_string())?;
        info!(group_id = %id.group_id, member_id = %id.member_id, "removed group member");
        Ok(())
    }
}
