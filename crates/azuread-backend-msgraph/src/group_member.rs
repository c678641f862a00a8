//! `azuread_group_member` on Microsoft Graph.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::resources::GROUP_MEMBER;
use azuread_core::{
    BackendContext, Error, GroupMemberId, LockRegistry, Operation, RelationshipApi,
    ReplicationPolicy, ReplicationWaiter, ResourceData, ResourceHandler, Result,
};
use tracing::{debug, info};

use crate::client::MsGraphClient;
use crate::relationships::DirectoryRelationship;

pub struct GroupMemberHandler {
    members: DirectoryRelationship,
    locks: Arc<LockRegistry>,
}

impl GroupMemberHandler {
    pub fn new(client: Arc<MsGraphClient>, locks: Arc<LockRegistry>) -> Self {
        Self {
            members: DirectoryRelationship::members(client),
            locks,
        }
    }

    async fn is_member(&self, id: &GroupMemberId) -> Result<bool> {
        let members = self.members.list(&id.group_id).await?;
        Ok(members.iter().any(|m| m.eq_ignore_ascii_case(&id.member_id)))
    }
}

#[async_trait]
impl ResourceHandler for GroupMemberHandler {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let id = GroupMemberId::new(d.get_str("group_object_id"), d.get_str("member_object_id"));
        let _lock = self.locks.acquire(GROUP_MEMBER, &id.group_id).await;

        if self
            .is_member(&id)
            .await
            .backend_context("Listing existing members for group", &id.group_id)?
        {
            return Err(Error::already_exists(GROUP_MEMBER, &id.to_string()));
        }

        self.members
            .add(&id.group_id, std::slice::from_ref(&id.member_id))
            .await
            .backend_context("Adding group member", &id.member_id)?;
        d.set_id(id.to_string());
        info!(group_id = %id.group_id, member_id = %id.member_id, "added group member");

        let waiter = ReplicationWaiter::new(ReplicationPolicy::new(d.remaining(Operation::Create)));
        waiter
            .poll_until("group member", || self.is_member(&id), |present| *present)
            .await
            .backend_context("Waiting for group membership", &id.to_string())?;

        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let id = GroupMemberId::parse(d.id())?;
        let present = match self.is_member(&id).await {
            Ok(present) => present,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e).backend_context("Retrieving members for group", &id.group_id),
        };
        if !present {
            debug!(group_id = %id.group_id, member_id = %id.member_id, "member not in group, removing from state");
            d.clear_id();
            return Ok(());
        }

        d.set("group_object_id", &id.group_id);
        d.set("member_object_id", &id.member_id);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        // Both attributes force replacement
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id = GroupMemberId::parse(d.id())?;
        let _lock = self.locks.acquire(GROUP_MEMBER, &id.group_id).await;

        self.members
            .remove(&id.group_id, std::slice::from_ref(&id.member_id))
            .await
            .backend_context("Removing group member", &id.member_id)?;

        let waiter = ReplicationWaiter::new(ReplicationPolicy::new(d.remaining(Operation::Delete)));
        waiter
            .wait_for_list_remove("group member", &id.member_id, || async {
                // A deleted group has no members left to wait for
                match self.members.list(&id.group_id).await {
                    Err(e) if e.is_not_found() => Ok(Vec::new()),
                    other => other,
                }
            })
            .await
            .backend_context("Waiting for group member removal", &id.to_string())?;
        info!(group_id = %id.group_id, member_id = %id.member_id, "removed group member");
        Ok(())
    }
}
