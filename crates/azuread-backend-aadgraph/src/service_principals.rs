//! `azuread_service_principal` on Azure AD Graph.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::resources::application::{flatten_app_roles, flatten_permission_scopes};
use azuread_core::{
    BackendContext, Error, Operation, ReplicationPolicy, ReplicationWaiter, ResourceData,
    ResourceHandler, Result,
};
use serde_json::{Map, json};
use tracing::{debug, info};

use crate::client::AadGraphClient;
use crate::models::ServicePrincipal;

pub struct ServicePrincipalHandler {
    client: Arc<AadGraphClient>,
}

impl ServicePrincipalHandler {
    pub fn new(client: Arc<AadGraphClient>) -> Self {
        Self { client }
    }

    async fn get(&self, object_id: &str) -> Result<ServicePrincipal> {
        self.client.get(&format!("servicePrincipals/{object_id}")).await
    }

    async fn wait_until_visible(&self, d: &ResourceData, operation: Operation, object_id: &str) -> Result<()> {
        let waiter = ReplicationWaiter::new(ReplicationPolicy::new(d.remaining(operation)));
        waiter
            .wait_for_creation("service principal", || self.get(object_id))
            .await
            .backend_context("Waiting for service principal", object_id)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for ServicePrincipalHandler {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let app_id = d.get_str("application_id").to_string();
        let body = ServicePrincipal {
            app_id: Some(app_id.clone()),
            account_enabled: Some(true),
            app_role_assignment_required: d.get_bool_opt("app_role_assignment_required"),
            tags: Some(d.get_string_list("tags")).filter(|t| !t.is_empty()),
            ..Default::default()
        };

        let created: ServicePrincipal = self
            .client
            .post("servicePrincipals", &body)
            .await
            .backend_context("Creating service principal for application", &app_id)?;
        let object_id = created.object_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            Error::Other("Object ID returned for service principal is nil/empty".into())
        })?;
        d.set_id(object_id.clone());
        info!(object_id = %object_id, application_id = %app_id, "created service principal");

        self.wait_until_visible(d, Operation::Create, &object_id).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        let sp = match self.get(&object_id).await {
            Ok(sp) => sp,
            Err(e) if e.is_not_found() => {
                debug!(object_id = %object_id, "service principal was not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e).backend_context("Retrieving service principal", &object_id),
        };

        d.set("object_id", &sp.object_id);
        d.set("application_id", &sp.app_id);
        d.set("display_name", &sp.display_name);
        d.set(
            "app_role_assignment_required",
            sp.app_role_assignment_required.unwrap_or_default(),
        );
        d.set("tags", sp.tags.unwrap_or_default());
        d.set("app_roles", flatten_app_roles(sp.app_roles.as_deref().unwrap_or_default()));
        d.set(
            "oauth2_permissions",
            flatten_permission_scopes(sp.oauth2_permissions.as_deref().unwrap_or_default()),
        );
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();

        let mut body = Map::new();
        if d.has_change("app_role_assignment_required") {
            body.insert(
                "appRoleAssignmentRequired".into(),
                json!(d.get_bool("app_role_assignment_required")),
            );
        }
        if d.has_change("tags") {
            body.insert("tags".into(), json!(d.get_string_list("tags")));
        }

        if !body.is_empty() {
            self.client
                .patch(&format!("servicePrincipals/{object_id}"), &body)
                .await
                .backend_context("Updating service principal", &object_id)?;
            self.wait_until_visible(d, Operation::Update, &object_id).await?;
        }

        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        match self.client.delete(&format!("servicePrincipals/{object_id}")).await {
            Err(e) if e.is_not_found() => {
                debug!(object_id = %object_id, "service principal already deleted");
                Ok(())
            }
            other => {
                other.backend_context("Deleting service principal", &object_id)?;
                info!(object_id = %object_id, "deleted service principal");
                Ok(())
            }
        }
    }
}
