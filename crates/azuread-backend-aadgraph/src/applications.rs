//! `azuread_application` on Azure AD Graph.
//!
//! Native applications are created as web apps and converted afterwards,
//! since AAD Graph rejects a native create with a homepage.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::reconcile::reconcile;
use azuread_core::resources::APPLICATION;
use azuread_core::resources::application::{
    self as app, AppRole, PermissionScope, TYPE_NATIVE, TYPE_WEBAPP_API,
};
use azuread_core::{
    BackendContext, Error, Operation, RelationshipApi, ReplicationPolicy, ReplicationWaiter,
    ResourceData, ResourceHandler, Result,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::client::{AadGraphClient, eq_filter};
use crate::links::LinkRelationship;
use crate::models::Application;

pub struct ApplicationHandler {
    client: Arc<AadGraphClient>,
    owners: LinkRelationship,
}

fn optional_string(d: &ResourceData, key: &str) -> Value {
    d.get_string(key).map_or(Value::Null, Value::String)
}

impl ApplicationHandler {
    pub fn new(client: Arc<AadGraphClient>) -> Self {
        Self {
            owners: LinkRelationship::owners(client.clone(), "applications"),
            client,
        }
    }

    async fn get(&self, object_id: &str) -> Result<Application> {
        self.client.get(&format!("applications/{object_id}")).await
    }

    async fn check_duplicate_name(&self, display_name: &str, own_id: Option<&str>) -> Result<()> {
        let apps: Vec<Application> = self
            .client
            .list("applications", Some(&eq_filter("displayName", display_name)))
            .await
            .backend_context("Checking for existing applications", display_name)?;
        let clash = apps.into_iter().find(|a| {
            a.display_name.as_deref() == Some(display_name)
                && own_id.is_none_or(|id| a.object_id.as_deref() != Some(id))
        });
        match clash {
            Some(found) => Err(Error::already_exists(
                APPLICATION,
                found.object_id.as_deref().unwrap_or("unknown"),
            )),
            None => Ok(()),
        }
    }

    /// Disable the current roles, then write `desired` in a second call
    async fn set_app_roles(&self, object_id: &str, mut desired: Vec<AppRole>) -> Result<()> {
        let current = self.get(object_id).await?.app_roles.unwrap_or_default();
        app::assign_app_role_ids(&mut desired, &current);
        if app::same_app_roles(&current, &desired) {
            return Ok(());
        }

        let path = format!("applications/{object_id}");
        if !current.is_empty() {
            debug!(object_id, count = current.len(), "disabling app roles");
            self.client
                .patch(&path, &json!({ "appRoles": app::disabled_app_roles(&current) }))
                .await?;
        }
        self.client.patch(&path, &json!({ "appRoles": desired })).await
    }

    async fn set_permission_scopes(
        &self,
        object_id: &str,
        mut desired: Vec<PermissionScope>,
    ) -> Result<()> {
        let current = self.get(object_id).await?.oauth2_permissions.unwrap_or_default();
        app::assign_permission_scope_ids(&mut desired, &current);
        if app::same_permission_scopes(&current, &desired) {
            return Ok(());
        }

        let path = format!("applications/{object_id}");
        if !current.is_empty() {
            debug!(object_id, count = current.len(), "disabling oauth2 permissions");
            let disabled = app::disabled_permission_scopes(&current);
            self.client
                .patch(&path, &json!({ "oauth2Permissions": disabled }))
                .await?;
        }
        self.client
            .patch(&path, &json!({ "oauth2Permissions": desired }))
            .await
    }

    fn create_body(&self, d: &ResourceData, display_name: &str) -> Application {
        Application {
            display_name: Some(display_name.to_string()),
            available_to_other_tenants: Some(d.get_bool("available_to_other_tenants")),
            group_membership_claims: d.get_string("group_membership_claims"),
            homepage: d.get_string("homepage"),
            identifier_uris: Some(d.get_string_list("identifier_uris")),
            logout_url: d.get_string("logout_url"),
            oauth2_allow_implicit_flow: Some(d.get_bool("oauth2_allow_implicit_flow")),
            optional_claims: app::expand_optional_claims(d.get_list("optional_claims")),
            public_client: d.get_bool_opt("public_client"),
            reply_urls: Some(d.get_string_list("reply_urls")),
            required_resource_access: Some(app::expand_required_resource_access(
                d.get_list("required_resource_access"),
            )),
            ..Default::default()
        }
    }

    fn update_body(&self, d: &ResourceData) -> Result<Map<String, Value>> {
        let mut body = Map::new();

        if d.has_changes(&["display_name", "name"]) {
            body.insert("displayName".into(), json!(app::display_name(d)));
        }
        if d.has_change("homepage") {
            body.insert("homepage".into(), optional_string(d, "homepage"));
        }
        if d.has_change("logout_url") {
            body.insert("logoutUrl".into(), optional_string(d, "logout_url"));
        }
        if d.has_change("identifier_uris") {
            body.insert("identifierUris".into(), json!(d.get_string_list("identifier_uris")));
        }
        if d.has_change("reply_urls") {
            body.insert("replyUrls".into(), json!(d.get_string_list("reply_urls")));
        }
        if d.has_change("available_to_other_tenants") {
            body.insert(
                "availableToOtherTenants".into(),
                json!(d.get_bool("available_to_other_tenants")),
            );
        }
        if d.has_change("oauth2_allow_implicit_flow") {
            body.insert(
                "oauth2AllowImplicitFlow".into(),
                json!(d.get_bool("oauth2_allow_implicit_flow")),
            );
        }
        if d.has_change("public_client") {
            body.insert("publicClient".into(), json!(d.get_bool("public_client")));
        }
        if d.has_change("group_membership_claims") {
            body.insert(
                "groupMembershipClaims".into(),
                optional_string(d, "group_membership_claims"),
            );
        }
        if d.has_change("optional_claims") {
            let claims = app::expand_optional_claims(d.get_list("optional_claims"));
            body.insert("optionalClaims".into(), serde_json::to_value(claims)?);
        }
        if d.has_change("required_resource_access") {
            let access = app::expand_required_resource_access(d.get_list("required_resource_access"));
            body.insert("requiredResourceAccess".into(), serde_json::to_value(access)?);
        }

        if d.has_change("type") {
            match d.get_str("type") {
                TYPE_WEBAPP_API => {
                    body.insert("publicClient".into(), json!(false));
                    body.insert("identifierUris".into(), json!(d.get_string_list("identifier_uris")));
                }
                TYPE_NATIVE => {
                    body.insert("publicClient".into(), json!(true));
                    body.insert("identifierUris".into(), json!([]));
                    body.insert("homepage".into(), Value::Null);
                }
                other => {
                    return Err(Error::validation(format!(
                        "Unknown application type {other:?}. Supported types are: webapp/api, native"
                    )));
                }
            }
        }

        Ok(body)
    }
}

#[async_trait]
impl ResourceHandler for ApplicationHandler {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let display_name = app::display_name(d);
        app::validate_config(d)?;
        if d.get_bool("prevent_duplicate_names") {
            self.check_duplicate_name(&display_name, None).await?;
        }

        let created: Application = self
            .client
            .post("applications", &self.create_body(d, &display_name))
            .await
            .backend_context("Creating application", &display_name)?;
        let object_id = created
            .object_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Other("Object ID returned for application is nil/empty".into()))?;
        d.set_id(object_id.clone());
        info!(object_id = %object_id, display_name = %display_name, "created application");

        let waiter = ReplicationWaiter::new(ReplicationPolicy::new(d.remaining(Operation::Create)));
        waiter
            .wait_for_creation("application", || self.get(&object_id))
            .await
            .backend_context("Waiting for application", &object_id)?;

        let path = format!("applications/{object_id}");
        if app::is_native(d) {
            debug!(object_id = %object_id, "converting application to native");
            self.client
                .patch(
                    &path,
                    &json!({ "homepage": null, "identifierUris": [], "publicClient": true }),
                )
                .await
                .backend_context("Converting application to native", &object_id)?;
        }

        let roles = app::expand_app_roles(d.get_list("app_role"));
        if !roles.is_empty() {
            self.set_app_roles(&object_id, roles)
                .await
                .backend_context("Setting app roles for application", &object_id)?;
        }

        // Without configured scopes the directory keeps its default
        // `user_impersonation` scope.
        let scopes = app::expand_permission_scopes(d.get_list("oauth2_permissions"));
        if !scopes.is_empty() {
            self.set_permission_scopes(&object_id, scopes)
                .await
                .backend_context("Setting OAuth2 permissions for application", &object_id)?;
        }

        let owners = d.get_string_list("owners");
        if !owners.is_empty() {
            reconcile(&self.owners, &object_id, &owners)
                .await
                .backend_context("Setting owners for application", &object_id)?;
        }

        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        let application = match self.get(&object_id).await {
            Ok(a) => a,
            Err(e) if e.is_not_found() => {
                debug!(object_id = %object_id, "application was not found, removing from state");
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e).backend_context("Retrieving application", &object_id),
        };

        let owners = self
            .owners
            .list(&object_id)
            .await
            .backend_context("Retrieving owners for application", &object_id)?;

        let public_client = application.public_client.unwrap_or_default();
        d.set("object_id", &application.object_id);
        d.set("application_id", &application.app_id);
        d.set("display_name", &application.display_name);
        d.set("name", &application.display_name);
        d.set(
            "available_to_other_tenants",
            application.available_to_other_tenants.unwrap_or_default(),
        );
        d.set("group_membership_claims", &application.group_membership_claims);
        d.set("homepage", application.homepage.clone().unwrap_or_default());
        d.set("logout_url", application.logout_url.clone().unwrap_or_default());
        d.set("identifier_uris", application.identifier_uris.clone().unwrap_or_default());
        d.set("reply_urls", application.reply_urls.clone().unwrap_or_default());
        d.set(
            "oauth2_allow_implicit_flow",
            application.oauth2_allow_implicit_flow.unwrap_or_default(),
        );
        d.set("public_client", public_client);
        d.set("type", if public_client { TYPE_NATIVE } else { TYPE_WEBAPP_API });
        d.set(
            "optional_claims",
            app::flatten_optional_claims(application.optional_claims.as_ref()),
        );
        d.set(
            "required_resource_access",
            app::flatten_required_resource_access(
                application.required_resource_access.as_deref().unwrap_or_default(),
            ),
        );
        d.set(
            "app_role",
            app::flatten_app_roles(application.app_roles.as_deref().unwrap_or_default()),
        );
        d.set(
            "oauth2_permissions",
            app::flatten_permission_scopes(application.oauth2_permissions.as_deref().unwrap_or_default()),
        );
        d.set("owners", owners);
        let prevent_duplicates = d.get_bool("prevent_duplicate_names");
        d.set("prevent_duplicate_names", prevent_duplicates);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        if d.has_changes(&["display_name", "name"]) && d.get_bool("prevent_duplicate_names") {
            self.check_duplicate_name(&app::display_name(d), Some(&object_id))
                .await?;
        }
        app::validate_config(d)?;

        let body = self.update_body(d)?;
        if !body.is_empty() {
            self.client
                .patch(&format!("applications/{object_id}"), &body)
                .await
                .backend_context("Updating application", &object_id)?;
        }

        if d.has_change("app_role") {
            self.set_app_roles(&object_id, app::expand_app_roles(d.get_list("app_role")))
                .await
                .backend_context("Setting app roles for application", &object_id)?;
        }

        if d.has_change("oauth2_permissions") {
            let scopes = app::expand_permission_scopes(d.get_list("oauth2_permissions"));
            self.set_permission_scopes(&object_id, scopes)
                .await
                .backend_context("Setting OAuth2 permissions for application", &object_id)?;
        }

        if d.has_change("owners") {
            reconcile(&self.owners, &object_id, &d.get_string_list("owners"))
                .await
                .backend_context("Setting owners for application", &object_id)?;
        }

        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        let path = format!("applications/{object_id}");

        // Multi-tenant applications cannot be deleted directly
        if d.get_bool("available_to_other_tenants") {
            match self
                .client
                .patch(&path, &json!({ "availableToOtherTenants": false }))
                .await
            {
                Err(e) if e.is_not_found() => return Ok(()),
                other => other.backend_context("Updating application", &object_id)?,
            }
        }

        match self.client.delete(&path).await {
            Err(e) if e.is_not_found() => {
                debug!(object_id = %object_id, "application already deleted");
                Ok(())
            }
            other => {
                other.backend_context("Deleting application", &object_id)?;
                info!(object_id = %object_id, "deleted application");
                Ok(())
            }
        }
    }
}
