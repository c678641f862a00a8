//! `azuread_application` on Microsoft Graph.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::reconcile::reconcile;
use azuread_core::resources::application::{
    self as app, AppRole, PermissionScope, TYPE_NATIVE, TYPE_WEBAPP_API,
};
use azuread_core::resources::APPLICATION;
use azuread_core::{
    BackendContext, Error, Operation, RelationshipApi, ReplicationPolicy, ReplicationWaiter,
    ResourceData, ResourceHandler, Result,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::client::{MsGraphClient, eq_filter};
use crate::models::{
    Application, ApplicationApi, ApplicationWeb, ImplicitGrantSettings,
    SIGN_IN_AUDIENCE_MULTIPLE_ORGS, SIGN_IN_AUDIENCE_MY_ORG,
};
use crate::relationships::DirectoryRelationship;

pub struct ApplicationHandler {
    client: Arc<MsGraphClient>,
    owners: DirectoryRelationship,
}

fn sign_in_audience(d: &ResourceData) -> &'static str {
    if d.get_bool("available_to_other_tenants") {
        SIGN_IN_AUDIENCE_MULTIPLE_ORGS
    } else {
        SIGN_IN_AUDIENCE_MY_ORG
    }
}

impl ApplicationHandler {
    pub fn new(client: Arc<MsGraphClient>) -> Self {
        Self {
            owners: DirectoryRelationship::owners(client.clone(), "applications"),
            client,
        }
    }

    async fn find_by_name(&self, display_name: &str) -> Result<Option<Application>> {
        let apps: Vec<Application> = self
            .client
            .list("/applications", Some(&eq_filter("displayName", display_name)))
            .await?;
        Ok(apps
            .into_iter()
            .find(|a| a.display_name.as_deref() == Some(display_name)))
    }

    async fn check_duplicate_name(&self, display_name: &str, own_id: Option<&str>) -> Result<()> {
        let existing = self
            .find_by_name(display_name)
            .await
            .backend_context("Checking for existing applications", display_name)?;
        match existing {
            Some(found) if own_id.is_none_or(|id| found.id.as_deref() != Some(id)) => {
                Err(Error::already_exists(
                    APPLICATION,
                    found.id.as_deref().unwrap_or("unknown"),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn get(&self, object_id: &str) -> Result<Application> {
        self.client.get(&format!("/applications/{object_id}")).await
    }

    /// Replace the role list: disable every existing role, then write the new ones
    async fn set_app_roles(&self, object_id: &str, mut desired: Vec<AppRole>) -> Result<()> {
        let current = self.get(object_id).await?.app_roles.unwrap_or_default();
        app::assign_app_role_ids(&mut desired, &current);
        if app::same_app_roles(&current, &desired) {
            return Ok(());
        }

        let path = format!("/applications/{object_id}");
        if !current.is_empty() {
            debug!(object_id, count = current.len(), "disabling app roles");
            self.client
                .patch(&path, &json!({ "appRoles": app::disabled_app_roles(&current) }))
                .await?;
        }
        self.client.patch(&path, &json!({ "appRoles": desired })).await
    }

    /// Same two-step replacement for `api.oauth2PermissionScopes`
    async fn set_permission_scopes(
        &self,
        object_id: &str,
        mut desired: Vec<PermissionScope>,
    ) -> Result<()> {
        let application = self.get(object_id).await?;
        let current = application.permission_scopes().to_vec();
        app::assign_permission_scope_ids(&mut desired, &current);
        if app::same_permission_scopes(&current, &desired) {
            return Ok(());
        }

        let path = format!("/applications/{object_id}");
        if !current.is_empty() {
            debug!(object_id, count = current.len(), "disabling permission scopes");
            let disabled = app::disabled_permission_scopes(&current);
            self.client
                .patch(&path, &json!({ "api": { "oauth2PermissionScopes": disabled } }))
                .await?;
        }
        self.client
            .patch(&path, &json!({ "api": { "oauth2PermissionScopes": desired } }))
            .await
    }

    fn create_body(&self, d: &ResourceData, display_name: &str) -> Application {
        let native = app::is_native(d);

        let mut app_roles = app::expand_app_roles(d.get_list("app_role"));
        app::assign_app_role_ids(&mut app_roles, &[]);

        let mut scopes = app::expand_permission_scopes(d.get_list("oauth2_permissions"));
        if scopes.is_empty() {
            scopes.push(app::default_user_impersonation_scope(display_name));
        }
        app::assign_permission_scope_ids(&mut scopes, &[]);

        Application {
            display_name: Some(display_name.to_string()),
            api: Some(ApplicationApi {
                oauth2_permission_scopes: Some(scopes),
            }),
            app_roles: (!app_roles.is_empty()).then_some(app_roles),
            group_membership_claims: d.get_string("group_membership_claims"),
            identifier_uris: Some(if native {
                Vec::new()
            } else {
                d.get_string_list("identifier_uris")
            }),
            is_fallback_public_client: if native {
                Some(true)
            } else {
                d.get_bool_opt("public_client")
            },
            optional_claims: Some(
                app::expand_optional_claims(d.get_list("optional_claims")).unwrap_or_default(),
            ),
            required_resource_access: Some(app::expand_required_resource_access(
                d.get_list("required_resource_access"),
            )),
            sign_in_audience: Some(sign_in_audience(d).to_string()),
            web: Some(ApplicationWeb {
                home_page_url: if native { None } else { d.get_string("homepage") },
                logout_url: d.get_string("logout_url"),
                redirect_uris: Some(d.get_string_list("reply_urls")),
                implicit_grant_settings: Some(ImplicitGrantSettings {
                    enable_access_token_issuance: Some(d.get_bool("oauth2_allow_implicit_flow")),
                }),
            }),
            ..Default::default()
        }
    }

    fn update_body(&self, d: &ResourceData) -> Result<Map<String, Value>> {
        let mut body = Map::new();
        let mut web = Map::new();

        if d.has_changes(&["display_name", "name"]) {
            body.insert("displayName".into(), json!(app::display_name(d)));
        }
        if d.has_change("available_to_other_tenants") {
            body.insert("signInAudience".into(), json!(sign_in_audience(d)));
        }
        if d.has_change("group_membership_claims") {
            body.insert(
                "groupMembershipClaims".into(),
                d.get_string("group_membership_claims").map_or(Value::Null, Value::String),
            );
        }
        if d.has_change("identifier_uris") {
            body.insert("identifierUris".into(), json!(d.get_string_list("identifier_uris")));
        }
        if d.has_change("public_client") {
            body.insert("isFallbackPublicClient".into(), json!(d.get_bool("public_client")));
        }
        if d.has_change("optional_claims") {
            let claims = app::expand_optional_claims(d.get_list("optional_claims")).unwrap_or_default();
            body.insert("optionalClaims".into(), serde_json::to_value(claims)?);
        }
        if d.has_change("required_resource_access") {
            let access = app::expand_required_resource_access(d.get_list("required_resource_access"));
            body.insert("requiredResourceAccess".into(), serde_json::to_value(access)?);
        }
        if d.has_change("homepage") {
            web.insert(
                "homePageUrl".into(),
                d.get_string("homepage").map_or(Value::Null, Value::String),
            );
        }
        if d.has_change("logout_url") {
            web.insert(
                "logoutUrl".into(),
                d.get_string("logout_url").map_or(Value::Null, Value::String),
            );
        }
        if d.has_change("reply_urls") {
            web.insert("redirectUris".into(), json!(d.get_string_list("reply_urls")));
        }
        if d.has_change("oauth2_allow_implicit_flow") {
            web.insert(
                "implicitGrantSettings".into(),
                json!({ "enableAccessTokenIssuance": d.get_bool("oauth2_allow_implicit_flow") }),
            );
        }

        if d.has_change("type") {
            match d.get_str("type") {
                TYPE_WEBAPP_API => {
                    body.insert("isFallbackPublicClient".into(), json!(false));
                    body.insert("identifierUris".into(), json!(d.get_string_list("identifier_uris")));
                }
                TYPE_NATIVE => {
                    body.insert("isFallbackPublicClient".into(), json!(true));
                    body.insert("identifierUris".into(), json!([]));
                }
                other => {
                    return Err(Error::validation(format!(
                        "Unknown application type {other:?}. Supported types are: webapp/api, native"
                    )));
                }
            }
        }

        if !web.is_empty() {
            body.insert("web".into(), Value::Object(web));
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

        let body = self.create_body(d, &display_name);
        let created: Application = self
            .client
            .post("/applications", &body)
            .await
            .backend_context("Creating application", &display_name)?;
        let object_id = created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Other("Object ID returned for application is nil/empty".into()))?;
        d.set_id(object_id.clone());
        info!(object_id = %object_id, display_name = %display_name, "created application");

        let waiter = ReplicationWaiter::new(ReplicationPolicy::new(d.remaining(Operation::Create)));
        waiter
            .wait_for_creation("application", || self.get(&object_id))
            .await
            .backend_context("Waiting for application", &object_id)?;

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

        let web = application.web.clone().unwrap_or_default();
        let public_client = application.is_fallback_public_client.unwrap_or_default();

        d.set("object_id", &application.id);
        d.set("application_id", &application.app_id);
        d.set("display_name", &application.display_name);
        d.set("name", &application.display_name);
        d.set("available_to_other_tenants", application.available_to_other_tenants());
        d.set("group_membership_claims", &application.group_membership_claims);
        d.set("identifier_uris", application.identifier_uris.clone().unwrap_or_default());
        d.set("optional_claims", app::flatten_optional_claims(application.optional_claims.as_ref()));
        d.set("public_client", public_client);
        d.set("type", if public_client { TYPE_NATIVE } else { TYPE_WEBAPP_API });
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
            app::flatten_permission_scopes(application.permission_scopes()),
        );
        d.set("homepage", web.home_page_url.unwrap_or_default());
        d.set("logout_url", web.logout_url.unwrap_or_default());
        d.set("reply_urls", web.redirect_uris.unwrap_or_default());
        d.set(
            "oauth2_allow_implicit_flow",
            web.implicit_grant_settings
                .and_then(|s| s.enable_access_token_issuance)
                .unwrap_or_default(),
        );
        d.set("owners", owners);
        let prevent_duplicates = d.get_bool("prevent_duplicate_names");
        d.set("prevent_duplicate_names", prevent_duplicates);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.id().to_string();
        let display_name = app::display_name(d);
        if d.has_changes(&["display_name", "name"]) && d.get_bool("prevent_duplicate_names") {
            self.check_duplicate_name(&display_name, Some(&object_id)).await?;
        }
        app::validate_config(d)?;

        let body = self.update_body(d)?;
        if !body.is_empty() {
            self.client
                .patch(&format!("/applications/{object_id}"), &body)
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
                .backend_context("Setting OAuth2 permission scopes for application", &object_id)?;
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
        let path = format!("/applications/{object_id}");

        if d.get_bool("available_to_other_tenants") {
            debug!(object_id = %object_id, "restricting application to its own tenant before deletion");
            match self
                .client
                .patch(&path, &json!({ "signInAudience": SIGN_IN_AUDIENCE_MY_ORG }))
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
