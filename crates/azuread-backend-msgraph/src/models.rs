//! Microsoft Graph payloads.
//!
//! Every field is optional and skipped when unset so the same types serve
//! as create bodies and GET responses.

use azuread_core::resources::application::{
    AppRole, OptionalClaims, PermissionScope, RequiredResourceAccess,
};
use azuread_core::traits::{DirectoryGroup, DirectoryUser};
use serde::{Deserialize, Serialize};

pub const SIGN_IN_AUDIENCE_MY_ORG: &str = "AzureADMyOrg";
pub const SIGN_IN_AUDIENCE_MULTIPLE_ORGS: &str = "AzureADMultipleOrgs";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApplicationApi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_roles: Option<Vec<AppRole>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_membership_claims: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fallback_public_client: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_claims: Option<OptionalClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_resource_access: Option<Vec<RequiredResourceAccess>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_in_audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<ApplicationWeb>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationApi {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth2_permission_scopes: Option<Vec<PermissionScope>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationWeb {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit_grant_settings: Option<ImplicitGrantSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplicitGrantSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_access_token_issuance: Option<bool>,
}

impl Application {
    pub fn permission_scopes(&self) -> &[PermissionScope] {
        self.api
            .as_ref()
            .and_then(|api| api.oauth2_permission_scopes.as_deref())
            .unwrap_or_default()
    }

    pub fn available_to_other_tenants(&self) -> bool {
        self.sign_in_audience.as_deref() == Some(SIGN_IN_AUDIENCE_MULTIPLE_ORGS)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_enabled: Option<bool>,
}

impl From<Group> for DirectoryGroup {
    fn from(group: Group) -> Self {
        DirectoryGroup {
            object_id: group.id.unwrap_or_default(),
            display_name: group.display_name.unwrap_or_default(),
            description: group.description,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_role_assignment_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_roles: Option<Vec<AppRole>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth2_permission_scopes: Option<Vec<PermissionScope>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub user_principal_name: String,
    #[serde(default)]
    pub account_enabled: Option<bool>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub mail_nickname: Option<String>,
    #[serde(default)]
    pub on_premises_immutable_id: Option<String>,
    #[serde(default)]
    pub on_premises_sam_account_name: Option<String>,
    #[serde(default)]
    pub on_premises_user_principal_name: Option<String>,
    #[serde(default)]
    pub usage_location: Option<String>,
}

impl From<User> for DirectoryUser {
    fn from(user: User) -> Self {
        DirectoryUser {
            object_id: user.id,
            user_principal_name: user.user_principal_name,
            account_enabled: user.account_enabled.unwrap_or_default(),
            display_name: user.display_name,
            immutable_id: user.on_premises_immutable_id,
            mail: user.mail,
            mail_nickname: user.mail_nickname,
            onpremises_sam_account_name: user.on_premises_sam_account_name,
            onpremises_user_principal_name: user.on_premises_user_principal_name,
            usage_location: user.usage_location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn application_round_trips_graph_field_names() {
        let app: Application = serde_json::from_value(json!({
            "id": "obj",
            "appId": "app",
            "signInAudience": "AzureADMultipleOrgs",
            "isFallbackPublicClient": true,
            "api": {"oauth2PermissionScopes": [{"value": "user_impersonation", "isEnabled": true}]},
            "web": {"homePageUrl": "https://example.com", "implicitGrantSettings": {"enableAccessTokenIssuance": false}},
        }))
        .unwrap();

        assert!(app.available_to_other_tenants());
        assert_eq!(app.permission_scopes().len(), 1);
        let body = serde_json::to_value(&app).unwrap();
        assert_eq!(body["web"]["homePageUrl"], json!("https://example.com"));
        assert!(body.get("identifierUris").is_none());
    }

    #[test]
    fn users_map_onto_directory_users() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "userPrincipalName": "a@example.com",
            "accountEnabled": true,
            "onPremisesSamAccountName": "alice",
        }))
        .unwrap();
        let user = DirectoryUser::from(user);
        assert_eq!(user.onpremises_sam_account_name.as_deref(), Some("alice"));
        assert!(user.account_enabled);
    }
}
