//! `azuread_application`: schema and backend-neutral field mapping.
//!
//! App roles, permission scopes, required resource access and optional
//! claims have the same JSON shape on both API generations, so their models
//! live here and both backends embed them in their application payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema, Validator};
use crate::{Error, Result};

pub const TYPE_WEBAPP_API: &str = "webapp/api";
pub const TYPE_NATIVE: &str = "native";

pub const GROUP_MEMBERSHIP_CLAIMS: &[&str] =
    &["All", "None", "SecurityGroup", "DirectoryRole", "ApplicationGroup"];

const OPTIONAL_CLAIM_PROPERTIES: &[&str] = &[
    "dns_domain_and_sam_account_name",
    "emit_as_roles",
    "netbios_domain_and_sam_account_name",
    "sam_account_name",
];

pub fn schema() -> Schema {
    Schema::new()
        .attribute(
            "display_name",
            Attribute::string()
                .optional()
                .computed()
                .exactly_one_of(&["name"])
                .validate(Validator::NoEmptyStrings),
        )
        .attribute(
            "name",
            Attribute::string()
                .optional()
                .computed()
                .deprecated("This property has been renamed to `display_name` and will be removed in a future release.")
                .exactly_one_of(&["display_name"])
                .validate(Validator::NoEmptyStrings),
        )
        .attribute("available_to_other_tenants", Attribute::bool().optional())
        .attribute(
            "group_membership_claims",
            Attribute::string()
                .optional()
                .validate(Validator::StringInSlice(GROUP_MEMBERSHIP_CLAIMS)),
        )
        .attribute(
            "homepage",
            Attribute::string()
                .optional()
                .computed()
                .validate(Validator::UrlIsHttpOrHttps),
        )
        .attribute(
            "identifier_uris",
            Attribute::string_list()
                .optional()
                .computed()
                .validate(Validator::UrlIsAppUri),
        )
        .attribute(
            "logout_url",
            Attribute::string()
                .optional()
                .validate(Validator::UrlIsHttpOrHttps),
        )
        .attribute("oauth2_allow_implicit_flow", Attribute::bool().optional())
        .attribute("public_client", Attribute::bool().optional().computed())
        .attribute(
            "reply_urls",
            Attribute::string_set()
                .optional()
                .computed()
                .validate(Validator::NoEmptyStrings),
        )
        .attribute(
            "type",
            Attribute::string()
                .optional()
                .default(TYPE_WEBAPP_API)
                .validate(Validator::StringInSlice(&[TYPE_WEBAPP_API, TYPE_NATIVE])),
        )
        .attribute("app_role", Attribute::block_set(app_role_schema()).optional().computed())
        .attribute(
            "oauth2_permissions",
            Attribute::block_set(oauth2_permission_schema()).optional().computed(),
        )
        .attribute(
            "optional_claims",
            Attribute::block_list(
                Schema::new()
                    .attribute("access_token", optional_claims_attribute())
                    .attribute("id_token", optional_claims_attribute()),
            )
            .optional()
            .max_items(1),
        )
        .attribute(
            "required_resource_access",
            Attribute::block_set(
                Schema::new()
                    .attribute("resource_app_id", Attribute::string().required())
                    .attribute(
                        "resource_access",
                        Attribute::block_list(
                            Schema::new()
                                .attribute(
                                    "id",
                                    Attribute::string().required().validate(Validator::Uuid),
                                )
                                .attribute(
                                    "type",
                                    Attribute::string()
                                        .required()
                                        .validate(Validator::StringInSlice(&["Scope", "Role"])),
                                ),
                        )
                        .required(),
                    ),
            )
            .optional(),
        )
        .attribute(
            "owners",
            Attribute::string_set()
                .optional()
                .computed()
                .validate(Validator::NoEmptyStrings),
        )
        .attribute("application_id", Attribute::string().computed())
        .attribute("object_id", Attribute::string().computed())
        .attribute("prevent_duplicate_names", Attribute::bool().optional().default(false))
}

fn app_role_schema() -> Schema {
    Schema::new()
        .attribute("id", Attribute::string().computed())
        .attribute(
            "allowed_member_types",
            Attribute::string_set()
                .required()
                .min_items(1)
                .validate(Validator::StringInSlice(&["User", "Application"])),
        )
        .attribute(
            "description",
            Attribute::string().required().validate(Validator::NoEmptyStrings),
        )
        .attribute(
            "display_name",
            Attribute::string().required().validate(Validator::NoEmptyStrings),
        )
        .attribute("is_enabled", Attribute::bool().optional().default(true))
        .attribute("value", Attribute::string().optional().computed())
}

fn oauth2_permission_schema() -> Schema {
    Schema::new()
        .attribute(
            "admin_consent_description",
            Attribute::string()
                .optional()
                .computed()
                .validate(Validator::NoEmptyStrings),
        )
        .attribute(
            "admin_consent_display_name",
            Attribute::string()
                .optional()
                .computed()
                .validate(Validator::NoEmptyStrings),
        )
        .attribute("id", Attribute::string().computed())
        .attribute("is_enabled", Attribute::bool().optional().computed())
        .attribute(
            "type",
            Attribute::string()
                .optional()
                .computed()
                .validate(Validator::StringInSlice(&["Admin", "User"])),
        )
        .attribute("user_consent_description", Attribute::string().optional().computed())
        .attribute("user_consent_display_name", Attribute::string().optional().computed())
        .attribute(
            "value",
            Attribute::string()
                .optional()
                .computed()
                .validate(Validator::NoEmptyStrings),
        )
}

fn optional_claims_attribute() -> Attribute {
    Attribute::block_list(
        Schema::new()
            .attribute("name", Attribute::string().required().validate(Validator::NoEmptyStrings))
            .attribute(
                "source",
                Attribute::string()
                    .optional()
                    .validate(Validator::StringInSlice(&["user"])),
            )
            .attribute("essential", Attribute::bool().optional())
            .attribute(
                "additional_properties",
                Attribute::string_list()
                    .optional()
                    .validate(Validator::StringInSlice(OPTIONAL_CLAIM_PROPERTIES)),
            ),
    )
    .optional()
}

/// Computed copies of the app role / scope blocks, exposed by service principals
pub fn computed_app_roles_attribute() -> Attribute {
    let mut nested = Schema::new();
    for key in ["id", "description", "display_name", "value"] {
        nested = nested.attribute(key, Attribute::string().computed());
    }
    nested = nested
        .attribute("allowed_member_types", Attribute::string_set().computed())
        .attribute("is_enabled", Attribute::bool().computed());
    Attribute::block_set(nested).computed()
}

pub fn computed_oauth2_permissions_attribute() -> Attribute {
    let mut nested = Schema::new();
    for key in [
        "admin_consent_description",
        "admin_consent_display_name",
        "id",
        "type",
        "user_consent_description",
        "user_consent_display_name",
        "value",
    ] {
        nested = nested.attribute(key, Attribute::string().computed());
    }
    nested = nested.attribute("is_enabled", Attribute::bool().computed());
    Attribute::block_set(nested).computed()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRole {
    #[serde(default)]
    pub allowed_member_types: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// OAuth2 permission scope (`oauth2Permissions` on AAD Graph,
/// `api.oauth2PermissionScopes` on MS Graph)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionScope {
    #[serde(default)]
    pub admin_consent_description: Option<String>,
    #[serde(default)]
    pub admin_consent_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default, rename = "type")]
    pub scope_type: Option<String>,
    #[serde(default)]
    pub user_consent_description: Option<String>,
    #[serde(default)]
    pub user_consent_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredResourceAccess {
    pub resource_app_id: String,
    #[serde(default)]
    pub resource_access: Vec<ResourceAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAccess {
    pub id: String,
    #[serde(rename = "type")]
    pub access_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalClaims {
    #[serde(default)]
    pub access_token: Vec<OptionalClaim>,
    #[serde(default)]
    pub id_token: Vec<OptionalClaim>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalClaim {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub essential: bool,
    #[serde(default)]
    pub additional_properties: Vec<String>,
}

/// `display_name`, falling back to the deprecated `name`
pub fn display_name(d: &ResourceData) -> String {
    d.get_string("display_name")
        .or_else(|| d.get_string("name"))
        .unwrap_or_default()
}

/// Whether the configured type is `native`
pub fn is_native(d: &ResourceData) -> bool {
    d.get_str("type") == TYPE_NATIVE
}

/// Checks that need no API call: native apps cannot have identifier URIs and
/// role / scope values must be unique across both collections.
pub fn validate_config(d: &ResourceData) -> Result<()> {
    if is_native(d) && !d.get_list("identifier_uris").is_empty() {
        return Err(Error::conflict(
            "identifier_uris is not required for a native application",
        ));
    }
    validate_roles_scopes(d.get_list("app_role"), d.get_list("oauth2_permissions"))
}

pub fn validate_roles_scopes(app_roles: &[Value], scopes: &[Value]) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for block in app_roles.iter().chain(scopes) {
        let Some(value) = block.get("value").and_then(Value::as_str) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if seen.contains(&value) {
            return Err(Error::conflict(format!(
                "validation failed: duplicate value found: {value:?}"
            )));
        }
        seen.push(value);
    }
    Ok(())
}

fn block_str(block: &Map<String, Value>, key: &str) -> Option<String> {
    block
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn block_strings(block: &Map<String, Value>, key: &str) -> Vec<String> {
    let mut items: Vec<String> = block
        .get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    items.sort();
    items
}

fn block_bool(block: &Map<String, Value>, key: &str, default: bool) -> bool {
    block.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn expand_app_roles(blocks: &[Value]) -> Vec<AppRole> {
    blocks
        .iter()
        .filter_map(Value::as_object)
        .map(|b| AppRole {
            allowed_member_types: block_strings(b, "allowed_member_types"),
            description: block_str(b, "description"),
            display_name: block_str(b, "display_name"),
            id: block_str(b, "id"),
            is_enabled: block_bool(b, "is_enabled", true),
            value: block_str(b, "value"),
        })
        .collect()
}

pub fn flatten_app_roles(roles: &[AppRole]) -> Vec<Value> {
    roles
        .iter()
        .map(|r| {
            let mut types = r.allowed_member_types.clone();
            types.sort();
            json!({
                "id": r.id.clone().unwrap_or_default(),
                "allowed_member_types": types,
                "description": r.description.clone().unwrap_or_default(),
                "display_name": r.display_name.clone().unwrap_or_default(),
                "is_enabled": r.is_enabled,
                "value": r.value.clone().unwrap_or_default(),
            })
        })
        .collect()
}

pub fn expand_permission_scopes(blocks: &[Value]) -> Vec<PermissionScope> {
    blocks
        .iter()
        .filter_map(Value::as_object)
        .map(|b| PermissionScope {
            admin_consent_description: block_str(b, "admin_consent_description"),
            admin_consent_display_name: block_str(b, "admin_consent_display_name"),
            id: block_str(b, "id"),
            is_enabled: block_bool(b, "is_enabled", true),
            scope_type: block_str(b, "type"),
            user_consent_description: block_str(b, "user_consent_description"),
            user_consent_display_name: block_str(b, "user_consent_display_name"),
            value: block_str(b, "value"),
        })
        .collect()
}

pub fn flatten_permission_scopes(scopes: &[PermissionScope]) -> Vec<Value> {
    scopes
        .iter()
        .map(|s| {
            json!({
                "admin_consent_description": s.admin_consent_description.clone().unwrap_or_default(),
                "admin_consent_display_name": s.admin_consent_display_name.clone().unwrap_or_default(),
                "id": s.id.clone().unwrap_or_default(),
                "is_enabled": s.is_enabled,
                "type": s.scope_type.clone().unwrap_or_default(),
                "user_consent_description": s.user_consent_description.clone().unwrap_or_default(),
                "user_consent_display_name": s.user_consent_display_name.clone().unwrap_or_default(),
                "value": s.value.clone().unwrap_or_default(),
            })
        })
        .collect()
}

pub fn expand_required_resource_access(blocks: &[Value]) -> Vec<RequiredResourceAccess> {
    blocks
        .iter()
        .filter_map(Value::as_object)
        .map(|b| RequiredResourceAccess {
            resource_app_id: block_str(b, "resource_app_id").unwrap_or_default(),
            resource_access: b
                .get("resource_access")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|a| ResourceAccess {
                            id: block_str(a, "id").unwrap_or_default(),
                            access_type: block_str(a, "type").unwrap_or_default(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

pub fn flatten_required_resource_access(items: &[RequiredResourceAccess]) -> Vec<Value> {
    items
        .iter()
        .map(|r| {
            json!({
                "resource_app_id": r.resource_app_id,
                "resource_access": r.resource_access.iter().map(|a| json!({
                    "id": a.id,
                    "type": a.access_type,
                })).collect::<Vec<_>>(),
            })
        })
        .collect()
}

/// `None` when the block is absent so the payload leaves claims untouched
pub fn expand_optional_claims(blocks: &[Value]) -> Option<OptionalClaims> {
    let block = blocks.first()?.as_object()?;
    let claims = |key: &str| -> Vec<OptionalClaim> {
        block
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|c| OptionalClaim {
                        name: block_str(c, "name").unwrap_or_default(),
                        source: block_str(c, "source"),
                        essential: block_bool(c, "essential", false),
                        additional_properties: c
                            .get("additional_properties")
                            .and_then(Value::as_array)
                            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    };
    Some(OptionalClaims {
        access_token: claims("access_token"),
        id_token: claims("id_token"),
    })
}

pub fn flatten_optional_claims(claims: Option<&OptionalClaims>) -> Vec<Value> {
    let Some(claims) = claims else {
        return Vec::new();
    };
    if claims.access_token.is_empty() && claims.id_token.is_empty() {
        return Vec::new();
    }
    let flatten = |items: &[OptionalClaim]| -> Vec<Value> {
        items
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "source": c.source.clone().unwrap_or_default(),
                    "essential": c.essential,
                    "additional_properties": c.additional_properties,
                })
            })
            .collect()
    };
    vec![json!({
        "access_token": flatten(&claims.access_token),
        "id_token": flatten(&claims.id_token),
    })]
}

/// Fill missing role IDs, reusing the ID of an existing role with the same
/// value so unchanged roles are not recreated.
pub fn assign_app_role_ids(desired: &mut [AppRole], existing: &[AppRole]) {
    for role in desired.iter_mut().filter(|r| r.id.is_none()) {
        role.id = existing
            .iter()
            .find(|e| e.value.is_some() && e.value == role.value)
            .and_then(|e| e.id.clone())
            .or_else(|| Some(Uuid::new_v4().to_string()));
    }
}

/// Same as [`assign_app_role_ids`] for permission scopes
pub fn assign_permission_scope_ids(desired: &mut [PermissionScope], existing: &[PermissionScope]) {
    for scope in desired.iter_mut().filter(|s| s.id.is_none()) {
        scope.id = existing
            .iter()
            .find(|e| e.value.is_some() && e.value == scope.value)
            .and_then(|e| e.id.clone())
            .or_else(|| Some(Uuid::new_v4().to_string()));
    }
}

/// Order-insensitive equality of role lists
pub fn same_app_roles(a: &[AppRole], b: &[AppRole]) -> bool {
    sorted_by_id(a, |r| r.id.clone()) == sorted_by_id(b, |r| r.id.clone())
}

/// Order-insensitive equality of scope lists
pub fn same_permission_scopes(a: &[PermissionScope], b: &[PermissionScope]) -> bool {
    sorted_by_id(a, |s| s.id.clone()) == sorted_by_id(b, |s| s.id.clone())
}

fn sorted_by_id<T: Clone>(items: &[T], id: impl Fn(&T) -> Option<String>) -> Vec<T> {
    let mut items = items.to_vec();
    items.sort_by_key(|item| id(item));
    items
}

/// Copies with `is_enabled` cleared; entries must be disabled before they
/// can be changed or removed.
pub fn disabled_app_roles(roles: &[AppRole]) -> Vec<AppRole> {
    roles
        .iter()
        .cloned()
        .map(|mut r| {
            r.is_enabled = false;
            r
        })
        .collect()
}

pub fn disabled_permission_scopes(scopes: &[PermissionScope]) -> Vec<PermissionScope> {
    scopes
        .iter()
        .cloned()
        .map(|mut s| {
            s.is_enabled = false;
            s
        })
        .collect()
}

/// Scope created for new applications that configure none
pub fn default_user_impersonation_scope(display_name: &str) -> PermissionScope {
    let description = format!(
        "Allow the application to access {display_name} on behalf of the signed-in user."
    );
    let title = format!("Access {display_name}");
    PermissionScope {
        admin_consent_description: Some(description.clone()),
        admin_consent_display_name: Some(title.clone()),
        id: Some(Uuid::new_v4().to_string()),
        is_enabled: true,
        scope_type: Some("User".to_string()),
        user_consent_description: Some(description),
        user_consent_display_name: Some(title),
        value: Some("user_impersonation".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(value: &str) -> Value {
        json!({
            "allowed_member_types": ["User", "Application"],
            "description": "d",
            "display_name": value,
            "is_enabled": true,
            "value": value,
        })
    }

    fn data(planned: Value) -> ResourceData {
        ResourceData::new("azuread_application", "", planned.as_object().cloned().unwrap(), Map::new())
    }

    #[test]
    fn duplicate_values_across_roles_and_scopes_conflict() {
        let scopes = vec![json!({"value": "read"})];
        let err = validate_roles_scopes(&[role("read")], &scopes).unwrap_err();
        assert!(matches!(err, Error::ValidationConflict(_)));
        assert!(validate_roles_scopes(&[role("read"), role("write")], &[]).is_ok());
    }

    #[test]
    fn empty_values_are_not_duplicates() {
        let roles = vec![json!({"value": ""}), json!({"value": ""})];
        assert!(validate_roles_scopes(&roles, &[]).is_ok());
    }

    #[test]
    fn native_apps_reject_identifier_uris() {
        let d = data(json!({"type": "native", "identifier_uris": ["api://x"]}));
        assert!(validate_config(&d).is_err());
        let d = data(json!({"type": "webapp/api", "identifier_uris": ["api://x"]}));
        assert!(validate_config(&d).is_ok());
    }

    #[test]
    fn display_name_falls_back_to_name() {
        assert_eq!(display_name(&data(json!({"name": "legacy"}))), "legacy");
        assert_eq!(display_name(&data(json!({"display_name": "new", "name": "legacy"}))), "new");
    }

    #[test]
    fn app_roles_expand_and_flatten() {
        let roles = expand_app_roles(&[role("admin")]);
        assert_eq!(roles[0].allowed_member_types, vec!["Application", "User"]);
        assert_eq!(roles[0].id, None);
        let flat = flatten_app_roles(&roles);
        assert_eq!(flat[0]["value"], json!("admin"));
        assert_eq!(flat[0]["id"], json!(""));
    }

    #[test]
    fn ids_are_reused_by_value() {
        let existing = vec![AppRole {
            id: Some("11111111-1111-1111-1111-111111111111".into()),
            value: Some("admin".into()),
            ..Default::default()
        }];
        let mut desired = expand_app_roles(&[role("admin"), role("reader")]);
        assign_app_role_ids(&mut desired, &existing);
        assert_eq!(desired[0].id.as_deref(), Some("11111111-1111-1111-1111-111111111111"));
        assert!(desired[1].id.is_some());
        assert_ne!(desired[1].id, desired[0].id);
    }

    #[test]
    fn role_equality_ignores_order() {
        let a = AppRole { id: Some("a".into()), is_enabled: true, ..Default::default() };
        let b = AppRole { id: Some("b".into()), is_enabled: true, ..Default::default() };
        assert!(same_app_roles(&[a.clone(), b.clone()], &[b.clone(), a.clone()]));
        assert!(!same_app_roles(&[a.clone()], &disabled_app_roles(&[a])));
    }

    #[test]
    fn optional_claims_round_trip_through_blocks() {
        let blocks = vec![json!({
            "access_token": [{"name": "groups", "essential": true, "additional_properties": ["emit_as_roles"]}],
            "id_token": [],
        })];
        let claims = expand_optional_claims(&blocks).unwrap();
        assert_eq!(claims.access_token[0].name, "groups");
        assert!(claims.access_token[0].essential);
        let flat = flatten_optional_claims(Some(&claims));
        assert_eq!(flat[0]["access_token"][0]["additional_properties"], json!(["emit_as_roles"]));
        assert!(expand_optional_claims(&[]).is_none());
    }

    #[test]
    fn default_scope_mentions_app() {
        let scope = default_user_impersonation_scope("billing");
        assert_eq!(scope.value.as_deref(), Some("user_impersonation"));
        assert_eq!(scope.admin_consent_display_name.as_deref(), Some("Access billing"));
        assert!(scope.is_enabled);
    }

    #[test]
    fn schema_defaults_type_and_flags() {
        let s = schema();
        assert_eq!(s.get("type").unwrap().default, Some(json!("webapp/api")));
        assert!(s.get("reply_urls").unwrap().is_set());
    }
}
