//! User-facing resource and data source definitions.
//!
//! Schemas and the field mapping that does not depend on the API generation
//! live here. Both backend crates build their request payloads from these
//! helpers so the attribute surface is identical whichever backend runs.

pub mod application;
pub mod credential;
pub mod group;
pub mod group_member;
pub mod service_principal;
pub mod user;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use sha2::{Digest, Sha256};

use crate::ids::{CredentialId, GroupMemberId, validate_object_id};
use crate::schema::Schema;
use crate::{Error, Result};

pub const APPLICATION: &str = "azuread_application";
pub const APPLICATION_PASSWORD: &str = "azuread_application_password";
pub const GROUP: &str = "azuread_group";
pub const GROUPS: &str = "azuread_groups";
pub const GROUP_MEMBER: &str = "azuread_group_member";
pub const SERVICE_PRINCIPAL: &str = "azuread_service_principal";
pub const SERVICE_PRINCIPAL_PASSWORD: &str = "azuread_service_principal_password";
pub const USER: &str = "azuread_user";
pub const USERS: &str = "azuread_users";

/// Managed resource types
pub const RESOURCE_TYPES: &[&str] = &[
    APPLICATION,
    APPLICATION_PASSWORD,
    GROUP,
    GROUP_MEMBER,
    SERVICE_PRINCIPAL,
    SERVICE_PRINCIPAL_PASSWORD,
];

/// Data source types
pub const DATA_SOURCE_TYPES: &[&str] = &[GROUP, GROUPS, USER, USERS];

/// Schema of a managed resource type
pub fn resource_schema(type_name: &str) -> Option<Schema> {
    match type_name {
        APPLICATION => Some(application::schema()),
        APPLICATION_PASSWORD => Some(credential::password_schema("application_object_id")),
        GROUP => Some(group::schema()),
        GROUP_MEMBER => Some(group_member::schema()),
        SERVICE_PRINCIPAL => Some(service_principal::schema()),
        SERVICE_PRINCIPAL_PASSWORD => Some(credential::password_schema("service_principal_id")),
        _ => None,
    }
}

/// Schema of a data source type
pub fn data_source_schema(type_name: &str) -> Option<Schema> {
    match type_name {
        GROUP => Some(group::data_source_schema()),
        GROUPS => Some(group::groups_data_source_schema()),
        USER => Some(user::data_source_schema()),
        USERS => Some(user::users_data_source_schema()),
        _ => None,
    }
}

/// Check an ID handed to `import` before anything is read
pub fn validate_import_id(type_name: &str, id: &str) -> Result<()> {
    match type_name {
        APPLICATION | GROUP | SERVICE_PRINCIPAL => validate_object_id(id),
        GROUP_MEMBER => GroupMemberId::parse(id)?.validate(),
        APPLICATION_PASSWORD | SERVICE_PRINCIPAL_PASSWORD => {
            CredentialId::parse_password(id)?.validate()
        }
        other => Err(Error::config(format!("resource type {other:?} does not support import"))),
    }
}

/// Deterministic ID for list data sources: `prefix#` + base64url(sha256(parts joined by "-"))
pub fn hashed_id(prefix: &str, parts: &[String]) -> String {
    let digest = Sha256::digest(parts.join("-").as_bytes());
    format!("{prefix}#{}", URL_SAFE.encode(digest))
}
