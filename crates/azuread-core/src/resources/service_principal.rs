//! `azuread_service_principal`

use crate::schema::{Attribute, Schema, Validator};

use super::application::{computed_app_roles_attribute, computed_oauth2_permissions_attribute};

pub fn schema() -> Schema {
    Schema::new()
        .attribute(
            "application_id",
            Attribute::string()
                .required()
                .force_new()
                .validate(Validator::Uuid),
        )
        .attribute("app_role_assignment_required", Attribute::bool().optional())
        .attribute("display_name", Attribute::string().computed())
        .attribute("object_id", Attribute::string().computed())
        .attribute("app_roles", computed_app_roles_attribute())
        .attribute("oauth2_permissions", computed_oauth2_permissions_attribute())
        .attribute("tags", Attribute::string_set().optional())
}
