//! `azuread_group_member`: a single membership managed on its own.

use crate::schema::{Attribute, Schema, Validator};

pub fn schema() -> Schema {
    Schema::new()
        .attribute(
            "group_object_id",
            Attribute::string()
                .required()
                .force_new()
                .validate(Validator::Uuid),
        )
        .attribute(
            "member_object_id",
            Attribute::string()
                .required()
                .force_new()
                .validate(Validator::Uuid),
        )
}
