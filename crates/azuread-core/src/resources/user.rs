//! `azuread_user` and `azuread_users` data sources.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema, Validator};
use crate::traits::{DataSourceHandler, DirectoryUser, UserDirectory};
use crate::{Error, Result};

use super::hashed_id;

const USER_LOOKUPS: &[&str] = &["mail", "mail_nickname", "object_id", "user_principal_name"];
const USERS_LOOKUPS: &[&str] = &["object_ids", "user_principal_names", "mail_nicknames"];

const COMPUTED_USER_FIELDS: &[&str] = &[
    "display_name",
    "immutable_id",
    "onpremises_sam_account_name",
    "onpremises_user_principal_name",
    "usage_location",
];

pub fn data_source_schema() -> Schema {
    let mut schema = Schema::new()
        .attribute(
            "object_id",
            Attribute::string()
                .optional()
                .computed()
                .exactly_one_of(USER_LOOKUPS)
                .validate(Validator::Uuid),
        )
        .attribute(
            "user_principal_name",
            lookup_attribute().exactly_one_of(USER_LOOKUPS),
        )
        .attribute("mail", lookup_attribute().exactly_one_of(USER_LOOKUPS))
        .attribute("mail_nickname", lookup_attribute().exactly_one_of(USER_LOOKUPS))
        .attribute("account_enabled", Attribute::bool().computed());
    for field in COMPUTED_USER_FIELDS {
        schema = schema.attribute(*field, Attribute::string().computed());
    }
    schema
}

fn lookup_attribute() -> Attribute {
    Attribute::string()
        .optional()
        .computed()
        .validate(Validator::NoEmptyStrings)
}

pub fn users_data_source_schema() -> Schema {
    let mut user = Schema::new()
        .attribute("account_enabled", Attribute::bool().computed())
        .attribute("mail", Attribute::string().computed())
        .attribute("mail_nickname", Attribute::string().computed())
        .attribute("object_id", Attribute::string().computed())
        .attribute("user_principal_name", Attribute::string().computed());
    for field in COMPUTED_USER_FIELDS {
        user = user.attribute(*field, Attribute::string().computed());
    }

    Schema::new()
        .attribute(
            "object_ids",
            Attribute::string_list()
                .optional()
                .computed()
                .exactly_one_of(USERS_LOOKUPS)
                .validate(Validator::Uuid),
        )
        .attribute(
            "user_principal_names",
            Attribute::string_list()
                .optional()
                .computed()
                .exactly_one_of(USERS_LOOKUPS)
                .validate(Validator::NoEmptyStrings),
        )
        .attribute(
            "mail_nicknames",
            Attribute::string_list()
                .optional()
                .computed()
                .exactly_one_of(USERS_LOOKUPS)
                .validate(Validator::NoEmptyStrings),
        )
        .attribute("ignore_missing", Attribute::bool().optional().default(false))
        .attribute("users", Attribute::block_list(user).computed())
}

/// Attribute map of one user, as stored in `users` and on `azuread_user`
pub fn flatten_user(user: &DirectoryUser) -> Value {
    json!({
        "account_enabled": user.account_enabled,
        "display_name": user.display_name.clone().unwrap_or_default(),
        "immutable_id": user.immutable_id.clone().unwrap_or_default(),
        "mail": user.mail.clone().unwrap_or_default(),
        "mail_nickname": user.mail_nickname.clone().unwrap_or_default(),
        "object_id": user.object_id,
        "onpremises_sam_account_name": user.onpremises_sam_account_name.clone().unwrap_or_default(),
        "onpremises_user_principal_name": user.onpremises_user_principal_name.clone().unwrap_or_default(),
        "usage_location": user.usage_location.clone().unwrap_or_default(),
        "user_principal_name": user.user_principal_name,
    })
}

/// `azuread_user` data source over any [`UserDirectory`]
pub struct UserDataSource<U: ?Sized> {
    directory: Arc<U>,
}

impl<U: UserDirectory + ?Sized> UserDataSource<U> {
    pub fn new(directory: Arc<U>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<U: UserDirectory + ?Sized> DataSourceHandler for UserDataSource<U> {
    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let (found, description) = if let Some(upn) = d.get_string("user_principal_name") {
            (self.directory.user_by_principal_name(&upn).await?, format!("UPN: {upn:?}"))
        } else if let Some(object_id) = d.get_string("object_id") {
            (
                self.directory.user_by_object_id(&object_id).await?,
                format!("object ID: {object_id:?}"),
            )
        } else if let Some(nickname) = d.get_string("mail_nickname") {
            (
                self.directory.user_by_mail_nickname(&nickname).await?,
                format!("email alias: {nickname:?}"),
            )
        } else if let Some(mail) = d.get_string("mail") {
            (self.directory.user_by_mail(&mail).await?, format!("mail address: {mail:?}"))
        } else {
            return Err(Error::validation(
                "one of `object_id`, `user_principal_name`, `mail_nickname` or `mail` must be supplied",
            ));
        };

        let user = found.ok_or_else(|| Error::not_found(format!("User not found with {description}")))?;
        d.set_id(user.object_id.clone());
        if let Value::Object(fields) = flatten_user(&user) {
            for (key, value) in fields {
                d.set(&key, value);
            }
        }
        Ok(())
    }
}

/// `azuread_users` data source over any [`UserDirectory`]
pub struct UsersDataSource<U: ?Sized> {
    directory: Arc<U>,
}

impl<U: UserDirectory + ?Sized> UsersDataSource<U> {
    pub fn new(directory: Arc<U>) -> Self {
        Self { directory }
    }

    async fn lookup(&self, attribute: &str, value: &str) -> Result<Option<DirectoryUser>> {
        match attribute {
            "user_principal_names" => self.directory.user_by_principal_name(value).await,
            "object_ids" => self.directory.user_by_object_id(value).await,
            _ => self.directory.user_by_mail_nickname(value).await,
        }
    }
}

#[async_trait]
impl<U: UserDirectory + ?Sized> DataSourceHandler for UsersDataSource<U> {
    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let ignore_missing = d.get_bool("ignore_missing");

        let Some((attribute, wanted)) = USERS_LOOKUPS
            .iter()
            .map(|a| (*a, d.get_string_list(a)))
            .find(|(_, values)| !values.is_empty())
        else {
            return Err(Error::validation(
                "one of `object_ids`, `user_principal_names` or `mail_nicknames` must be supplied",
            ));
        };

        let mut users = Vec::with_capacity(wanted.len());
        for value in &wanted {
            match self.lookup(attribute, value).await? {
                Some(user) => users.push(user),
                None if ignore_missing => continue,
                None => {
                    return Err(Error::not_found(format!(
                        "User not found with {attribute} entry {value:?}"
                    )));
                }
            }
        }

        if !ignore_missing && users.len() != wanted.len() {
            return Err(Error::Other(format!(
                "Unexpected number of users returned. Expected: {}, Actual: {}",
                wanted.len(),
                users.len()
            )));
        }

        let upns: Vec<String> = users.iter().map(|u| u.user_principal_name.clone()).collect();
        let ids: Vec<String> = users.iter().map(|u| u.object_id.clone()).collect();
        let nicknames: Vec<String> = users
            .iter()
            .filter_map(|u| u.mail_nickname.clone())
            .collect();

        d.set_id(hashed_id("users", &upns));
        d.set("object_ids", &ids);
        d.set("user_principal_names", &upns);
        d.set("mail_nicknames", &nicknames);
        d.set("users", users.iter().map(flatten_user).collect::<Vec<_>>());
        Ok(())
    }
}
