//! `azuread_group` resource and the `azuread_group` / `azuread_groups`
//! data sources.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema, Validator};
use crate::traits::{DataSourceHandler, DirectoryGroup, GroupDirectory};
use crate::{Error, Result};

use super::hashed_id;

pub fn schema() -> Schema {
    Schema::new()
        .attribute(
            "display_name",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .exactly_one_of(&["name"])
                .validate(Validator::NoEmptyStrings),
        )
        .attribute(
            "name",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .deprecated("This property has been renamed to `display_name` and will be removed in a future release.")
                .exactly_one_of(&["display_name"])
                .validate(Validator::NoEmptyStrings),
        )
        .attribute("description", Attribute::string().optional().force_new())
        .attribute(
            "members",
            Attribute::string_set()
                .optional()
                .computed()
                .validate(Validator::Uuid),
        )
        .attribute(
            "owners",
            Attribute::string_set()
                .optional()
                .computed()
                .validate(Validator::Uuid),
        )
        .attribute("object_id", Attribute::string().computed())
        .attribute("prevent_duplicate_names", Attribute::bool().optional().default(false))
}

/// `display_name`, falling back to the deprecated `name`
pub fn display_name(d: &ResourceData) -> String {
    d.get_string("display_name")
        .or_else(|| d.get_string("name"))
        .unwrap_or_default()
}

/// Conflict unless no other group already uses `display_name`.
///
/// Names are compared case-insensitively; `own_id` is skipped so an update
/// does not collide with the group itself.
pub fn check_duplicate_name(
    display_name: &str,
    existing: &[DirectoryGroup],
    own_id: Option<&str>,
) -> Result<()> {
    let clash = existing.iter().find(|g| {
        g.display_name.eq_ignore_ascii_case(display_name)
            && own_id.is_none_or(|id| !g.object_id.eq_ignore_ascii_case(id))
    });
    match clash {
        Some(g) => Err(Error::conflict(format!(
            "existing Group with name {display_name:?} (Object ID: {:?}) was found and `prevent_duplicate_names` was specified",
            g.object_id
        ))),
        None => Ok(()),
    }
}

pub fn data_source_schema() -> Schema {
    Schema::new()
        .attribute(
            "object_id",
            Attribute::string()
                .optional()
                .computed()
                .exactly_one_of(&["display_name", "name"])
                .validate(Validator::Uuid),
        )
        .attribute(
            "display_name",
            Attribute::string()
                .optional()
                .computed()
                .exactly_one_of(&["name", "object_id"])
                .validate(Validator::NoEmptyStrings),
        )
        .attribute(
            "name",
            Attribute::string()
                .optional()
                .computed()
                .deprecated("This property has been renamed to `display_name` and will be removed in a future release.")
                .exactly_one_of(&["display_name", "object_id"])
                .validate(Validator::NoEmptyStrings),
        )
        .attribute("description", Attribute::string().computed())
        .attribute("members", Attribute::string_list().computed())
        .attribute("owners", Attribute::string_list().computed())
}

pub fn groups_data_source_schema() -> Schema {
    const GROUP: &[&str] = &["display_names", "names", "object_ids"];
    Schema::new()
        .attribute(
            "object_ids",
            Attribute::string_list()
                .optional()
                .computed()
                .exactly_one_of(GROUP)
                .validate(Validator::Uuid),
        )
        .attribute(
            "display_names",
            Attribute::string_list()
                .optional()
                .computed()
                .exactly_one_of(GROUP)
                .validate(Validator::NoEmptyStrings),
        )
        .attribute(
            "names",
            Attribute::string_list()
                .optional()
                .computed()
                .deprecated("This property has been renamed to `display_names` and will be removed in a future release.")
                .exactly_one_of(GROUP)
                .validate(Validator::NoEmptyStrings),
        )
}

/// `azuread_group` data source over any [`GroupDirectory`]
pub struct GroupDataSource<G: ?Sized> {
    directory: Arc<G>,
}

impl<G: GroupDirectory + ?Sized> GroupDataSource<G> {
    pub fn new(directory: Arc<G>) -> Self {
        Self { directory }
    }

    async fn find_by_display_name(&self, name: &str) -> Result<DirectoryGroup> {
        let mut groups = self.directory.groups_by_display_name(name).await?;
        match groups.len() {
            0 => Err(Error::not_found(format!("No group found with display name: {name:?}"))),
            1 => Ok(groups.remove(0)),
            _ => Err(Error::conflict(format!(
                "More than one group found with display name: {name:?}"
            ))),
        }
    }
}

#[async_trait]
impl<G: GroupDirectory + ?Sized> DataSourceHandler for GroupDataSource<G> {
    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let name = d.get_string("display_name").or_else(|| d.get_string("name"));

        let group = if let Some(name) = name {
            self.find_by_display_name(&name).await?
        } else if let Some(object_id) = d.get_string("object_id") {
            self.directory
                .group_by_object_id(&object_id)
                .await?
                .ok_or_else(|| {
                    Error::not_found(format!("No group found with object ID: {object_id:?}"))
                })?
        } else {
            return Err(Error::validation(
                "one of `object_id`, `display_name` or `name` must be specified",
            ));
        };

        let members = self.directory.group_members(&group.object_id).await?;
        let owners = self.directory.group_owners(&group.object_id).await?;

        debug!(object_id = %group.object_id, "resolved group");
        d.set_id(group.object_id.clone());
        d.set("object_id", &group.object_id);
        d.set("display_name", &group.display_name);
        d.set("name", &group.display_name);
        d.set("description", &group.description);
        d.set("members", members);
        d.set("owners", owners);
        Ok(())
    }
}

/// `azuread_groups` data source over any [`GroupDirectory`]
pub struct GroupsDataSource<G: ?Sized> {
    directory: Arc<G>,
}

impl<G: GroupDirectory + ?Sized> GroupsDataSource<G> {
    pub fn new(directory: Arc<G>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<G: GroupDirectory + ?Sized> DataSourceHandler for GroupsDataSource<G> {
    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let mut names = d.get_string_list("display_names");
        if names.is_empty() {
            names = d.get_string_list("names");
        }
        let object_ids = d.get_string_list("object_ids");

        let mut groups = Vec::new();
        let expected = if !names.is_empty() {
            for name in &names {
                let mut found = self.directory.groups_by_display_name(name).await?;
                match found.len() {
                    0 => {
                        return Err(Error::not_found(format!(
                            "No group found with display name: {name:?}"
                        )));
                    }
                    1 => groups.push(found.remove(0)),
                    _ => {
                        return Err(Error::conflict(format!(
                            "More than one group found with display name: {name:?}"
                        )));
                    }
                }
            }
            names.len()
        } else {
            for object_id in &object_ids {
                let group = self.directory.group_by_object_id(object_id).await?.ok_or_else(|| {
                    Error::not_found(format!("No group found with object ID: {object_id:?}"))
                })?;
                groups.push(group);
            }
            object_ids.len()
        };

        if groups.len() != expected {
            return Err(Error::Other(format!(
                "Unexpected number of groups returned. Expected: {expected}, Actual: {}",
                groups.len()
            )));
        }

        let names: Vec<String> = groups.iter().map(|g| g.display_name.clone()).collect();
        let ids: Vec<String> = groups.iter().map(|g| g.object_id.clone()).collect();

        d.set_id(hashed_id("groups", &names));
        d.set("object_ids", &ids);
        d.set("display_names", &names);
        d.set("names", &names);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, name: &str) -> DirectoryGroup {
        DirectoryGroup {
            object_id: id.to_string(),
            display_name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn duplicate_names_match_case_insensitively() {
        let existing = vec![group("1", "Admins")];
        assert!(check_duplicate_name("admins", &existing, None).is_err());
        assert!(check_duplicate_name("operators", &existing, None).is_ok());
    }

    #[test]
    fn update_ignores_its_own_name() {
        let existing = vec![group("1", "Admins")];
        assert!(check_duplicate_name("Admins", &existing, Some("1")).is_ok());
        assert!(check_duplicate_name("Admins", &existing, Some("2")).is_err());
    }
}
