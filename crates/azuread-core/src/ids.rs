//! Resource identifiers.
//!
//! Top-level objects are identified by their directory object ID (a UUID).
//! Sub-resources use a three part composite `parentId/kind/subId`, which
//! must format and parse back exactly.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::{Error, Result};

/// `objectId/kind/subId`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectSubResourceId {
    pub object_id: String,
    pub kind: String,
    pub sub_id: String,
}

impl ObjectSubResourceId {
    pub fn new(
        object_id: impl Into<String>,
        kind: impl Into<String>,
        sub_id: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            kind: kind.into(),
            sub_id: sub_id.into(),
        }
    }

    /// Split a composite ID into its three non-empty parts
    pub fn parse(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.split('/').collect();
        if parts.len() != 3 {
            return Err(Error::invalid_id(format!(
                "object resource ID should be in the format {{objectId}}/{{type}}/{{subId}} - but got {id:?}"
            )));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::invalid_id(format!(
                "object resource ID {id:?} has an empty segment"
            )));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    /// Parse and require a specific `kind` segment
    pub fn parse_kind(id: &str, kind: &str) -> Result<Self> {
        let parsed = Self::parse(id)?;
        if parsed.kind != kind {
            return Err(Error::invalid_id(format!(
                "expected type {kind:?} in ID {id:?}, got {:?}",
                parsed.kind
            )));
        }
        Ok(parsed)
    }
}

impl fmt::Display for ObjectSubResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.object_id, self.kind, self.sub_id)
    }
}

impl FromStr for ObjectSubResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Fails unless `id` is a UUID
pub fn validate_object_id(id: &str) -> Result<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| Error::invalid_id(format!("{id:?} is not a valid UUID")))
}

/// Kind of credential attached to an application or service principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Password,
    Certificate,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Password => "password",
            CredentialKind::Certificate => "certificate",
        }
    }
}

impl FromStr for CredentialKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "password" => Ok(CredentialKind::Password),
            "certificate" => Ok(CredentialKind::Certificate),
            other => Err(Error::invalid_id(format!(
                "credential type {other:?} must be one of password, certificate"
            ))),
        }
    }
}

/// `parentObjectId/{password|certificate}/keyId`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialId {
    pub object_id: String,
    pub kind: CredentialKind,
    pub key_id: String,
}

impl CredentialId {
    pub fn new(object_id: impl Into<String>, kind: CredentialKind, key_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            kind,
            key_id: key_id.into(),
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        let raw = ObjectSubResourceId::parse(id)?;
        let kind = raw.kind.parse()?;
        Ok(Self::new(raw.object_id, kind, raw.sub_id))
    }

    /// Parse a password credential ID, rejecting other kinds
    pub fn parse_password(id: &str) -> Result<Self> {
        let parsed = Self::parse(id)?;
        if parsed.kind != CredentialKind::Password {
            return Err(Error::invalid_id(format!(
                "{id:?} is not a password credential ID"
            )));
        }
        Ok(parsed)
    }

    /// Parse the two part `parentObjectId/keyId` format used before the
    /// credential kind was part of the ID.
    pub fn parse_legacy(id: &str, kind: CredentialKind) -> Result<Self> {
        let parts: Vec<&str> = id.split('/').collect();
        if parts.len() != 2 {
            return Err(Error::invalid_id(format!(
                "legacy credential ID should be in the format {{objectId}}/{{keyId}} - but got {id:?}"
            )));
        }
        validate_object_id(parts[0])?;
        validate_object_id(parts[1])?;
        Ok(Self::new(parts[0], kind, parts[1]))
    }

    /// Both the parent and key segments must be UUIDs for an import
    pub fn validate(&self) -> Result<()> {
        validate_object_id(&self.object_id)?;
        validate_object_id(&self.key_id)
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.object_id, self.kind.as_str(), self.key_id)
    }
}

/// `groupObjectId/member/memberObjectId`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupMemberId {
    pub group_id: String,
    pub member_id: String,
}

impl GroupMemberId {
    pub const KIND: &'static str = "member";

    pub fn new(group_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            member_id: member_id.into(),
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        let raw = ObjectSubResourceId::parse_kind(id, Self::KIND)?;
        Ok(Self::new(raw.object_id, raw.sub_id))
    }

    pub fn validate(&self) -> Result<()> {
        validate_object_id(&self.group_id)?;
        validate_object_id(&self.member_id)
    }
}

impl fmt::Display for GroupMemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group_id, Self::KIND, self.member_id)
    }
}
