//! `azuread_application_password` and `azuread_service_principal_password`.
//!
//! AAD Graph only exposes the whole `passwordCredentials` collection of an
//! object, so adding or removing one key is a read-modify-write of the list.
//! Both run under the named lock of the parent object.

use std::sync::Arc;

use async_trait::async_trait;
use azuread_core::resources::credential::PasswordSpec;
use azuread_core::resources::{
    APPLICATION, APPLICATION_PASSWORD, SERVICE_PRINCIPAL, SERVICE_PRINCIPAL_PASSWORD,
};
use azuread_core::{
    BackendContext, CredentialId, CredentialKind, Error, LockRegistry, Operation,
    ReplicationPolicy, ReplicationWaiter, ResourceData, ResourceHandler, Result,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::client::AadGraphClient;
use crate::models::{PasswordCredential, PasswordCredentialList};

/// The object type a password is attached to
#[derive(Debug, Clone, Copy)]
pub struct CredentialParent {
    /// Resource type of the parent, used as the lock namespace
    pub resource_type: &'static str,
    /// Resource type of the password itself
    pub password_type: &'static str,
    /// AAD Graph collection of the parent
    pub collection: &'static str,
    /// Attribute holding the parent object ID
    pub parent_attr: &'static str,
    /// Human readable name for messages
    pub label: &'static str,
}

impl CredentialParent {
    pub const APPLICATION: CredentialParent = CredentialParent {
        resource_type: APPLICATION,
        password_type: APPLICATION_PASSWORD,
        collection: "applications",
        parent_attr: "application_object_id",
        label: "Application",
    };

    pub const SERVICE_PRINCIPAL: CredentialParent = CredentialParent {
        resource_type: SERVICE_PRINCIPAL,
        password_type: SERVICE_PRINCIPAL_PASSWORD,
        collection: "servicePrincipals",
        parent_attr: "service_principal_id",
        label: "Service Principal",
    };
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn has_key(credentials: &[PasswordCredential], key_id: &str) -> bool {
    credentials
        .iter()
        .any(|c| c.key_id.as_deref().is_some_and(|k| k.eq_ignore_ascii_case(key_id)))
}

pub struct PasswordHandler {
    client: Arc<AadGraphClient>,
    locks: Arc<LockRegistry>,
    parent: CredentialParent,
}

impl PasswordHandler {
    pub fn new(client: Arc<AadGraphClient>, locks: Arc<LockRegistry>, parent: CredentialParent) -> Self {
        Self {
            client,
            locks,
            parent,
        }
    }

    fn credentials_path(&self, object_id: &str) -> String {
        format!("{}/{object_id}/passwordCredentials", self.parent.collection)
    }

    /// Whether the parent object exists
    async fn parent_exists(&self, object_id: &str) -> Result<bool> {
        match self
            .client
            .get::<Value>(&format!("{}/{object_id}", self.parent.collection))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, object_id: &str) -> Result<Vec<PasswordCredential>> {
        let list: PasswordCredentialList = self.client.get(&self.credentials_path(object_id)).await?;
        Ok(list.value)
    }

    async fn replace(&self, object_id: &str, credentials: &[PasswordCredential]) -> Result<()> {
        self.client
            .patch(&self.credentials_path(object_id), &json!({ "value": credentials }))
            .await
    }
}

#[async_trait]
impl ResourceHandler for PasswordHandler {
    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let object_id = d.get_str(self.parent.parent_attr).to_string();
        let spec = PasswordSpec::from_resource(d, Utc::now())?;
        let id = CredentialId::new(&object_id, CredentialKind::Password, &spec.key_id);

        let _lock = self.locks.acquire(self.parent.resource_type, &object_id).await;

        let mut credentials = self.list(&object_id).await.backend_context(
            &format!("Listing Password Credentials for {}", self.parent.label),
            &object_id,
        )?;
        if has_key(&credentials, &spec.key_id) {
            return Err(Error::already_exists(self.parent.password_type, &id.to_string()));
        }

        credentials.push(PasswordCredential {
            custom_key_identifier: spec.description.as_ref().map(|text| STANDARD.encode(text)),
            end_date: Some(spec.end_date),
            key_id: Some(spec.key_id.clone()),
            start_date: Some(spec.start_date.unwrap_or_else(Utc::now)),
            value: Some(spec.value.clone()),
        });
        self.replace(&object_id, &credentials).await.backend_context(
            &format!("Creating Password Credential {:?} for {}", spec.key_id, self.parent.label),
            &object_id,
        )?;
        d.set_id(id.to_string());
        info!(object_id = %object_id, key_id = %spec.key_id, "added password credential");

        let waiter = ReplicationWaiter::new(ReplicationPolicy::new(d.remaining(Operation::Create)));
        waiter
            .poll_until(
                "password credential",
                || self.list(&object_id),
                |found| has_key(found, &spec.key_id),
            )
            .await
            .backend_context("Waiting for password credential replication", &id.to_string())?;

        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let id = CredentialId::parse_password(d.id())?;

        if !self.parent_exists(&id.object_id).await.backend_context(
            &format!("Retrieving {}", self.parent.label),
            &id.object_id,
        )? {
            debug!(object_id = %id.object_id, "parent object was not found, removing from state");
            d.clear_id();
            return Ok(());
        }

        let credentials = self.list(&id.object_id).await.backend_context(
            &format!("Listing Password Credentials for {}", self.parent.label),
            &id.object_id,
        )?;
        let Some(credential) = credentials
            .into_iter()
            .find(|c| c.key_id.as_deref().is_some_and(|k| k.eq_ignore_ascii_case(&id.key_id)))
        else {
            debug!(object_id = %id.object_id, key_id = %id.key_id, "password credential was not found, removing from state");
            d.clear_id();
            return Ok(());
        };

        // The secret value is write-only and stays as configured
        d.set("key_id", &credential.key_id);
        d.set(self.parent.parent_attr, &id.object_id);
        if let Some(encoded) = &credential.custom_key_identifier {
            match STANDARD.decode(encoded) {
                Ok(bytes) => d.set("description", String::from_utf8_lossy(&bytes)),
                Err(e) => warn!(key_id = %id.key_id, error = %e, "ignoring undecodable customKeyIdentifier"),
            }
        }
        if let Some(end) = &credential.end_date {
            d.set("end_date", format_date(end));
        }
        if let Some(start) = &credential.start_date {
            d.set("start_date", format_date(start));
        }
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        // Every attribute forces replacement
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id = CredentialId::parse_password(d.id())?;
        let _lock = self.locks.acquire(self.parent.resource_type, &id.object_id).await;

        if !self.parent_exists(&id.object_id).await.backend_context(
            &format!("Retrieving {}", self.parent.label),
            &id.object_id,
        )? {
            debug!(object_id = %id.object_id, "parent object already deleted");
            return Ok(());
        }

        let credentials = self.list(&id.object_id).await.backend_context(
            &format!("Listing Password Credentials for {}", self.parent.label),
            &id.object_id,
        )?;
        let remaining: Vec<PasswordCredential> = credentials
            .into_iter()
            .filter(|c| !c.key_id.as_deref().is_some_and(|k| k.eq_ignore_ascii_case(&id.key_id)))
            .collect();

        self.replace(&id.object_id, &remaining).await.backend_context(
            &format!("Removing Password {:?} from {}", id.key_id, self.parent.label),
            &id.object_id,
        )?;
        info!(object_id = %id.object_id, key_id = %id.key_id, "removed password credential");
        Ok(())
    }
}
