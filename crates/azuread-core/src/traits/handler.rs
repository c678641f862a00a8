// # Resource Handlers
//
// Each resource type is implemented once per backend. The router decides
// which implementation runs; the provider facade owns validation, timeouts
// and turning errors into diagnostics.
//
// ## Contract
//
// - **create**: validate client-side, write, wait for replication, apply
//   set-valued sub-resources, then read back
// - **read**: fetch by ID; when the object is gone call
//   [`ResourceData::clear_id`] and return `Ok(())`
// - **update**: send only changed fields, reconcile relationships, read back
// - **delete**: a missing object is a successful no-op
//
// Handlers must not retry backend calls themselves beyond the replication
// helpers in [`crate::replication`].

use async_trait::async_trait;

use crate::{ResourceData, Result};

/// CRUD implementation of a managed resource type
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Create the object and populate `d` with its ID and state
    async fn create(&self, d: &mut ResourceData) -> Result<()>;

    /// Refresh `d` from the directory, clearing the ID if the object is gone
    async fn read(&self, d: &mut ResourceData) -> Result<()>;

    /// Apply the changes between prior and planned state
    async fn update(&self, d: &mut ResourceData) -> Result<()>;

    /// Remove the object
    async fn delete(&self, d: &mut ResourceData) -> Result<()>;
}

/// Read-only lookup exposed as a data source
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// Resolve the configured query and populate `d`
    async fn read(&self, d: &mut ResourceData) -> Result<()>;
}
