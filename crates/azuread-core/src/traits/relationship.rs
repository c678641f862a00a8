// # Relationship API
//
// A set-valued relationship of a directory object (owners of an
// application, members of a group, ...). The reconciliation helper only
// needs these three calls; each backend decides how a single `add` or
// `remove` maps onto HTTP requests.

use async_trait::async_trait;

use crate::Result;

/// List/add/remove access to one relationship of one object type
#[async_trait]
pub trait RelationshipApi: Send + Sync {
    /// Relationship name used in logs, e.g. "owners"
    fn relationship(&self) -> &'static str;

    /// Object IDs currently related to `object_id`
    async fn list(&self, object_id: &str) -> Result<Vec<String>>;

    /// Relate every ID in `ids` to `object_id`
    async fn add(&self, object_id: &str, ids: &[String]) -> Result<()>;

    /// Remove every ID in `ids` from the relationship
    async fn remove(&self, object_id: &str, ids: &[String]) -> Result<()>;
}
