// # Microsoft Graph backend
//
// Handlers for `graph.microsoft.com`, selected when the provider runs with
// `use_msgraph`.
//
// ## Coverage
//
// - `azuread_application`, `azuread_group`, `azuread_group_member`,
//   `azuread_service_principal`
// - `azuread_group`, `azuread_groups`, `azuread_user`, `azuread_users` data sources
//
// Password credentials are only implemented by the AAD Graph backend; the
// router falls back to it whatever the flag says.
//
// ## Request model
//
// - One HTTP request per client call, 30 second per-request timeout
// - No retries here: replication lag is handled by `ReplicationWaiter`
//   in the handlers, everything else surfaces as an error
// - Owners and members are `$ref` collections reconciled through
//   `azuread_core::reconcile`

pub mod applications;
pub mod client;
pub mod directory;
pub mod group_member;
pub mod groups;
pub mod models;
pub mod relationships;
pub mod service_principals;

use std::sync::Arc;

use azuread_core::resources::group::{GroupDataSource, GroupsDataSource};
use azuread_core::resources::user::{UserDataSource, UsersDataSource};
use azuread_core::resources::{
    APPLICATION, GROUP, GROUP_MEMBER, GROUPS, SERVICE_PRINCIPAL, USER, USERS,
};
use azuread_core::{Backend, LockRegistry, ResourceRouter, Result};
use tracing::info;

pub use applications::ApplicationHandler;
pub use client::MsGraphClient;
pub use directory::MsGraphDirectory;
pub use group_member::GroupMemberHandler;
pub use groups::GroupHandler;
pub use relationships::DirectoryRelationship;
pub use service_principals::ServicePrincipalHandler;

/// Register every Microsoft Graph handler with `router`
pub fn register(
    router: &mut ResourceRouter,
    client: Arc<MsGraphClient>,
    locks: Arc<LockRegistry>,
) -> Result<()> {
    let backend = Backend::MsGraph;
    let directory = Arc::new(MsGraphDirectory::new(client.clone()));

    router.register_resource(
        APPLICATION,
        backend,
        Arc::new(ApplicationHandler::new(client.clone())),
    )?;
    router.register_resource(GROUP, backend, Arc::new(GroupHandler::new(client.clone())))?;
    router.register_resource(
        GROUP_MEMBER,
        backend,
        Arc::new(GroupMemberHandler::new(client.clone(), locks)),
    )?;
    router.register_resource(
        SERVICE_PRINCIPAL,
        backend,
        Arc::new(ServicePrincipalHandler::new(client.clone())),
    )?;

    router.register_data_source(GROUP, backend, Arc::new(GroupDataSource::new(directory.clone())))?;
    router.register_data_source(
        GROUPS,
        backend,
        Arc::new(GroupsDataSource::new(directory.clone())),
    )?;
    router.register_data_source(USER, backend, Arc::new(UserDataSource::new(directory.clone())))?;
    router.register_data_source(USERS, backend, Arc::new(UsersDataSource::new(directory)))?;

    info!(base_url = client.base_url(), "registered msgraph handlers");
    Ok(())
}
