// # Azure AD Graph backend
//
// Handlers for the legacy `graph.windows.net` API. This is the default
// backend and the only one that manages password credentials.
//
// ## Coverage
//
// - `azuread_application`, `azuread_application_password`, `azuread_group`,
//   `azuread_group_member`, `azuread_service_principal`,
//   `azuread_service_principal_password`
// - `azuread_group`, `azuread_groups`, `azuread_user`, `azuread_users` data sources
//
// ## Request model
//
// - Requests are scoped to the tenant and pinned to `api-version=1.6`
// - One HTTP request per client call, 30 second per-request timeout
// - Owners and members are bound through `$links`; member removals wait
//   until the directory stops listing the removed object
// - Password credentials are rewritten as a whole list under the parent's
//   named lock

pub mod applications;
pub mod client;
pub mod directory;
pub mod group_member;
pub mod groups;
pub mod links;
pub mod models;
pub mod passwords;
pub mod service_principals;

use std::sync::Arc;

use azuread_core::resources::group::{GroupDataSource, GroupsDataSource};
use azuread_core::resources::user::{UserDataSource, UsersDataSource};
use azuread_core::resources::{
    APPLICATION, APPLICATION_PASSWORD, GROUP, GROUP_MEMBER, GROUPS, SERVICE_PRINCIPAL,
    SERVICE_PRINCIPAL_PASSWORD, USER, USERS,
};
use azuread_core::{Backend, LockRegistry, ResourceRouter, Result};
use tracing::info;

pub use applications::ApplicationHandler;
pub use client::AadGraphClient;
pub use directory::AadGraphDirectory;
pub use group_member::GroupMemberHandler;
pub use groups::GroupHandler;
pub use links::LinkRelationship;
pub use passwords::{CredentialParent, PasswordHandler};
pub use service_principals::ServicePrincipalHandler;

/// Register every Azure AD Graph handler with `router`
pub fn register(
    router: &mut ResourceRouter,
    client: Arc<AadGraphClient>,
    locks: Arc<LockRegistry>,
) -> Result<()> {
    let backend = Backend::AadGraph;
    let directory = Arc::new(AadGraphDirectory::new(client.clone()));

    router.register_resource(
        APPLICATION,
        backend,
        Arc::new(ApplicationHandler::new(client.clone())),
    )?;
    router.register_resource(
        APPLICATION_PASSWORD,
        backend,
        Arc::new(PasswordHandler::new(
            client.clone(),
            locks.clone(),
            CredentialParent::APPLICATION,
        )),
    )?;
    router.register_resource(GROUP, backend, Arc::new(GroupHandler::new(client.clone())))?;
    router.register_resource(
        GROUP_MEMBER,
        backend,
        Arc::new(GroupMemberHandler::new(client.clone(), locks.clone())),
    )?;
    router.register_resource(
        SERVICE_PRINCIPAL,
        backend,
        Arc::new(ServicePrincipalHandler::new(client.clone())),
    )?;
    router.register_resource(
        SERVICE_PRINCIPAL_PASSWORD,
        backend,
        Arc::new(PasswordHandler::new(
            client.clone(),
            locks,
            CredentialParent::SERVICE_PRINCIPAL,
        )),
    )?;

    router.register_data_source(GROUP, backend, Arc::new(GroupDataSource::new(directory.clone())))?;
    router.register_data_source(
        GROUPS,
        backend,
        Arc::new(GroupsDataSource::new(directory.clone())),
    )?;
    router.register_data_source(USER, backend, Arc::new(UserDataSource::new(directory.clone())))?;
    router.register_data_source(USERS, backend, Arc::new(UsersDataSource::new(directory)))?;

    info!(base_url = client.base_url(), "registered aadgraph handlers");
    Ok(())
}
