// # azuread-core
//
// Core library for the Azure Active Directory provider.
//
// ## Architecture Overview
//
// This library holds everything that does not depend on which directory API
// generation is talking to the tenant:
// - **ResourceHandler / DataSourceHandler**: traits implemented once per backend
// - **RelationshipApi**: list/add/remove access to a set-valued relationship
// - **reconcile**: desired vs. existing set difference, adds before removes
// - **replication**: bounded polling that hides directory replication lag
// - **LockRegistry**: named mutexes for sub-resources sharing a parent list
// - **resources**: attribute schemas and backend-neutral field mapping
// - **ResourceRouter**: picks the AAD Graph or MS Graph handler per call
// - **Provider**: validates requests, applies timeouts, turns errors into diagnostics
//
// ## Design Principles
//
// 1. **Backends are plugins**: the AAD Graph and MS Graph crates register handlers,
//    the core never names a backend type
// 2. **No client-side caching**: every read goes back to the directory
// 3. **Last write wins**: relationship sets are reconciled by plain set difference
// 4. **Bounded waits**: every poll loop and handler call has an upper time limit

pub mod auth;
pub mod config;
pub mod error;
pub mod ids;
pub mod locks;
pub mod provider;
pub mod reconcile;
pub mod replication;
pub mod resource_data;
pub mod resources;
pub mod router;
pub mod schema;
pub mod traits;

// Re-export core types for convenience
pub use auth::{Authorizer, ClientSecretAuthorizer, StaticTokenAuthorizer};
pub use config::{CloudEnvironment, ProviderConfig, Timeouts};
pub use error::{BackendContext, Error, Result};
pub use ids::{CredentialId, CredentialKind, GroupMemberId, ObjectSubResourceId};
pub use locks::{LockRegistry, NamedLockGuard};
pub use provider::{Diagnostic, Operation, OperationRequest, OperationResponse, Provider, TargetKind};
pub use reconcile::{SetDelta, reconcile};
pub use replication::{Clock, ReplicationPolicy, ReplicationWaiter, TokioClock};
pub use resource_data::ResourceData;
pub use router::{Backend, ResourceRouter};
pub use schema::{Attribute, AttributeType, Schema, Validator};
pub use traits::{DataSourceHandler, RelationshipApi, ResourceHandler};
