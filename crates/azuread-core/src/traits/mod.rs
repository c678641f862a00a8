//! Core traits for the provider
//!
//! These are the seams between the backend-neutral core and the two API
//! generations.
//!
//! - [`ResourceHandler`] / [`DataSourceHandler`]: CRUD for one resource type on one backend
//! - [`RelationshipApi`]: list/add/remove access to a set-valued relationship
//! - [`UserDirectory`] / [`GroupDirectory`]: lookups used by the data sources

pub mod directory;
pub mod handler;
pub mod relationship;

pub use directory::{DirectoryGroup, DirectoryUser, GroupDirectory, UserDirectory};
pub use handler::{DataSourceHandler, ResourceHandler};
pub use relationship::RelationshipApi;
