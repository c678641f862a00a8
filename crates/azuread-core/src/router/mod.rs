//! Resource router
//!
//! Every resource and data source type can have one handler per API
//! generation. The router holds both and picks one per call from the
//! provider-wide `use_msgraph` flag, so handlers never branch on the backend
//! themselves.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use azuread_core::router::{Backend, ResourceRouter};
//!
//! let locks = Arc::new(LockRegistry::new());
//! let mut router = ResourceRouter::new(config.use_msgraph);
//!
//! // Backend crates register their handlers
//! azuread_backend_aadgraph::register(&mut router, aad_client.clone(), locks.clone())?;
//! azuread_backend_msgraph::register(&mut router, ms_client.clone(), locks.clone())?;
//!
//! // Route a call
//! let route = router.resource("azuread_group")?;
//! route.handler.read(&mut data).await?;
//! ```
//!
//! ## Selection
//!
//! - both variants registered: MS Graph when `use_msgraph`, AAD Graph otherwise
//! - one variant registered: that one, whatever the flag says
//! - unknown type name: configuration error

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::resources;
use crate::schema::Schema;
use crate::traits::{DataSourceHandler, ResourceHandler};

/// API generation a handler talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Legacy Azure AD Graph (`graph.windows.net`)
    AadGraph,
    /// Microsoft Graph (`graph.microsoft.com`)
    MsGraph,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::AadGraph => f.write_str("aadgraph"),
            Backend::MsGraph => f.write_str("msgraph"),
        }
    }
}

struct Variants<H: ?Sized> {
    schema: Arc<Schema>,
    handlers: HashMap<Backend, Arc<H>>,
}

impl<H: ?Sized> Variants<H> {
    fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            handlers: HashMap::new(),
        }
    }

    fn select(&self, preferred: Backend) -> Option<(Backend, Arc<H>)> {
        let fallback = match preferred {
            Backend::AadGraph => Backend::MsGraph,
            Backend::MsGraph => Backend::AadGraph,
        };
        [preferred, fallback]
            .into_iter()
            .find_map(|b| self.handlers.get(&b).map(|h| (b, Arc::clone(h))))
    }
}

/// A routed handler together with the schema of its type
pub struct Route<H: ?Sized> {
    pub schema: Arc<Schema>,
    pub backend: Backend,
    pub handler: Arc<H>,
}

/// Maps type names to per-backend handlers
pub struct ResourceRouter {
    preferred: Backend,
    resources: HashMap<String, Variants<dyn ResourceHandler>>,
    data_sources: HashMap<String, Variants<dyn DataSourceHandler>>,
}

impl ResourceRouter {
    /// Create an empty router
    pub fn new(use_msgraph: bool) -> Self {
        Self {
            preferred: if use_msgraph {
                Backend::MsGraph
            } else {
                Backend::AadGraph
            },
            resources: HashMap::new(),
            data_sources: HashMap::new(),
        }
    }

    pub fn preferred_backend(&self) -> Backend {
        self.preferred
    }

    /// Register the `backend` handler of a managed resource type
    pub fn register_resource(
        &mut self,
        type_name: &str,
        backend: Backend,
        handler: Arc<dyn ResourceHandler>,
    ) -> Result<()> {
        if !self.resources.contains_key(type_name) {
            let schema = resources::resource_schema(type_name).ok_or_else(|| {
                Error::config(format!("no schema defined for resource type {type_name:?}"))
            })?;
            self.resources.insert(type_name.to_string(), Variants::new(schema));
        }
        if let Some(variants) = self.resources.get_mut(type_name) {
            variants.handlers.insert(backend, handler);
        }
        debug!(type_name, %backend, "registered resource handler");
        Ok(())
    }

    /// Register the `backend` handler of a data source type
    pub fn register_data_source(
        &mut self,
        type_name: &str,
        backend: Backend,
        handler: Arc<dyn DataSourceHandler>,
    ) -> Result<()> {
        if !self.data_sources.contains_key(type_name) {
            let schema = resources::data_source_schema(type_name).ok_or_else(|| {
                Error::config(format!("no schema defined for data source type {type_name:?}"))
            })?;
            self.data_sources.insert(type_name.to_string(), Variants::new(schema));
        }
        if let Some(variants) = self.data_sources.get_mut(type_name) {
            variants.handlers.insert(backend, handler);
        }
        debug!(type_name, %backend, "registered data source handler");
        Ok(())
    }

    /// Handler for a managed resource type
    pub fn resource(&self, type_name: &str) -> Result<Route<dyn ResourceHandler>> {
        let variants = self
            .resources
            .get(type_name)
            .ok_or_else(|| Error::config(format!("unknown resource type {type_name:?}")))?;
        let (backend, handler) = variants.select(self.preferred).ok_or_else(|| {
            Error::config(format!("no handler registered for resource type {type_name:?}"))
        })?;
        Ok(Route {
            schema: Arc::clone(&variants.schema),
            backend,
            handler,
        })
    }

    /// Handler for a data source type
    pub fn data_source(&self, type_name: &str) -> Result<Route<dyn DataSourceHandler>> {
        let variants = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| Error::config(format!("unknown data source type {type_name:?}")))?;
        let (backend, handler) = variants.select(self.preferred).ok_or_else(|| {
            Error::config(format!("no handler registered for data source type {type_name:?}"))
        })?;
        Ok(Route {
            schema: Arc::clone(&variants.schema),
            backend,
            handler,
        })
    }

    /// Registered resource type names, sorted
    pub fn resource_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered data source type names, sorted
    pub fn data_source_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data_sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_resource(&self, type_name: &str) -> bool {
        self.resources.contains_key(type_name)
    }
}
