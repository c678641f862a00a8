//! Provider facade
//!
//! [`Provider::execute`] is the single entry point the host talks to. For
//! every request it:
//!
//! 1. routes the type name to a handler ([`ResourceRouter`])
//! 2. fills defaults and validates the configuration against the schema
//! 3. builds the planned values and a [`ResourceData`]
//! 4. rejects updates that change a replace-only attribute
//! 5. runs the handler under the operation timeout
//! 6. turns the outcome into a new state plus diagnostics
//!
//! ## Deadlines
//!
//! Handlers see the operation deadline through [`ResourceData::remaining`]
//! and size their replication waits from it. The outer guard fires only
//! after a grace period on top of the deadline, so an expired wait reports
//! its own `ReplicationTimeout` instead of being cut off.
//!
//! ## State after failures
//!
//! Creates are not rolled back. When a create fails after the object got an
//! ID the partial state is still returned so the next run can converge on it.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::config::Timeouts;
use crate::error::{Error, Result};
use crate::ids::{CredentialId, CredentialKind};
use crate::resource_data::ResourceData;
use crate::resources;
use crate::router::ResourceRouter;

/// Whether a request targets a managed resource or a data source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    #[default]
    Resource,
    DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
    UpgradeState,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Import => "import",
            Operation::UpgradeState => "upgrade_state",
        }
    }
}

/// Per-request timeout overrides in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutOverrides {
    pub create: Option<u64>,
    pub read: Option<u64>,
    pub update: Option<u64>,
    pub delete: Option<u64>,
}

impl TimeoutOverrides {
    fn apply(&self, base: Timeouts) -> Timeouts {
        let pick = |o: Option<u64>, d: Duration| o.filter(|s| *s > 0).map(Duration::from_secs).unwrap_or(d);
        Timeouts {
            create: pick(self.create, base.create),
            read: pick(self.read, base.read),
            update: pick(self.update, base.update),
            delete: pick(self.delete, base.delete),
        }
    }
}

/// One operation requested by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    #[serde(default)]
    pub kind: TargetKind,
    pub type_name: String,
    pub operation: Operation,
    /// Resource ID; falls back to `prior_state.id`
    #[serde(default)]
    pub id: Option<String>,
    /// Raw configuration, unset attributes null or absent
    #[serde(default)]
    pub config: Map<String, Value>,
    /// State from the previous run, empty on create
    #[serde(default)]
    pub prior_state: Map<String, Value>,
    #[serde(default)]
    pub timeouts: Option<TimeoutOverrides>,
}

impl OperationRequest {
    pub fn resource(type_name: impl Into<String>, operation: Operation) -> Self {
        Self {
            kind: TargetKind::Resource,
            type_name: type_name.into(),
            operation,
            id: None,
            config: Map::new(),
            prior_state: Map::new(),
            timeouts: None,
        }
    }

    pub fn data_source(type_name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::DataSource,
            ..Self::resource(type_name, Operation::Read)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    pub fn with_prior_state(mut self, prior: Map<String, Value>) -> Self {
        self.prior_state = prior;
        self
    }

    fn resolved_id(&self) -> String {
        self.id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.prior_state
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Diagnostic {
    pub fn error(err: &Error) -> Self {
        Self {
            severity: Severity::Error,
            summary: err.to_string(),
            detail: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: None,
        }
    }
}

/// Result handed back to the host. `state: None` means the object does not exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse {
    pub id: Option<String>,
    pub state: Option<Map<String, Value>>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl OperationResponse {
    fn failed(err: &Error) -> Self {
        Self {
            diagnostics: vec![Diagnostic::error(err)],
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// First error diagnostic, if any
    pub fn error_summary(&self) -> Option<&str> {
        self.diagnostics
            .iter()
            .find(|d| d.severity == Severity::Error)
            .map(|d| d.summary.as_str())
    }
}

/// Dispatches host requests to routed handlers
pub struct Provider {
    router: ResourceRouter,
    timeouts: Timeouts,
}

impl Provider {
    pub fn new(router: ResourceRouter, timeouts: Timeouts) -> Self {
        Self { router, timeouts }
    }

    pub fn router(&self) -> &ResourceRouter {
        &self.router
    }

    /// Run one request to completion
    pub async fn execute(&self, request: OperationRequest) -> OperationResponse {
        let response = match request.kind {
            TargetKind::Resource => self.execute_resource(&request).await,
            TargetKind::DataSource => self.execute_data_source(&request).await,
        };
        if let Some(summary) = response.error_summary() {
            error!(
                type_name = %request.type_name,
                operation = request.operation.as_str(),
                "{summary}"
            );
        }
        response
    }

    fn timeouts_for(&self, request: &OperationRequest) -> Timeouts {
        request
            .timeouts
            .map(|o| o.apply(self.timeouts))
            .unwrap_or(self.timeouts)
    }

    async fn execute_resource(&self, request: &OperationRequest) -> OperationResponse {
        if request.operation == Operation::UpgradeState {
            return match upgrade_state(&request.type_name, &request.prior_state) {
                Ok(state) => OperationResponse {
                    id: state.get("id").and_then(Value::as_str).map(str::to_string),
                    state: Some(state),
                    diagnostics: Vec::new(),
                },
                Err(e) => OperationResponse::failed(&e),
            };
        }

        let route = match self.router.resource(&request.type_name) {
            Ok(route) => route,
            Err(e) => return OperationResponse::failed(&e),
        };
        let operation = request.operation;
        let mut response = OperationResponse::default();

        let planned = match operation {
            Operation::Create | Operation::Update => {
                let mut config = request.config.clone();
                route.schema.apply_defaults(&mut config);
                match route.schema.validate(&config) {
                    Ok(warnings) => response
                        .diagnostics
                        .extend(warnings.into_iter().map(Diagnostic::warning)),
                    Err(e) => {
                        response.diagnostics.push(Diagnostic::error(&e));
                        return response;
                    }
                }
                route.schema.plan(&config, &request.prior_state)
            }
            _ => request.prior_state.clone(),
        };

        let id = request.resolved_id();
        if let Err(e) = check_id(&request.type_name, operation, &id) {
            response.diagnostics.push(Diagnostic::error(&e));
            return response;
        }

        let prior = if operation == Operation::Create {
            Map::new()
        } else {
            request.prior_state.clone()
        };
        let timeouts = self.timeouts_for(request);
        let limit = timeouts.for_operation(operation);
        let mut d = ResourceData::new(&request.type_name, id, planned, prior)
            .with_set_attributes(route.schema.set_attributes())
            .with_timeouts(timeouts)
            .with_deadline(Instant::now() + limit);

        if operation == Operation::Update {
            let replaced: Vec<&str> = route
                .schema
                .force_new_attributes()
                .into_iter()
                .filter(|name| d.has_change(name))
                .collect();
            if !replaced.is_empty() {
                response.diagnostics.push(Diagnostic::error(&Error::validation(format!(
                    "{} cannot be changed in place, the resource requires replacement",
                    replaced.join(", ")
                ))));
                response.id = Some(request.resolved_id());
                response.state = Some(request.prior_state.clone());
                return response;
            }
        }

        match operation {
            Operation::Create | Operation::Delete => info!(
                type_name = %request.type_name,
                operation = operation.as_str(),
                backend = %route.backend,
                id = d.id(),
                "running operation"
            ),
            _ => debug!(
                type_name = %request.type_name,
                operation = operation.as_str(),
                backend = %route.backend,
                id = d.id(),
                "running operation"
            ),
        }

        let handler = route.handler;
        let run = async {
            match operation {
                Operation::Create => handler.create(&mut d).await,
                Operation::Update => handler.update(&mut d).await,
                Operation::Delete => handler.delete(&mut d).await,
                Operation::Read | Operation::Import | Operation::UpgradeState => {
                    handler.read(&mut d).await
                }
            }
        };
        let result = with_timeout(operation, limit, run).await;

        match result {
            Ok(()) if operation == Operation::Delete => {}
            Ok(()) if d.is_absent() => {
                if operation == Operation::Import {
                    response.diagnostics.push(Diagnostic::error(&Error::not_found(format!(
                        "Cannot import non-existent remote object {:?}",
                        request.resolved_id()
                    ))));
                } else if operation != Operation::Read {
                    response.diagnostics.push(Diagnostic::error(&Error::Other(format!(
                        "{} of {} returned no object",
                        operation.as_str(),
                        request.type_name
                    ))));
                }
            }
            Ok(()) => {
                response.id = Some(d.id().to_string());
                response.state = Some(d.state());
            }
            Err(e) => {
                response.diagnostics.push(Diagnostic::error(&e));
                let keep_partial = matches!(operation, Operation::Create | Operation::Update);
                if keep_partial && !d.is_absent() {
                    response.id = Some(d.id().to_string());
                    response.state = Some(d.state());
                } else if !request.prior_state.is_empty() {
                    response.id = Some(request.resolved_id());
                    response.state = Some(request.prior_state.clone());
                }
            }
        }

        response
    }

    async fn execute_data_source(&self, request: &OperationRequest) -> OperationResponse {
        let route = match self.router.data_source(&request.type_name) {
            Ok(route) => route,
            Err(e) => return OperationResponse::failed(&e),
        };
        let mut response = OperationResponse::default();

        let mut config = request.config.clone();
        route.schema.apply_defaults(&mut config);
        match route.schema.validate(&config) {
            Ok(warnings) => response
                .diagnostics
                .extend(warnings.into_iter().map(Diagnostic::warning)),
            Err(e) => {
                response.diagnostics.push(Diagnostic::error(&e));
                return response;
            }
        }

        let planned = route.schema.plan(&config, &Map::new());
        let timeouts = self.timeouts_for(request);
        let limit = timeouts.read;
        let mut d = ResourceData::new(&request.type_name, "", planned, Map::new())
            .with_set_attributes(route.schema.set_attributes())
            .with_timeouts(timeouts)
            .with_deadline(Instant::now() + limit);

        debug!(type_name = %request.type_name, backend = %route.backend, "reading data source");
        let handler = route.handler;
        let result = with_timeout(Operation::Read, limit, async { handler.read(&mut d).await }).await;

        match result {
            Ok(()) => {
                response.id = Some(d.id().to_string());
                response.state = Some(d.state());
            }
            Err(e) => response.diagnostics.push(Diagnostic::error(&e)),
        }
        response
    }
}

/// Slack between the handler deadline and the outer guard: a tenth of the
/// limit, clamped to 1s..30s. The upper end covers one last HTTP request.
fn grace_period(limit: Duration) -> Duration {
    (limit / 10).clamp(Duration::from_secs(1), Duration::from_secs(30))
}

async fn with_timeout<F>(operation: Operation, limit: Duration, run: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::time::timeout(limit + grace_period(limit), run)
        .await
        .unwrap_or_else(|_| {
            Err(Error::Timeout {
                operation: operation.as_str().to_string(),
                timeout: limit,
            })
        })
}

fn check_id(type_name: &str, operation: Operation, id: &str) -> Result<()> {
    match operation {
        Operation::Create => Ok(()),
        Operation::Import => resources::validate_import_id(type_name, id),
        _ if id.is_empty() => Err(Error::invalid_id(format!(
            "{} of {type_name} requires an ID",
            operation.as_str()
        ))),
        _ => Ok(()),
    }
}

/// Migrate state written by older releases.
///
/// Credential IDs used to be `parentId/keyId`; they become
/// `parentId/password/keyId`. Everything else passes through unchanged.
pub fn upgrade_state(type_name: &str, prior: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut state = prior.clone();
    if !matches!(
        type_name,
        resources::APPLICATION_PASSWORD | resources::SERVICE_PRINCIPAL_PASSWORD
    ) {
        return Ok(state);
    }

    let id = prior.get("id").and_then(Value::as_str).unwrap_or_default();
    if id.split('/').count() == 2 {
        debug!(type_name, "migrating credential ID to the three part format");
        let upgraded = CredentialId::parse_legacy(id, CredentialKind::Password)?;
        state.insert("id".to_string(), Value::String(upgraded.to_string()));
    }
    Ok(state)
}
