// # terraform-provider-azuread
//
// Host binary for the Azure Active Directory provider.
//
// The binary is a thin integration layer:
// 1. Reading provider configuration from environment variables
// 2. Building the token sources and API clients
// 3. Registering the AAD Graph and MS Graph handlers with the router
// 4. Running one operation request read from stdin
//
// All resource logic lives in azuread-core and the backend crates.
//
// ## Configuration
//
// ### Credentials
// - `ARM_TENANT_ID`: Directory (tenant) ID
// - `ARM_CLIENT_ID`: Client ID of the authenticating service principal
// - `ARM_CLIENT_SECRET`: Client secret of that service principal
//
// ### Backend
// - `ARM_ENVIRONMENT`: Cloud (global, usgovernment, china, germany)
// - `ARM_USE_MSGRAPH`: Prefer the MS Graph handlers (true/false)
// - `ARM_MSGRAPH_API_VERSION`: MS Graph API version (beta, v1.0)
//
// ### Runtime
// - `ARM_TIMEOUT_SECS`: Default timeout for every operation
// - `ARM_LOG_LEVEL`: Log level (trace, debug, info, warn, error)
//
// ## Protocol
//
// stdin carries one JSON `OperationRequest`; stdout receives the JSON
// `OperationResponse`. Logs go to stderr.
//
// ## Example
//
// ```bash
// export ARM_TENANT_ID=00000000-0000-0000-0000-000000000000
// export ARM_CLIENT_ID=11111111-1111-1111-1111-111111111111
// export ARM_CLIENT_SECRET=your_secret
// export ARM_USE_MSGRAPH=true
//
// echo '{"type_name":"azuread_group","operation":"read","id":"..."}' \
//     | terraform-provider-azuread
// ```

use std::env;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use azuread_core::config::MsGraphApiVersion;
use azuread_core::{
    CloudEnvironment, LockRegistry, OperationRequest, OperationResponse, Provider,
    ProviderConfig, ResourceRouter, Timeouts,
};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes of one provider invocation
///
/// - 0: Operation succeeded
/// - 1: Configuration or startup error
/// - 2: Operation finished with error diagnostics
#[derive(Debug, Clone, Copy)]
enum ProviderExitCode {
    Success = 0,
    ConfigError = 1,
    OperationFailed = 2,
}

impl From<ProviderExitCode> for ExitCode {
    fn from(code: ProviderExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Settings read from the environment
struct Config {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    environment: String,
    use_msgraph: String,
    msgraph_api_version: String,
    timeout_secs: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            tenant_id: lookup("ARM_TENANT_ID").unwrap_or_default(),
            client_id: lookup("ARM_CLIENT_ID").unwrap_or_default(),
            client_secret: lookup("ARM_CLIENT_SECRET").unwrap_or_default(),
            environment: lookup("ARM_ENVIRONMENT").unwrap_or_else(|| "global".to_string()),
            use_msgraph: lookup("ARM_USE_MSGRAPH").unwrap_or_else(|| "false".to_string()),
            msgraph_api_version: lookup("ARM_MSGRAPH_API_VERSION")
                .unwrap_or_else(|| "beta".to_string()),
            timeout_secs: lookup("ARM_TIMEOUT_SECS"),
            log_level: lookup("ARM_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Validate the raw settings
    ///
    /// Catches what `ProviderConfig::validate` cannot see: unparseable
    /// flags, numbers and log levels.
    fn validate(&self) -> Result<()> {
        if self.tenant_id.is_empty() {
            anyhow::bail!(
                "ARM_TENANT_ID is required. \
                Set it via: export ARM_TENANT_ID=<directory id>"
            );
        }
        if self.client_id.is_empty() {
            anyhow::bail!("ARM_CLIENT_ID is required");
        }
        if self.client_secret.is_empty() {
            anyhow::bail!("ARM_CLIENT_SECRET is required");
        }

        parse_flag("ARM_USE_MSGRAPH", &self.use_msgraph)?;

        if let Some(ref raw) = self.timeout_secs {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("ARM_TIMEOUT_SECS must be a number. Got: {raw}"))?;
            if !(1..=86_400).contains(&secs) {
                anyhow::bail!("ARM_TIMEOUT_SECS must be between 1 and 86400 seconds. Got: {secs}");
            }
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ARM_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Typed provider configuration
    fn provider_config(&self) -> Result<ProviderConfig> {
        let mut config = ProviderConfig::new(&self.tenant_id, &self.client_id, &self.client_secret);
        config.environment = CloudEnvironment::from_str(&self.environment)?;
        config.use_msgraph = parse_flag("ARM_USE_MSGRAPH", &self.use_msgraph)?;
        config.msgraph_api_version = MsGraphApiVersion::from_str(&self.msgraph_api_version)?;
        if let Some(ref raw) = self.timeout_secs {
            config.timeouts = Timeouts::uniform(Duration::from_secs(raw.parse()?));
        }
        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => anyhow::bail!("{name} must be true or false. Got: {raw}"),
    }
}

fn main() -> ExitCode {
    let config = Config::from_env();

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {e}");
        return ProviderExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_writer(io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return ProviderExitCode::ConfigError.into();
    }

    let provider_config = match config.provider_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {e:#}");
            return ProviderExitCode::ConfigError.into();
        }
    };
    info!(config = ?provider_config, "Starting terraform-provider-azuread");

    let provider = match build_provider(&provider_config) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to build provider: {e:#}");
            return ProviderExitCode::ConfigError.into();
        }
    };

    let request = match read_request(io::stdin()) {
        Ok(request) => request,
        Err(e) => {
            error!("Invalid request: {e:#}");
            return ProviderExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            return ProviderExitCode::ConfigError.into();
        }
    };

    let response = rt.block_on(provider.execute(request));

    if let Err(e) = write_response(io::stdout().lock(), &response) {
        error!("Failed to write response: {e:#}");
        return ProviderExitCode::OperationFailed.into();
    }

    if response.has_errors() {
        ProviderExitCode::OperationFailed.into()
    } else {
        ProviderExitCode::Success.into()
    }
}

/// Wire the API clients into a provider
fn build_provider(config: &ProviderConfig) -> Result<Provider> {
    let locks = Arc::new(LockRegistry::new());
    let mut router = ResourceRouter::new(config.use_msgraph);

    #[cfg(feature = "aadgraph")]
    {
        use azuread_backend_aadgraph::AadGraphClient;
        use azuread_core::ClientSecretAuthorizer;

        let authorizer = Arc::new(ClientSecretAuthorizer::for_aad_graph(config)?);
        let client = AadGraphClient::new(
            config.environment.aad_graph_endpoint(),
            &config.tenant_id,
            authorizer,
        )?;
        azuread_backend_aadgraph::register(&mut router, Arc::new(client), locks.clone())?;
        info!("Registered AAD Graph handlers");
    }

    #[cfg(feature = "msgraph")]
    {
        use azuread_backend_msgraph::MsGraphClient;
        use azuread_core::ClientSecretAuthorizer;

        let authorizer = Arc::new(ClientSecretAuthorizer::for_ms_graph(config)?);
        let client = MsGraphClient::new(
            config.environment.ms_graph_endpoint(),
            config.msgraph_api_version.as_str(),
            authorizer,
        )?;
        azuread_backend_msgraph::register(&mut router, Arc::new(client), locks.clone())?;
        info!("Registered MS Graph handlers");
    }

    if router.resource_types().is_empty() {
        anyhow::bail!("no backend enabled; build with the aadgraph or msgraph feature");
    }

    info!(
        backend = %router.preferred_backend(),
        resources = router.resource_types().len(),
        data_sources = router.data_source_types().len(),
        "Provider ready"
    );
    Ok(Provider::new(router, config.timeouts))
}

fn read_request(mut input: impl Read) -> Result<OperationRequest> {
    let mut raw = String::new();
    input
        .read_to_string(&mut raw)
        .context("failed to read request from stdin")?;
    serde_json::from_str(&raw).context("request is not a valid operation request")
}

fn write_response(mut output: impl Write, response: &OperationResponse) -> Result<()> {
    serde_json::to_writer(&mut output, response)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use azuread_core::Operation;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn credentials() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ARM_TENANT_ID", "00000000-0000-0000-0000-000000000001"),
            ("ARM_CLIENT_ID", "00000000-0000-0000-0000-000000000002"),
            ("ARM_CLIENT_SECRET", "s3cret"),
        ]
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&credentials());
        assert!(cfg.validate().is_ok());

        let provider = cfg.provider_config().unwrap();
        assert_eq!(provider.environment, CloudEnvironment::Global);
        assert!(!provider.use_msgraph);
        assert_eq!(provider.msgraph_api_version, MsGraphApiVersion::Beta);
        assert_eq!(provider.timeouts, Timeouts::default());
    }

    #[test]
    fn missing_credentials_are_rejected() {
        assert!(config(&[]).validate().is_err());

        let mut vars = credentials();
        vars.retain(|(k, _)| *k != "ARM_CLIENT_SECRET");
        assert!(config(&vars).validate().is_err());
    }

    #[test]
    fn backend_settings_are_parsed() {
        let mut vars = credentials();
        vars.extend([
            ("ARM_ENVIRONMENT", "china"),
            ("ARM_USE_MSGRAPH", "TRUE"),
            ("ARM_MSGRAPH_API_VERSION", "v1.0"),
            ("ARM_TIMEOUT_SECS", "90"),
        ]);
        let provider = config(&vars).provider_config().unwrap();
        assert_eq!(provider.environment, CloudEnvironment::China);
        assert!(provider.use_msgraph);
        assert_eq!(provider.msgraph_api_version, MsGraphApiVersion::V1);
        assert_eq!(provider.timeouts.delete, Duration::from_secs(90));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            ("ARM_USE_MSGRAPH", "maybe"),
            ("ARM_TIMEOUT_SECS", "0"),
            ("ARM_TIMEOUT_SECS", "soon"),
            ("ARM_LOG_LEVEL", "loud"),
        ] {
            let mut vars = credentials();
            vars.push((key, value));
            assert!(config(&vars).validate().is_err(), "{key}={value} accepted");
        }

        let mut vars = credentials();
        vars.push(("ARM_ENVIRONMENT", "mars"));
        assert!(config(&vars).provider_config().is_err());
    }

    #[test]
    fn tenant_must_be_a_uuid() {
        let mut vars = credentials();
        vars[0] = ("ARM_TENANT_ID", "contoso");
        assert!(config(&vars).provider_config().is_err());
    }

    #[test]
    fn every_type_is_registered() {
        let cfg = config(&credentials()).provider_config().unwrap();
        let provider = build_provider(&cfg).unwrap();
        assert_eq!(
            provider.router().resource_types(),
            azuread_core::resources::RESOURCE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn request_is_read_from_json() {
        let raw = r#"{"type_name":"azuread_group","operation":"read","id":"abc"}"#;
        let request = read_request(raw.as_bytes()).unwrap();
        assert_eq!(request.type_name, "azuread_group");
        assert_eq!(request.operation, Operation::Read);
        assert_eq!(request.id.as_deref(), Some("abc"));

        assert!(read_request("not json".as_bytes()).is_err());
    }

    #[test]
    fn response_is_one_json_line() {
        let response = OperationResponse {
            id: Some("abc".to_string()),
            ..OperationResponse::default()
        };
        let mut out = Vec::new();
        write_response(&mut out, &response).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        let parsed: OperationResponse = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed, response);
    }
}
