//! Thin HTTP client for `graph.microsoft.com`.
//!
//! One request per call, no retries. Status codes are mapped onto the core
//! error variants so handlers can tell absence (`NotFound`) from throttling
//! and permanent failures.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use azuread_core::{Authorizer, Error, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ODataErrorBody {
    #[serde(default)]
    error: ODataError,
}

#[derive(Debug, Default, Deserialize)]
struct ODataError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Directory object reference as returned by `owners` / `members`
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryObjectRef {
    pub id: String,
}

/// Build an OData equality filter, quoting `value`
pub fn eq_filter(field: &str, value: &str) -> String {
    format!("{field} eq '{}'", value.replace('\'', "''"))
}

pub struct MsGraphClient {
    base_url: String,
    http: reqwest::Client,
    authorizer: Arc<dyn Authorizer>,
}

impl fmt::Debug for MsGraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsGraphClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MsGraphClient {
    /// Client for `{endpoint}/{api_version}`, e.g. `https://graph.microsoft.com/beta`
    pub fn new(endpoint: &str, api_version: &str, authorizer: Arc<dyn Authorizer>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: format!("{}/{}", endpoint.trim_end_matches('/'), api_version),
            http,
            authorizer,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `@odata.id` of a directory object, used when binding references
    pub fn directory_object_url(&self, id: &str) -> String {
        format!("{}/directoryObjects/{id}", self.base_url)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    async fn send(&self, method: Method, url: &str, body: Option<Value>) -> Result<reqwest::Response> {
        let token = self.authorizer.token().await?;
        trace!(%method, url, "msgraph request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {e}")))?;

        if response.status().is_success() {
            return Ok(response);
        }
        Err(self.error_for(&method, url, response).await)
    }

    async fn error_for(&self, method: &Method, url: &str, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        let body: ODataErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = if body.error.message.is_empty() {
            text
        } else {
            body.error.message
        };
        debug!(%method, url, status, code = %body.error.code, "msgraph request failed");

        match status {
            401 => {
                self.authorizer.invalidate().await;
                Error::auth(format!("{status}: {message}"))
            }
            403 => Error::auth(format!("{status}: {message}")),
            404 => Error::not_found(format!("{method} {url}: {message}")),
            429 => Error::throttled(message),
            _ => Error::api(status, body.error.code, message),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, &self.url(path), None).await?;
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {e}")))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// GET a collection, following `@odata.nextLink` until exhausted
    pub async fn list<T: DeserializeOwned>(&self, path: &str, filter: Option<&str>) -> Result<Vec<T>> {
        let mut url = self.url(path);
        if let Some(filter) = filter {
            let sep = if url.contains('?') { '&' } else { '?' };
            url = format!("{url}{sep}$filter={}", urlencoding::encode(filter));
        }

        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let page: Page<T> = self.get(&url).await?;
            items.extend(page.value);
            next = page.next_link;
        }
        Ok(items)
    }

    /// IDs of the objects in a reference collection such as `/groups/{id}/members`
    pub async fn list_refs(&self, path: &str) -> Result<Vec<String>> {
        let refs: Vec<DirectoryObjectRef> = self.list(path, None).await?;
        Ok(refs.into_iter().map(|r| r.id).collect())
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::POST, &self.url(path), Some(serde_json::to_value(body)?))
            .await?;
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {e}")))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// POST whose response body is ignored (`$ref` additions)
    pub async fn post_no_content<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send(Method::POST, &self.url(path), Some(serde_json::to_value(body)?))
            .await?;
        Ok(())
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send(Method::PATCH, &self.url(path), Some(serde_json::to_value(body)?))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, &self.url(path), None).await?;
        Ok(())
    }
}
