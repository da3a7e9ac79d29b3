//! GeoServer REST implementation of [`CatalogClient`].

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::catalog::client::CatalogClient;
use crate::catalog::error::{CatalogError, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Talks to the REST API rooted at `base_uri`, e.g.
/// `http://geoserver:8080/geoserver/rest`.
#[derive(Clone)]
pub struct RestCatalogClient {
    client: Client,
    base_uri: String,
    user: String,
    password: String,
}

impl std::fmt::Debug for RestCatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestCatalogClient")
            .field("base_uri", &self.base_uri)
            .field("user", &self.user)
            .finish()
    }
}

impl RestCatalogClient {
    pub fn new(base_uri: &str, user: &str, password: &str) -> Result<Self> {
        Self::with_timeout(base_uri, user, password, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_uri: &str, user: &str, password: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_uri: base_uri.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_uri, path)
    }

    fn send(
        &self,
        method: &'static str,
        url: &str,
        request: RequestBuilder,
        accepted: &[StatusCode],
    ) -> Result<Response> {
        let response = request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|source| CatalogError::Transport {
                method,
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        debug!(method, url, status = status.as_u16(), "Catalog request");
        if !accepted.contains(&status) {
            return Err(CatalogError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct WorkspaceList {
    workspaces: WorkspaceEntries,
}

/// The catalog answers an empty string when no workspace exists.
#[derive(Deserialize)]
#[serde(untagged)]
enum WorkspaceEntries {
    Some { workspace: Vec<WorkspaceEntry> },
    None(serde::de::IgnoredAny),
}

#[derive(Deserialize)]
struct WorkspaceEntry {
    name: String,
}

fn parse_workspace_names(url: &str, body: &str) -> Result<Vec<String>> {
    let list: WorkspaceList = serde_json::from_str(body).map_err(|e| CatalogError::Response {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(match list.workspaces {
        WorkspaceEntries::Some { workspace } => workspace.into_iter().map(|w| w.name).collect(),
        WorkspaceEntries::None(_) => Vec::new(),
    })
}

fn file_uri(path: &Path) -> Result<String> {
    let absolute =
        std::path::absolute(path).map_err(|_| CatalogError::InvalidPath(path.to_path_buf()))?;
    Ok(format!("file://{}", absolute.display()))
}

impl CatalogClient for RestCatalogClient {
    fn workspace_names(&self) -> Result<Vec<String>> {
        let url = self.url("workspaces.json");
        let response = self.send("GET", &url, self.client.get(&url), &[StatusCode::OK])?;
        let body = response.text().map_err(|source| CatalogError::Transport {
            method: "GET",
            url: url.clone(),
            source,
        })?;
        parse_workspace_names(&url, &body)
    }

    fn create_workspace(&self, name: &str) -> Result<()> {
        let url = self.url("workspaces");
        let request = self
            .client
            .post(&url)
            .json(&json!({ "workspace": { "name": name } }));
        self.send("POST", &url, request, &[StatusCode::CREATED])?;
        Ok(())
    }

    fn delete_workspace(&self, name: &str) -> Result<()> {
        let url = self.url(&format!("workspaces/{name}?recurse=true"));
        self.send("DELETE", &url, self.client.delete(&url), &[StatusCode::OK])?;
        Ok(())
    }

    fn create_external_geotiff_store(&self, workspace: &str, store: &str, path: &Path) -> Result<()> {
        let url = self.url(&format!(
            "workspaces/{workspace}/coveragestores/{store}/external.geotiff?configure=first&coverageName={store}"
        ));
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(file_uri(path)?);
        self.send("PUT", &url, request, &[StatusCode::OK, StatusCode::CREATED])?;
        Ok(())
    }

    fn delete_store(&self, workspace: &str, store: &str) -> Result<()> {
        let url = self.url(&format!(
            "workspaces/{workspace}/coveragestores/{store}?purge=all&recurse=true"
        ));
        self.send("DELETE", &url, self.client.delete(&url), &[StatusCode::OK])?;
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        let url = self.url("reload");
        self.send("POST", &url, self.client.post(&url), &[StatusCode::OK])?;
        Ok(())
    }
}
