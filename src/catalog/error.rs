use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request {method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Catalog answered {method} {url} with HTTP {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("Unexpected catalog response from {url}: {reason}")]
    Response { url: String, reason: String },

    #[error("Workspace '{0}' does not exist")]
    WorkspaceNotFound(String),

    #[error("Cannot publish {0}: no usable file name")]
    InvalidPath(PathBuf),

    #[error("Failed to create catalog client: {0}")]
    Client(String),
}

impl CatalogError {
    /// Network failures and server-side errors may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Transport { .. } => true,
            CatalogError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
