use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::job::{JobPatch, JobRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job service request {method} {uri} failed: {source}")]
    Transport {
        method: &'static str,
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Job service answered {method} {uri} with HTTP {status}")]
    Status {
        method: &'static str,
        uri: String,
        status: u16,
    },

    #[error("Unexpected job record from {uri}: {reason}")]
    Body { uri: String, reason: String },

    #[error("Failed to create job service client: {0}")]
    Client(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport { .. } => true,
            StoreError::Status { status, .. } => *status >= 500,
            StoreError::Body { .. } | StoreError::Client(_) => false,
        }
    }
}

/// Where job records live.
pub trait JobStore {
    fn fetch(&self, uri: &str) -> Result<JobRecord, StoreError>;

    fn update(&self, uri: &str, patch: &JobPatch) -> Result<(), StoreError>;
}

#[derive(Deserialize)]
struct PlanResponse {
    plan: JobRecord,
}

pub(crate) fn parse_record(uri: &str, body: &str) -> Result<JobRecord, StoreError> {
    serde_json::from_str::<PlanResponse>(body)
        .map(|response| response.plan)
        .map_err(|e| StoreError::Body {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
}

/// Job records behind a REST service: `GET uri` and `PATCH uri`.
#[derive(Debug, Clone)]
pub struct HttpJobStore {
    client: Client,
}

impl HttpJobStore {
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl JobStore for HttpJobStore {
    fn fetch(&self, uri: &str) -> Result<JobRecord, StoreError> {
        let transport = |source| StoreError::Transport {
            method: "GET",
            uri: uri.to_string(),
            source,
        };
        let response = self.client.get(uri).send().map_err(transport)?;
        let status = response.status();
        debug!(uri, status = status.as_u16(), "Fetched job record");
        if status != StatusCode::OK {
            return Err(StoreError::Status {
                method: "GET",
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().map_err(transport)?;
        parse_record(uri, &body)
    }

    fn update(&self, uri: &str, patch: &JobPatch) -> Result<(), StoreError> {
        let response = self
            .client
            .patch(uri)
            .json(patch)
            .send()
            .map_err(|source| StoreError::Transport {
                method: "PATCH",
                uri: uri.to_string(),
                source,
            })?;
        let status = response.status();
        debug!(uri, status = status.as_u16(), "Updated job record");
        if status != StatusCode::OK {
            return Err(StoreError::Status {
                method: "PATCH",
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[test]
    fn test_parse_plan_envelope() {
        let body = r#"{"plan": {"pathname": "/data/a.tif", "status": "registered", "user": "alice", "layer_name": "alice:a"}}"#;
        let record = parse_record("u", body).unwrap();
        assert_eq!(record.status, JobStatus::Registered);
        assert_eq!(record.layer_name.as_deref(), Some("alice:a"));
    }

    #[test]
    fn test_parse_bare_record_fails() {
        let body = r#"{"pathname": "/data/a.tif", "status": "registered", "user": "alice"}"#;
        let error = parse_record("u", body).unwrap_err();
        assert!(!error.is_retryable());
    }
}
