use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::debug;

use crate::job::error::NotifyError;
use crate::job::request::ClientId;
use crate::transform::Rgb;

/// Delivers operation results to the client that asked for them.
pub trait Notifier {
    fn notify_colors(&self, client_id: &ClientId, colors: &[Rgb]) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ColorsNotification<'a> {
    pub client_id: &'a ClientId,
    pub result: ColorsResult<'a>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ColorsResult<'a> {
    pub colors: &'a [Rgb],
}

/// Posts notifications as JSON to the client notifier service.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    uri: String,
}

impl HttpNotifier {
    pub fn new(uri: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self {
            client,
            uri: uri.to_string(),
        })
    }
}

impl Notifier for HttpNotifier {
    fn notify_colors(&self, client_id: &ClientId, colors: &[Rgb]) -> Result<(), NotifyError> {
        let payload = ColorsNotification {
            client_id,
            result: ColorsResult { colors },
        };
        let response = self
            .client
            .post(&self.uri)
            .json(&payload)
            .send()
            .map_err(|source| NotifyError::Transport {
                uri: self.uri.clone(),
                source,
            })?;

        let status = response.status();
        debug!(uri = %self.uri, status = status.as_u16(), %client_id, "Sent notification");
        if status != StatusCode::CREATED {
            return Err(NotifyError::Status {
                uri: self.uri.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
