use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::error::DecodeError;
use crate::transform::Gcp;

/// Durable queues, one per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Queue {
    RegisterRaster,
    GeoreferenceRaster,
    RetrieveColorsOfRaster,
    ReclassifyRaster,
}

impl Queue {
    pub const ALL: [Queue; 4] = [
        Queue::RegisterRaster,
        Queue::GeoreferenceRaster,
        Queue::RetrieveColorsOfRaster,
        Queue::ReclassifyRaster,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Queue::RegisterRaster => "register_raster",
            Queue::GeoreferenceRaster => "georeference_raster",
            Queue::RetrieveColorsOfRaster => "retrieve_colors_of_raster",
            Queue::ReclassifyRaster => "reclassify_raster",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Queue {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Queue::ALL
            .into_iter()
            .find(|q| q.name() == s)
            .ok_or_else(|| DecodeError::UnknownQueue(s.to_string()))
    }
}

/// A decoded job message.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    Register { uri: String, workspace: String },
    Georeference { uri: String, gcps: Vec<Gcp> },
    RetrieveColors { uri: String, client_id: ClientId },
    Reclassify { uri: String },
}

#[derive(Deserialize)]
struct RegisterPayload {
    uri: String,
    workspace: String,
}

#[derive(Deserialize)]
struct GeoreferencePayload {
    uri: String,
    gcps: Vec<Gcp>,
}

#[derive(Deserialize)]
struct RetrieveColorsPayload {
    uri: String,
    client_id: ClientId,
}

#[derive(Deserialize)]
struct ReclassifyPayload {
    uri: String,
}

/// Id of the client waiting for a result, echoed back as it arrived:
/// a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientId {
    Text(String),
    Number(serde_json::Number),
}

impl From<&str> for ClientId {
    fn from(text: &str) -> Self {
        ClientId::Text(text.to_string())
    }
}

impl From<u64> for ClientId {
    fn from(number: u64) -> Self {
        ClientId::Number(number.into())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientId::Text(text) => f.write_str(text),
            ClientId::Number(number) => write!(f, "{number}"),
        }
    }
}

impl JobRequest {
    /// Decodes the message body received on `queue`.
    pub fn decode(queue: Queue, body: &[u8]) -> Result<Self, DecodeError> {
        let payload_error = |source| DecodeError::Payload {
            queue: queue.name(),
            source,
        };
        let request = match queue {
            Queue::RegisterRaster => {
                let p: RegisterPayload = serde_json::from_slice(body).map_err(payload_error)?;
                JobRequest::Register {
                    uri: p.uri,
                    workspace: p.workspace,
                }
            }
            Queue::GeoreferenceRaster => {
                let p: GeoreferencePayload = serde_json::from_slice(body).map_err(payload_error)?;
                JobRequest::Georeference {
                    uri: p.uri,
                    gcps: p.gcps,
                }
            }
            Queue::RetrieveColorsOfRaster => {
                let p: RetrieveColorsPayload = serde_json::from_slice(body).map_err(payload_error)?;
                JobRequest::RetrieveColors {
                    uri: p.uri,
                    client_id: p.client_id,
                }
            }
            Queue::ReclassifyRaster => {
                let p: ReclassifyPayload = serde_json::from_slice(body).map_err(payload_error)?;
                JobRequest::Reclassify { uri: p.uri }
            }
        };
        Ok(request)
    }

    pub fn uri(&self) -> &str {
        match self {
            JobRequest::Register { uri, .. }
            | JobRequest::Georeference { uri, .. }
            | JobRequest::RetrieveColors { uri, .. }
            | JobRequest::Reclassify { uri } => uri,
        }
    }

    pub fn queue(&self) -> Queue {
        match self {
            JobRequest::Register { .. } => Queue::RegisterRaster,
            JobRequest::Georeference { .. } => Queue::GeoreferenceRaster,
            JobRequest::RetrieveColors { .. } => Queue::RetrieveColorsOfRaster,
            JobRequest::Reclassify { .. } => Queue::ReclassifyRaster,
        }
    }
}
