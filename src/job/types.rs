use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle of a job, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploaded,
    Registered,
    Georeferenced,
    Colorized,
    Classified,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Registered => "registered",
            JobStatus::Georeferenced => "georeferenced",
            JobStatus::Colorized => "colorized",
            JobStatus::Classified => "classified",
        };
        f.write_str(name)
    }
}

/// Snapshot of a job as stored by the job service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub pathname: PathBuf,
    pub status: JobStatus,
    pub user: String,
    #[serde(default)]
    pub layer_name: Option<String>,
}

/// Fields to change on a job record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
}
