//! Job state machine
//!
//! Every operation requires one entry status. A request for a job in any
//! other status is skipped without touching files or the catalog, which
//! makes redelivered and out-of-order messages harmless.

use tracing::{info, info_span, instrument, warn};

use crate::catalog::{CatalogClient, CatalogSynchronizer};
use crate::job::error::{Result, StaleJob};
use crate::job::notifier::Notifier;
use crate::job::request::{ClientId, JobRequest};
use crate::job::types::{JobPatch, JobRecord, JobStatus};
use crate::raster::{Crs, RasterError, geotiff_path, is_graphics_file};
use crate::transform::{self, Gcp};

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The operation ran and the job moves to `status`.
    Advanced {
        status: JobStatus,
        layer_name: Option<String>,
    },
    /// The operation ran and the status stays as it is.
    Unchanged,
    /// The job was not in the operation's entry status.
    Skipped(StaleJob),
}

impl Outcome {
    /// Changes to store on the job record, if any.
    pub fn patch(&self) -> Option<JobPatch> {
        match self {
            Outcome::Advanced { status, layer_name } => Some(JobPatch {
                status: Some(*status),
                layer_name: layer_name.clone(),
            }),
            Outcome::Unchanged | Outcome::Skipped(_) => None,
        }
    }
}

pub struct JobStateMachine<C: CatalogClient, N: Notifier> {
    catalog: CatalogSynchronizer<C>,
    notifier: N,
    target_crs: Crs,
}

impl<C: CatalogClient, N: Notifier> JobStateMachine<C, N> {
    pub fn new(catalog: CatalogSynchronizer<C>, notifier: N, target_crs: Crs) -> Self {
        Self {
            catalog,
            notifier,
            target_crs,
        }
    }

    pub fn catalog(&self) -> &CatalogSynchronizer<C> {
        &self.catalog
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Status a job must have for `request` to apply.
    pub fn entry_status(request: &JobRequest) -> JobStatus {
        match request {
            JobRequest::Register { .. } => JobStatus::Uploaded,
            JobRequest::Georeference { .. } => JobStatus::Registered,
            JobRequest::RetrieveColors { .. } | JobRequest::Reclassify { .. } => {
                JobStatus::Georeferenced
            }
        }
    }

    #[instrument(skip_all, fields(queue = %request.queue(), uri = request.uri(), status = %record.status))]
    pub fn handle(&self, request: &JobRequest, record: &JobRecord) -> Result<Outcome> {
        let expected = Self::entry_status(request);
        if record.status != expected {
            let stale = StaleJob {
                operation: request.queue().name(),
                expected,
                actual: record.status,
            };
            warn!(%stale, "Skipping stale job");
            return Ok(Outcome::Skipped(stale));
        }

        match request {
            JobRequest::Register { workspace, .. } => self.register(record, workspace),
            JobRequest::Georeference { gcps, .. } => self.georeference(record, gcps),
            JobRequest::RetrieveColors { client_id, .. } => self.retrieve_colors(record, client_id),
            JobRequest::Reclassify { .. } => {
                info!(pathname = %record.pathname.display(), "Reclassification is not available, ignoring");
                Ok(Outcome::Unchanged)
            }
        }
    }

    fn register(&self, record: &JobRecord, workspace: &str) -> Result<Outcome> {
        let raster_path = geotiff_path(&record.pathname);
        std::fs::metadata(&record.pathname).map_err(|e| RasterError::io(&record.pathname, e))?;

        if is_graphics_file(&record.pathname) {
            let _span = info_span!("convert_image").entered();
            transform::convert_image_to_raster(&record.pathname, &raster_path, self.target_crs)?;
        }

        let layer_name = {
            let _span = info_span!("publish").entered();
            self.catalog.ensure_workspace(workspace)?;
            self.catalog.publish(workspace, &raster_path)?
        };

        info!(%layer_name, "Registered raster");
        Ok(Outcome::Advanced {
            status: JobStatus::Registered,
            layer_name: Some(layer_name),
        })
    }

    fn georeference(&self, record: &JobRecord, gcps: &[Gcp]) -> Result<Outcome> {
        let raster_path = geotiff_path(&record.pathname);

        {
            let _span = info_span!("georeference", gcps = gcps.len()).entered();
            transform::georeference(&raster_path, gcps, self.target_crs)?;
        }

        let layer_name = {
            let _span = info_span!("republish").entered();
            self.catalog.republish(&record.user, &raster_path)?
        };

        info!(%layer_name, "Georeferenced raster");
        Ok(Outcome::Advanced {
            status: JobStatus::Georeferenced,
            layer_name: Some(layer_name),
        })
    }

    fn retrieve_colors(&self, record: &JobRecord, client_id: &ClientId) -> Result<Outcome> {
        let raster_path = geotiff_path(&record.pathname);
        let colors = transform::extract_colors(&raster_path)?;
        self.notifier.notify_colors(client_id, &colors)?;
        info!(count = colors.len(), %client_id, "Sent raster colors");
        Ok(Outcome::Unchanged)
    }
}
