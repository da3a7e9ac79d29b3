use std::path::Path;

use tracing::{info, instrument};

use crate::catalog::client::CatalogClient;
use crate::catalog::error::{CatalogError, Result};

/// Keeps the layers published in the catalog in line with rasters on disk.
///
/// A raster is published as store and layer named after its file stem, in
/// the workspace of its owner.
pub struct CatalogSynchronizer<C: CatalogClient> {
    client: C,
}

impl<C: CatalogClient> CatalogSynchronizer<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    #[instrument(skip(self))]
    pub fn ensure_workspace(&self, name: &str) -> Result<()> {
        if self.client.workspace_names()?.iter().any(|n| n == name) {
            return Ok(());
        }
        self.client.create_workspace(name)?;
        info!(workspace = name, "Created workspace");
        Ok(())
    }

    /// Publishes the raster as a new layer and returns `workspace:stem`.
    #[instrument(skip(self))]
    pub fn publish(&self, workspace: &str, raster_path: &Path) -> Result<String> {
        let store = store_name(raster_path)?;
        self.client
            .create_external_geotiff_store(workspace, &store, raster_path)?;
        let layer = format!("{workspace}:{store}");
        info!(%layer, "Published layer");
        Ok(layer)
    }

    /// Deletes and recreates the store so viewers see the new file contents.
    ///
    /// Between the delete and the create the layer does not exist.
    #[instrument(skip(self))]
    pub fn republish(&self, workspace: &str, raster_path: &Path) -> Result<String> {
        let store = store_name(raster_path)?;
        self.client.delete_store(workspace, &store)?;
        self.client.reload()?;
        self.publish(workspace, raster_path)
    }

    #[instrument(skip(self))]
    pub fn remove_workspace(&self, name: &str) -> Result<()> {
        if !self.client.workspace_names()?.iter().any(|n| n == name) {
            return Err(CatalogError::WorkspaceNotFound(name.to_string()));
        }
        self.client.delete_workspace(name)?;
        self.client.reload()?;
        info!(workspace = name, "Removed workspace");
        Ok(())
    }
}

pub fn store_name(raster_path: &Path) -> Result<String> {
    raster_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CatalogError::InvalidPath(raster_path.to_path_buf()))
}
