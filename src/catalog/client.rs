use std::path::Path;

use crate::catalog::error::Result;

/// Operations of the remote map catalog used to publish rasters.
///
/// A store and the coverage layer it holds share one name.
pub trait CatalogClient {
    fn workspace_names(&self) -> Result<Vec<String>>;

    fn create_workspace(&self, name: &str) -> Result<()>;

    /// Deletes a workspace together with everything it contains.
    fn delete_workspace(&self, name: &str) -> Result<()>;

    /// Registers the GeoTIFF at `path` as a coverage store and layer.
    fn create_external_geotiff_store(&self, workspace: &str, store: &str, path: &Path)
    -> Result<()>;

    /// Deletes a store, purging its layers.
    fn delete_store(&self, workspace: &str, store: &str) -> Result<()>;

    /// Makes the catalog reread its configuration.
    fn reload(&self) -> Result<()>;
}
