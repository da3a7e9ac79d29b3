//! Format conversions.

use std::path::Path;

use tracing::{info, instrument};

use crate::raster::{self, Affine, Band, Crs, Profile, Raster, RasterError, Result};

/// Alpha value of a fully opaque cell.
pub const OPAQUE: f64 = 255.0;

/// Converts an RGB(A) image into a GeoTIFF (or any writable format).
///
/// A missing alpha band is added as fully opaque. The image is placed with
/// its top-left corner at `(0, height)` and unit cells, so row 0 is the
/// northernmost row.
#[instrument]
pub fn convert_image_to_raster(image_path: &Path, raster_path: &Path, crs: Crs) -> Result<()> {
    let image = raster::open(image_path)?;
    let (profile, mut bands) = image.into_parts();

    match bands.len() {
        3 => bands.push(Band::filled(profile.width, profile.height, OPAQUE)),
        4 => {}
        count => {
            return Err(RasterError::Format(format!(
                "{}: expected 3 or 4 bands, found {count}",
                image_path.display()
            )));
        }
    }

    let profile = Profile {
        crs: Some(crs),
        transform: Affine::from_origin(0.0, profile.height as f64, 1.0, 1.0),
        nodata: None,
        ..profile
    };
    let raster = Raster::new(profile, bands)?;
    raster::create(raster_path, &raster)?;

    info!(
        width = raster.width(),
        height = raster.height(),
        "Converted image to raster"
    );
    Ok(())
}

/// Rewrites a raster in the format chosen by the extension of `target`.
#[instrument]
pub fn reformat(source: &Path, target: &Path, override_crs: Option<Crs>) -> Result<()> {
    let mut raster = raster::open(source)?;
    if let Some(crs) = override_crs {
        raster.set_crs(Some(crs));
    }
    raster::create(target, &raster)
}
