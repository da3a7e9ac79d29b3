use std::path::Path;

use tracing::{debug, instrument};

use crate::raster::{self, Profile, Raster, RasterError, Result};

/// Cuts the part of `large` covered by `small` and writes it to `target`.
///
/// The result takes the transform of `small` as is, so rounding the window
/// never shifts the output grid.
#[instrument]
pub fn clip(large: &Path, small: &Path, target: &Path) -> Result<()> {
    let large = raster::open(large)?;
    let small = raster::open(small)?;

    if large.crs() != small.crs() {
        return Err(RasterError::crs_mismatch(large.crs(), small.crs()));
    }

    let window = large.window(&small.bounds())?;
    debug!(?window, "Clip window");
    let (profile, bands) = large.read_window(&window)?.into_parts();

    let profile = Profile {
        transform: small.transform(),
        ..profile
    };
    raster::create(target, &Raster::new(profile, bands)?)
}
