//! Color classification of RGBA rasters.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use tracing::{debug, instrument};

use crate::raster::{self, Band, CellType, Profile, Raster, RasterError, Result};

/// Class id written where a cell is masked or its color is not in the LUT.
pub const CLASS_NODATA: i32 = -999;

pub type Rgb = [u8; 3];

/// Maps each RGBA cell to the class id of its color.
///
/// The result is a single 32-bit integer band declaring
/// [`CLASS_NODATA`] as its nodata value.
#[instrument(skip(lut), fields(classes = lut.len()))]
pub fn classify(path: &Path, lut: &HashMap<Rgb, i32>, result: &Path) -> Result<()> {
    let raster = raster::open(path)?;
    let classified = classify_raster(&raster, lut)?;
    raster::create(result, &classified)
}

pub fn classify_raster(raster: &Raster, lut: &HashMap<Rgb, i32>) -> Result<Raster> {
    require_rgba8(raster)?;

    let mask = raster.dataset_mask();
    let [r, g, b] = [0, 1, 2].map(|i| raster.bands()[i].data());
    let data = mask
        .iter()
        .enumerate()
        .map(|(i, &valid)| {
            let class = valid
                .then(|| lut.get(&[r[i] as u8, g[i] as u8, b[i] as u8]))
                .flatten()
                .copied()
                .unwrap_or(CLASS_NODATA);
            f64::from(class)
        })
        .collect();

    let profile = Profile {
        cell_type: CellType::Int32,
        nodata: Some(f64::from(CLASS_NODATA)),
        ..raster.profile().clone()
    };
    Raster::new(profile, vec![Band::new(raster.width(), raster.height(), data)?])
}

/// Distinct colors of an 8-bit RGBA raster, alpha ignored, sorted.
#[instrument]
pub fn extract_colors(path: &Path) -> Result<Vec<Rgb>> {
    let raster = raster::open(path)?;
    require_rgba8(&raster)?;

    let [r, g, b] = [0, 1, 2].map(|i| raster.bands()[i].data());
    let colors: BTreeSet<Rgb> = (0..r.len())
        .map(|i| [r[i] as u8, g[i] as u8, b[i] as u8])
        .collect();
    debug!(count = colors.len(), "Extracted colors");
    Ok(colors.into_iter().collect())
}

fn require_rgba8(raster: &Raster) -> Result<()> {
    if raster.band_count() != 4 {
        return Err(RasterError::Format(format!(
            "expected 4 bands (RGB and mask), found {}",
            raster.band_count()
        )));
    }
    if raster.cell_type() != CellType::UInt8 {
        return Err(RasterError::Type(format!(
            "colors need 8-bit channels, found {}",
            raster.cell_type()
        )));
    }
    Ok(())
}
