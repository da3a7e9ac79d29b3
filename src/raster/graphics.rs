//! Plain graphics files (PNG, JPEG) read as ungeoreferenced rasters.

use std::path::Path;

use image::{ColorType, DynamicImage};
use tracing::debug;

use crate::raster::error::{RasterError, Result};
use crate::raster::types::{Band, CellType, Profile, Raster};

/// Reads an RGB or RGBA image as a 3- or 4-band 8-bit raster.
///
/// The result carries no CRS and an identity transform.
pub fn read(path: &Path) -> Result<Raster> {
    let image = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(source) => RasterError::io(path, source),
        other => RasterError::decode(path, other),
    })?;

    let (width, height) = (image.width() as usize, image.height() as usize);
    debug!(path = %path.display(), width, height, color = ?image.color(), "Decoded graphics file");

    let (channels, samples) = match image.color() {
        ColorType::Rgb8 => (3, into_rgb(image)),
        ColorType::Rgba8 => (4, into_rgba(image)),
        other => {
            return Err(RasterError::Format(format!(
                "{}: expected an RGB or RGBA image, found {other:?}",
                path.display()
            )));
        }
    };

    let bands = (0..channels)
        .map(|c| {
            let data = samples
                .iter()
                .skip(c)
                .step_by(channels)
                .map(|&v| f64::from(v))
                .collect();
            Band::new(width, height, data)
        })
        .collect::<Result<Vec<_>>>()?;

    Raster::new(Profile::new(width, height, CellType::UInt8), bands)
}

fn into_rgb(image: DynamicImage) -> Vec<u8> {
    image.into_rgb8().into_raw()
}

fn into_rgba(image: DynamicImage) -> Vec<u8> {
    image.into_rgba8().into_raw()
}
