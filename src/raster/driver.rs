//! Format selection by file extension.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::raster::error::{RasterError, Result};
use crate::raster::types::Raster;
use crate::raster::{ascii_grid, geotiff, graphics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    GeoTiff,
    AsciiGrid,
    Graphics,
    PcRaster,
}

impl Driver {
    pub fn for_path(path: &Path) -> Result<Self> {
        let extension = extension(path).ok_or_else(|| {
            RasterError::Format(format!("{}: no file extension", path.display()))
        })?;
        match extension.as_str() {
            "tif" | "tiff" => Ok(Driver::GeoTiff),
            "asc" => Ok(Driver::AsciiGrid),
            "png" | "jpg" | "jpeg" => Ok(Driver::Graphics),
            "map" => Ok(Driver::PcRaster),
            other => Err(RasterError::Format(format!(
                "{}: unsupported extension '.{other}'",
                path.display()
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Driver::GeoTiff => "GTiff",
            Driver::AsciiGrid => "AAIGrid",
            Driver::Graphics => "PNG/JPEG",
            Driver::PcRaster => "PCRaster",
        }
    }
}

/// Opens any supported raster file into memory.
#[instrument(level = "debug")]
pub fn open(path: &Path) -> Result<Raster> {
    match Driver::for_path(path)? {
        Driver::GeoTiff => geotiff::read(path),
        Driver::AsciiGrid => ascii_grid::read(path),
        Driver::Graphics => graphics::read(path),
        driver => Err(RasterError::Format(format!(
            "{}: reading {} rasters is not supported",
            path.display(),
            driver.name()
        ))),
    }
}

/// Writes `raster` in the format chosen by the extension of `path`.
#[instrument(level = "debug", skip(raster))]
pub fn create(path: &Path, raster: &Raster) -> Result<()> {
    match Driver::for_path(path)? {
        Driver::GeoTiff => geotiff::write(path, raster),
        Driver::AsciiGrid => ascii_grid::write(path, raster),
        driver => Err(RasterError::Format(format!(
            "{}: writing {} rasters is not supported",
            path.display(),
            driver.name()
        ))),
    }
}

fn extension(path: &Path) -> Option<String> {
    // ".png" alone is a hidden file without an extension
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_graphics_file(path: impl AsRef<Path>) -> bool {
    matches!(Driver::for_path(path.as_ref()), Ok(Driver::Graphics))
}

pub fn is_geotiff_file(path: impl AsRef<Path>) -> bool {
    matches!(Driver::for_path(path.as_ref()), Ok(Driver::GeoTiff))
}

/// Same path with a `.tif` extension.
pub fn geotiff_path(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().with_extension("tif")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_graphics_file() {
        assert!(is_graphics_file("blah.png"));
        assert!(is_graphics_file("/blah.png"));
        assert!(is_graphics_file("/tmp/blah.png"));

        assert!(!is_graphics_file(".png"));
        assert!(!is_graphics_file(""));
        assert!(!is_graphics_file("png"));
        assert!(!is_graphics_file("blah"));
        assert!(!is_graphics_file("blah.dat"));
        assert!(!is_graphics_file("/tmp/blah.dat"));
    }

    #[test]
    fn test_is_geotiff_file() {
        assert!(is_geotiff_file("blah.tif"));
        assert!(is_geotiff_file("/tmp/blah.tif"));
        assert!(is_geotiff_file("blah.tiff"));
        assert!(is_geotiff_file("/tmp/blah.tiff"));

        assert!(!is_geotiff_file(".tif"));
        assert!(!is_geotiff_file("blah.png"));
        assert!(!is_geotiff_file("/tmp/blah"));
    }

    #[test]
    fn test_geotiff_path() {
        assert_eq!(geotiff_path("blah.png"), PathBuf::from("blah.tif"));
        assert_eq!(geotiff_path("/blah.png"), PathBuf::from("/blah.tif"));
        assert_eq!(geotiff_path("/tmp/blah.png"), PathBuf::from("/tmp/blah.tif"));
    }

    #[test]
    fn test_driver_names() {
        assert_eq!(Driver::for_path(Path::new("a.asc")).unwrap().name(), "AAIGrid");
        assert_eq!(Driver::for_path(Path::new("a.map")).unwrap(), Driver::PcRaster);
        assert!(Driver::for_path(Path::new("a.dat")).is_err());
    }
}
