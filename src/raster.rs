//! Raster I/O module
//!
//! Opens and creates raster datasets and exposes their bands and
//! geospatial metadata. Every raster is read fully into memory and the file
//! is closed before the call returns.

pub mod affine;
mod ascii_grid;
pub mod crs;
mod driver;
pub mod error;
pub mod geotiff;
mod graphics;
pub mod types;


pub use affine::{Affine, Bounds, Window};
pub use crs::{CoordTransformer, Crs};
pub use driver::{Driver, create, geotiff_path, is_geotiff_file, is_graphics_file, open};
pub use error::{RasterError, Result};
pub use types::{Band, CellType, Profile, Raster, grid_window};
