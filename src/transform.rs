//! Raster transform library
//!
//! Stateless file-in/file-out operations on rasters: format conversion,
//! georeferencing, reprojection, clipping, subtraction and color
//! classification.

mod classify;
mod clip;
mod convert;
pub mod georeference;
mod reproject;
mod subtract;
pub mod warp;


pub use classify::{CLASS_NODATA, Rgb, classify, classify_raster, extract_colors};
pub use clip::clip;
pub use convert::{OPAQUE, convert_image_to_raster, reformat};
pub use georeference::{Gcp, georeference};
pub use reproject::{TemplateOptions, reproject, reproject_to_template, reproject_to_template_with};
pub use subtract::{difference, subtract};
pub use warp::{Grid, Resampling};
