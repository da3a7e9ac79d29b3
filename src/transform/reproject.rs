//! Reprojection onto a computed grid or onto the grid of a template raster.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::raster::{self, Affine, Bounds, CoordTransformer, Crs, Profile, Raster, RasterError, Result, Window};
use crate::transform::warp::{self, Grid, Resampling};

/// Overrides for rasters stored without a CRS, and post-warp clipping.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateOptions {
    pub source_crs: Option<Crs>,
    pub template_crs: Option<Crs>,
    pub clip: bool,
}

/// Reprojects `source` into `crs` on a grid covering the source extent.
#[instrument]
pub fn reproject(source: &Path, target: &Path, crs: Crs, resampling: Resampling) -> Result<()> {
    let raster = raster::open(source)?;
    let source_crs = required_crs(raster.crs(), source)?;

    let grid = Grid::covering(
        source_crs,
        &raster.transform(),
        raster.width(),
        raster.height(),
        crs,
    )?;
    let result = warp_onto(&raster, source_crs, &grid, resampling)?;
    raster::create(target, &result)?;

    info!(width = grid.width, height = grid.height, %crs, "Reprojected raster");
    Ok(())
}

/// Reprojects `source` onto the exact grid of `template`.
///
/// Band count, cell type and nodata come from the source; CRS, transform
/// and size from the template.
pub fn reproject_to_template(
    source: &Path,
    template: &Path,
    target: &Path,
    resampling: Resampling,
    clip: bool,
) -> Result<()> {
    let options = TemplateOptions {
        clip,
        ..TemplateOptions::default()
    };
    reproject_to_template_with(source, template, target, resampling, options)
}

#[instrument]
pub fn reproject_to_template_with(
    source: &Path,
    template: &Path,
    target: &Path,
    resampling: Resampling,
    options: TemplateOptions,
) -> Result<()> {
    let raster = raster::open(source)?;
    let template_raster = raster::open(template)?;

    let source_crs = required_crs(options.source_crs.or(raster.crs()), source)?;
    let template_crs = required_crs(options.template_crs.or(template_raster.crs()), template)?;
    let grid = Grid {
        crs: template_crs,
        transform: template_raster.transform(),
        width: template_raster.width(),
        height: template_raster.height(),
    };
    drop(template_raster);

    let mut result = warp_onto(&raster, source_crs, &grid, resampling)?;

    if options.clip {
        let transformer = CoordTransformer::new(source_crs, template_crs)?;
        let extent = transformer.transform_bounds(&raster.bounds())?;
        let window = covering_window(&grid, &extent)?;
        debug!(?window, "Clipping to source extent");
        result = result.read_window(&window)?;
    }

    raster::create(target, &result)?;
    info!(
        width = result.width(),
        height = result.height(),
        crs = %template_crs,
        "Reprojected raster onto template"
    );
    Ok(())
}

fn warp_onto(raster: &Raster, source_crs: Crs, grid: &Grid, resampling: Resampling) -> Result<Raster> {
    let bands = warp::warp(raster, source_crs, &raster.transform(), grid, resampling)?;
    let profile = Profile {
        width: grid.width,
        height: grid.height,
        crs: Some(grid.crs),
        transform: grid.transform,
        ..raster.profile().clone()
    };
    Raster::new(profile, bands)
}

fn required_crs(crs: Option<Crs>, path: &Path) -> Result<Crs> {
    crs.ok_or_else(|| RasterError::Projection(format!("{} has no CRS", path.display())))
}

/// Smallest window of `grid` containing `extent`, limited to the grid.
fn covering_window(grid: &Grid, extent: &Bounds) -> Result<Window> {
    let inverse: Affine = grid
        .transform
        .inverse()
        .ok_or_else(|| RasterError::Projection("template transform is not invertible".to_string()))?;

    let corners = [
        inverse.apply(extent.left, extent.top),
        inverse.apply(extent.right, extent.top),
        inverse.apply(extent.left, extent.bottom),
        inverse.apply(extent.right, extent.bottom),
    ];
    let span = |values: [f64; 4], limit: usize| {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let first = snap(min).floor().clamp(0.0, limit as f64) as usize;
        let last = snap(max).ceil().clamp(0.0, limit as f64) as usize;
        (first, last)
    };
    let (col_first, col_last) = span(corners.map(|c| c.0), grid.width);
    let (row_first, row_last) = span(corners.map(|c| c.1), grid.height);

    if col_last <= col_first || row_last <= row_first {
        return Err(RasterError::OutOfBounds(format!(
            "{extent:?} does not intersect the template grid"
        )));
    }
    Ok(Window::new(
        col_first,
        row_first,
        col_last - col_first,
        row_last - row_first,
    ))
}

fn snap(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
