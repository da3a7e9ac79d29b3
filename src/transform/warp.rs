//! Resampling of raster bands onto a destination grid.
//!
//! Every destination cell is mapped back into the source grid: its corners
//! through the destination transform, the CRS transform and the inverse
//! source transform. Nearest takes the source cell under the destination
//! cell centre, average takes the mean of all valid source cells whose
//! centres fall inside the destination cell footprint.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::raster::types::is_nodata;
use crate::raster::{Affine, Band, Bounds, CoordTransformer, Crs, Raster, RasterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    /// Keeps source values unchanged. Use it for classified rasters.
    #[default]
    Nearest,
    /// Mean of the covered source cells. Use it for continuous rasters.
    Average,
}

impl FromStr for Resampling {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Resampling::Nearest),
            "average" => Ok(Resampling::Average),
            other => Err(RasterError::Format(format!(
                "unknown resampling method '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resampling::Nearest => f.write_str("nearest"),
            Resampling::Average => f.write_str("average"),
        }
    }
}

/// Placement and size of a destination grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub crs: Crs,
    pub transform: Affine,
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub fn bounds(&self) -> Bounds {
        Bounds::of_grid(&self.transform, self.width, self.height)
    }

    /// North-up grid covering `source` in `target`, keeping roughly the same
    /// number of cells along the diagonal.
    ///
    /// The cell count is rounded and the cell size adjusted afterwards, so the
    /// grid covers the transformed extent exactly.
    pub fn covering(
        source_crs: Crs,
        source_transform: &Affine,
        width: usize,
        height: usize,
        target: Crs,
    ) -> Result<Grid> {
        let transformer = CoordTransformer::new(source_crs, target)?;
        let extent =
            transformer.transform_bounds(&Bounds::of_grid(source_transform, width, height))?;
        if extent.width() <= 0.0 || extent.height() <= 0.0 || !extent.width().is_finite() {
            return Err(RasterError::Projection(format!(
                "degenerate extent {extent:?} in {target}"
            )));
        }

        let source_diagonal = ((width * width + height * height) as f64).sqrt();
        let target_diagonal = extent.width().hypot(extent.height());
        let resolution = target_diagonal / source_diagonal;

        let out_width = ((extent.width() / resolution).round() as usize).max(1);
        let out_height = ((extent.height() / resolution).round() as usize).max(1);
        let transform = Affine::from_origin(
            extent.left,
            extent.top,
            extent.width() / out_width as f64,
            extent.height() / out_height as f64,
        );

        Ok(Grid {
            crs: target,
            transform,
            width: out_width,
            height: out_height,
        })
    }
}

/// Resamples every band of `source`, interpreted in `source_crs`, onto
/// `grid`.
///
/// Destination cells without source coverage, including cells whose
/// position cannot be expressed in the source CRS, receive the source nodata
/// value, or zero when the source declares none.
pub fn warp(
    source: &Raster,
    source_crs: Crs,
    source_transform: &Affine,
    grid: &Grid,
    resampling: Resampling,
) -> Result<Vec<Band>> {
    let to_source = source_transform
        .inverse()
        .ok_or_else(|| RasterError::Projection("source transform is not invertible".to_string()))?;
    let transformer = CoordTransformer::new(grid.crs, source_crs)?;

    // Points the source CRS cannot represent have no source coverage.
    let to_source_cell = |col: f64, row: f64| -> Option<(f64, f64)> {
        let (x, y) = grid.transform.apply(col, row);
        let (sx, sy) = transformer.transform(x, y).ok()?;
        (sx.is_finite() && sy.is_finite()).then(|| to_source.apply(sx, sy))
    };

    let sampler = Sampler {
        source,
        fill: source.nodata().unwrap_or(0.0),
    };
    let mut bands = vec![Band::filled(grid.width, grid.height, sampler.fill); source.band_count()];

    match resampling {
        Resampling::Nearest => {
            for row in 0..grid.height {
                for col in 0..grid.width {
                    let Some((c, r)) = to_source_cell(col as f64 + 0.5, row as f64 + 0.5)
                        .and_then(|(scol, srow)| sampler.cell_at(scol, srow))
                    else {
                        continue;
                    };
                    for (band, source_band) in bands.iter_mut().zip(source.bands()) {
                        band.set(row, col, source_band.get(r, c));
                    }
                }
            }
        }
        Resampling::Average => {
            // Corner lattice shared between neighbouring cells.
            let stride = grid.width + 1;
            let mut corners = Vec::with_capacity(stride * (grid.height + 1));
            for row in 0..=grid.height {
                for col in 0..=grid.width {
                    corners.push(to_source_cell(col as f64, row as f64));
                }
            }

            for row in 0..grid.height {
                for col in 0..grid.width {
                    let footprint = [
                        corners[row * stride + col],
                        corners[row * stride + col + 1],
                        corners[(row + 1) * stride + col],
                        corners[(row + 1) * stride + col + 1],
                    ];
                    if let [Some(a), Some(b), Some(c), Some(d)] = footprint {
                        for (band, source_band) in bands.iter_mut().zip(source.bands()) {
                            if let Some(value) = sampler.average(source_band, &[a, b, c, d]) {
                                band.set(row, col, value);
                            }
                        }
                        continue;
                    }

                    // Footprint partly undefined, e.g. touching a pole: sample the centre.
                    let Some((c, r)) = to_source_cell(col as f64 + 0.5, row as f64 + 0.5)
                        .and_then(|(scol, srow)| sampler.cell_at(scol, srow))
                    else {
                        continue;
                    };
                    for (band, source_band) in bands.iter_mut().zip(source.bands()) {
                        let value = source_band.get(r, c);
                        if !is_nodata(value, source.nodata()) {
                            band.set(row, col, value);
                        }
                    }
                }
            }
        }
    }

    debug!(
        width = grid.width,
        height = grid.height,
        bands = bands.len(),
        %resampling,
        "Warped raster"
    );
    Ok(bands)
}

struct Sampler<'a> {
    source: &'a Raster,
    fill: f64,
}

impl Sampler<'_> {
    fn cell_at(&self, col: f64, row: f64) -> Option<(usize, usize)> {
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (c, r) = (col.floor() as usize, row.floor() as usize);
        (c < self.source.width() && r < self.source.height()).then_some((c, r))
    }

    fn average(&self, band: &Band, footprint: &[(f64, f64); 4]) -> Option<f64> {
        let col_min = footprint.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let col_max = footprint.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let row_min = footprint.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let row_max = footprint.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        // Source cells whose centres lie inside the footprint
        let first_col = (col_min - 0.5).ceil().max(0.0);
        let last_col = (col_max - 0.5).floor().min(self.source.width() as f64 - 1.0);
        let first_row = (row_min - 0.5).ceil().max(0.0);
        let last_row = (row_max - 0.5).floor().min(self.source.height() as f64 - 1.0);

        if first_col > last_col || first_row > last_row {
            // Footprint smaller than a source cell
            let (c, r) = self.cell_at((col_min + col_max) / 2.0, (row_min + row_max) / 2.0)?;
            let value = band.get(r, c);
            return (!is_nodata(value, self.source.nodata())).then_some(value);
        }

        let mut sum = 0.0;
        let mut count = 0usize;
        for r in first_row as usize..=last_row as usize {
            for &value in &band.row(r)[first_col as usize..=last_col as usize] {
                if !is_nodata(value, self.source.nodata()) {
                    sum += value;
                    count += 1;
                }
            }
        }
        (count > 0).then(|| sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{CellType, Profile};

    fn raster(width: usize, height: usize, data: Vec<f64>, nodata: Option<f64>) -> Raster {
        let profile = Profile::new(width, height, CellType::Float32)
            .with_crs(Crs::WEB_MERCATOR)
            .with_transform(Affine::from_origin(0.0, height as f64, 1.0, 1.0))
            .with_nodata(nodata);
        Raster::new(profile, vec![Band::new(width, height, data).unwrap()]).unwrap()
    }

    #[test]
    fn test_parse_resampling() {
        assert_eq!("nearest".parse::<Resampling>().unwrap(), Resampling::Nearest);
        assert_eq!("Average".parse::<Resampling>().unwrap(), Resampling::Average);
        assert!("bilinear".parse::<Resampling>().is_err());
    }

    #[test]
    fn test_identity_grid_copies_cells() {
        let source = raster(2, 2, vec![1.0, 2.0, 3.0, 4.0], None);
        let grid = Grid {
            crs: Crs::WEB_MERCATOR,
            transform: source.transform(),
            width: 2,
            height: 2,
        };
        for resampling in [Resampling::Nearest, Resampling::Average] {
            let bands = warp(&source, Crs::WEB_MERCATOR, &source.transform(), &grid, resampling).unwrap();
            assert_eq!(bands[0].data(), source.bands()[0].data());
        }
    }

    #[test]
    fn test_average_downsamples_and_skips_nodata() {
        let source = raster(2, 2, vec![1.0, 3.0, -1.0, 5.0], Some(-1.0));
        let grid = Grid {
            crs: Crs::WEB_MERCATOR,
            transform: Affine::from_origin(0.0, 2.0, 2.0, 2.0),
            width: 1,
            height: 1,
        };
        let bands = warp(&source, Crs::WEB_MERCATOR, &source.transform(), &grid, Resampling::Average).unwrap();
        assert_eq!(bands[0].data(), &[3.0]);
    }

    #[test]
    fn test_cells_outside_source_are_filled() {
        let source = raster(1, 1, vec![7.0], Some(-9.0));
        let grid = Grid {
            crs: Crs::WEB_MERCATOR,
            transform: Affine::from_origin(0.0, 1.0, 1.0, 1.0),
            width: 2,
            height: 1,
        };
        let bands = warp(&source, Crs::WEB_MERCATOR, &source.transform(), &grid, Resampling::Nearest).unwrap();
        assert_eq!(bands[0].data(), &[7.0, -9.0]);
    }

    const HALF_WORLD: f64 = 20_037_508.342_789_244;

    #[test]
    fn test_covering_grid_for_world_raster() {
        let transform = Affine::from_origin(-180.0, 90.0, 10.0, 10.0);
        let grid = Grid::covering(Crs::WGS84, &transform, 36, 18, Crs::WEB_MERCATOR).unwrap();
        let bounds = grid.bounds();
        assert!((bounds.left + HALF_WORLD).abs() < 1.0);
        assert!((bounds.top - HALF_WORLD).abs() < 1.0);
        assert!((bounds.right - HALF_WORLD).abs() < 1.0);
        assert!((bounds.bottom + HALF_WORLD).abs() < 1.0);
    }

    #[test]
    fn test_average_onto_polar_template_samples_edge_cells() {
        let size = 2.0 * HALF_WORLD / 4.0;
        let profile = Profile::new(4, 4, CellType::Float32)
            .with_crs(Crs::WEB_MERCATOR)
            .with_transform(Affine::from_origin(-HALF_WORLD, HALF_WORLD, size, size));
        let data = (1..=16).map(f64::from).collect();
        let source = Raster::new(profile, vec![Band::new(4, 4, data).unwrap()]).unwrap();
        let grid = Grid {
            crs: Crs::WGS84,
            transform: Affine::from_origin(-180.0, 90.0, 10.0, 10.0),
            width: 36,
            height: 18,
        };

        for resampling in [Resampling::Nearest, Resampling::Average] {
            let bands = warp(&source, Crs::WEB_MERCATOR, &source.transform(), &grid, resampling).unwrap();
            assert_eq!((bands[0].width(), bands[0].height()), (36, 18));
            // Top-left cell touches the pole but its centre lies inside mercator.
            assert_eq!(bands[0].get(0, 0), 1.0);
            assert_eq!(bands[0].get(9, 18), 11.0);
        }
    }

    #[test]
    fn test_covering_grid_keeps_extent() {
        let transform = Affine::from_origin(1000.0, 4000.0, 10.0, 10.0);
        let grid = Grid::covering(Crs::WEB_MERCATOR, &transform, 400, 300, Crs::WEB_MERCATOR).unwrap();
        assert_eq!(grid.width, 400);
        assert_eq!(grid.height, 300);
        let bounds = grid.bounds();
        assert!((bounds.left - 1000.0).abs() < 1e-6);
        assert!((bounds.bottom - 1000.0).abs() < 1e-6);
        assert!((bounds.right - 5000.0).abs() < 1e-6);
        assert!((bounds.top - 4000.0).abs() < 1e-6);
    }
}
