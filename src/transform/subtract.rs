use std::path::Path;

use tracing::instrument;

use crate::raster::types::is_nodata;
use crate::raster::{self, Band, CellType, Profile, Raster, RasterError, Result};

/// Writes `lhs - rhs` cell by cell.
///
/// A cell that is nodata in either input is nodata in the result. The
/// result uses the nodata value of `lhs`, or of `rhs` when `lhs` has none.
/// Its cell type is widened so negative and large differences are kept.
#[instrument]
pub fn subtract(lhs: &Path, rhs: &Path, target: &Path) -> Result<()> {
    let lhs = raster::open(lhs)?;
    let rhs = raster::open(rhs)?;
    let result = difference(&lhs, &rhs)?;
    raster::create(target, &result)
}

pub fn difference(lhs: &Raster, rhs: &Raster) -> Result<Raster> {
    if lhs.shape() != rhs.shape() {
        return Err(RasterError::ShapeMismatch {
            left: lhs.shape(),
            right: rhs.shape(),
        });
    }

    let nodata = lhs.nodata().or(rhs.nodata());
    let bands = lhs
        .bands()
        .iter()
        .zip(rhs.bands())
        .map(|(l, r)| {
            let data = l
                .data()
                .iter()
                .zip(r.data())
                .map(|(&a, &b)| match nodata {
                    Some(nd) if is_nodata(a, lhs.nodata()) || is_nodata(b, rhs.nodata()) => nd,
                    _ => a - b,
                })
                .collect();
            Band::new(lhs.width(), lhs.height(), data)
        })
        .collect::<Result<Vec<_>>>()?;

    let profile = Profile {
        nodata,
        cell_type: difference_type(lhs.cell_type(), rhs.cell_type()),
        ..lhs.profile().clone()
    };
    Raster::new(profile, bands)
}

/// Cell type wide enough for the difference of two cells.
fn difference_type(lhs: CellType, rhs: CellType) -> CellType {
    if lhs != rhs {
        return CellType::Float64;
    }
    match lhs {
        CellType::UInt8 => CellType::Int16,
        CellType::UInt16 | CellType::Int16 => CellType::Int32,
        CellType::UInt32 | CellType::Int32 | CellType::Float64 => CellType::Float64,
        CellType::Float32 => CellType::Float32,
    }
}
