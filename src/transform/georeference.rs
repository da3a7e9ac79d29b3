//! Georeferencing of rasters with ground control points.
//!
//! Runs in two stages. The first fits an affine transform to the GCPs and
//! stores it with the raster's location in a small JSON description next to
//! the raster (`<stem>.vrt`). The second resamples the described raster
//! onto a north-up grid in the target CRS, writes it to
//! `<stem>_georeferenced.<ext>` and moves that over the original file.
//! Intermediate files are removed whether or not the stages succeed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, instrument, warn};

use crate::raster::{self, Affine, Crs, Profile, Raster, RasterError, Result};
use crate::transform::warp::{self, Grid, Resampling};

/// A pixel position in the source image tied to a position in the world.
///
/// Serialized as `[[image_x, image_y], [world_x, world_y]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 2]; 2]", into = "[[f64; 2]; 2]")]
pub struct Gcp {
    pub image: (f64, f64),
    pub world: (f64, f64),
}

impl Gcp {
    pub fn new(image: (f64, f64), world: (f64, f64)) -> Self {
        Self { image, world }
    }
}

impl From<[[f64; 2]; 2]> for Gcp {
    fn from([[ix, iy], [wx, wy]]: [[f64; 2]; 2]) -> Self {
        Self::new((ix, iy), (wx, wy))
    }
}

impl From<Gcp> for [[f64; 2]; 2] {
    fn from(gcp: Gcp) -> Self {
        [[gcp.image.0, gcp.image.1], [gcp.world.0, gcp.world.1]]
    }
}

/// Expresses top-down image rows in the raster's north-up frame:
/// `image_y' = top - image_y`.
pub fn flip_gcps(gcps: &[Gcp], top: f64) -> Vec<Gcp> {
    gcps.iter()
        .map(|gcp| Gcp::new((gcp.image.0, top - gcp.image.1), gcp.world))
        .collect()
}

/// Affine transform taking GCP image positions to their world positions.
///
/// One GCP yields a translation, two a similarity (scale, rotation and
/// translation) and three or more a least-squares affine fit.
pub fn fit_gcps(gcps: &[Gcp]) -> Result<Affine> {
    match gcps {
        [] => Err(RasterError::Georeferencing(
            "at least one ground control point is required".to_string(),
        )),
        [gcp] => Ok(Affine::translation(
            gcp.world.0 - gcp.image.0,
            gcp.world.1 - gcp.image.1,
        )),
        [first, second] => fit_similarity(first, second),
        _ => fit_affine(gcps),
    }
}

fn fit_similarity(first: &Gcp, second: &Gcp) -> Result<Affine> {
    let (dx, dy) = (second.image.0 - first.image.0, second.image.1 - first.image.1);
    let (dwx, dwy) = (second.world.0 - first.world.0, second.world.1 - first.world.1);
    let norm = dx * dx + dy * dy;
    if norm == 0.0 {
        return Err(RasterError::Georeferencing(
            "ground control points share an image position".to_string(),
        ));
    }

    // world = (p + iq) * image + t, in complex notation
    let p = (dwx * dx + dwy * dy) / norm;
    let q = (dwy * dx - dwx * dy) / norm;
    let tx = first.world.0 - (p * first.image.0 - q * first.image.1);
    let ty = first.world.1 - (q * first.image.0 + p * first.image.1);
    Ok(Affine::new(p, -q, tx, q, p, ty))
}

fn fit_affine(gcps: &[Gcp]) -> Result<Affine> {
    // Normal equations of the least-squares problem [x y 1] * coef = world
    let mut normal = [[0.0f64; 3]; 3];
    let mut rhs_x = [0.0f64; 3];
    let mut rhs_y = [0.0f64; 3];
    for gcp in gcps {
        let row = [gcp.image.0, gcp.image.1, 1.0];
        for i in 0..3 {
            for j in 0..3 {
                normal[i][j] += row[i] * row[j];
            }
            rhs_x[i] += row[i] * gcp.world.0;
            rhs_y[i] += row[i] * gcp.world.1;
        }
    }

    let [a, b, c] = solve3(&normal, &rhs_x)?;
    let [d, e, f] = solve3(&normal, &rhs_y)?;
    Ok(Affine::new(a, b, c, d, e, f))
}

fn solve3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> Result<[f64; 3]> {
    let det = |m: &[[f64; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };

    let scale = m.iter().flatten().map(|x| x.abs()).fold(0.0, f64::max);
    let determinant = det(m);
    if !determinant.is_finite() || determinant.abs() <= 1e-12 * scale.powi(3) {
        return Err(RasterError::Georeferencing(
            "ground control points are collinear".to_string(),
        ));
    }

    let mut solution = [0.0; 3];
    for (column, value) in solution.iter_mut().enumerate() {
        let mut replaced = *m;
        for row in 0..3 {
            replaced[row][column] = v[row];
        }
        *value = det(&replaced) / determinant;
    }
    Ok(solution)
}

/// Stage 1 output: where the raster lives and how it maps onto the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualRaster {
    pub source: PathBuf,
    pub crs: Crs,
    pub gcps: Vec<Gcp>,
    pub transform: Affine,
}

/// Removes intermediate files when dropped.
struct Intermediates {
    paths: Vec<PathBuf>,
}

impl Drop for Intermediates {
    fn drop(&mut self) {
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove intermediate file"),
            }
        }
    }
}

pub fn virtual_raster_path(path: &Path) -> PathBuf {
    path.with_extension("vrt")
}

pub fn georeferenced_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_georeferenced.{}", ext.to_string_lossy()),
        None => format!("{stem}_georeferenced"),
    };
    path.with_file_name(name)
}

/// Georeferences the raster at `path` in place.
#[instrument(skip(gcps), fields(gcps = gcps.len()))]
pub fn georeference(path: &Path, gcps: &[Gcp], target_crs: Crs) -> Result<()> {
    if gcps.is_empty() {
        return Err(RasterError::Georeferencing(
            "at least one ground control point is required".to_string(),
        ));
    }

    let vrt_path = virtual_raster_path(path);
    let warped_path = georeferenced_path(path);
    let _cleanup = Intermediates {
        paths: vec![vrt_path.clone(), warped_path.clone()],
    };

    let source = raster::open(path)?;

    {
        let _span = info_span!("describe_gcps").entered();
        let description = describe(path, &source, gcps, target_crs)?;
        write_description(&vrt_path, &description)?;
    }

    {
        let _span = info_span!("warp_to_grid").entered();
        let description = read_description(&vrt_path)?;
        let warped = warp_described(&source, &description)
            .map_err(|e| RasterError::Georeferencing(e.to_string()))?;
        raster::create(&warped_path, &warped)?;
    }

    fs::rename(&warped_path, path).map_err(|e| RasterError::io(path, e))?;
    info!(path = %path.display(), crs = %target_crs, "Georeferenced raster");
    Ok(())
}

fn describe(path: &Path, source: &Raster, gcps: &[Gcp], crs: Crs) -> Result<VirtualRaster> {
    let gcps = flip_gcps(gcps, source.bounds().top);
    let fitted = fit_gcps(&gcps)?;
    Ok(VirtualRaster {
        source: path.to_path_buf(),
        crs,
        transform: fitted * source.transform(),
        gcps,
    })
}

fn write_description(path: &Path, description: &VirtualRaster) -> Result<()> {
    if path.exists() {
        warn!(path = %path.display(), "Overwriting stale virtual raster");
    }
    let text = serde_json::to_string_pretty(description)
        .map_err(|e| RasterError::encode(path, e))?;
    fs::write(path, text).map_err(|e| RasterError::io(path, e))
}

fn read_description(path: &Path) -> Result<VirtualRaster> {
    let text = fs::read_to_string(path).map_err(|e| RasterError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| RasterError::decode(path, e))
}

fn warp_described(source: &Raster, description: &VirtualRaster) -> Result<Raster> {
    let grid = Grid::covering(
        description.crs,
        &description.transform,
        source.width(),
        source.height(),
        description.crs,
    )?;
    let bands = warp::warp(
        source,
        description.crs,
        &description.transform,
        &grid,
        Resampling::Nearest,
    )?;
    let profile = Profile {
        width: grid.width,
        height: grid.height,
        crs: Some(grid.crs),
        transform: grid.transform,
        ..source.profile().clone()
    };
    Raster::new(profile, bands)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_gcp_json_layout() {
        let gcp: Gcp = serde_json::from_str("[[1.0, 2.0], [3.5, 4.5]]").unwrap();
        assert_eq!(gcp, Gcp::new((1.0, 2.0), (3.5, 4.5)));
        assert_eq!(serde_json::to_string(&gcp).unwrap(), "[[1.0,2.0],[3.5,4.5]]");
    }

    #[test]
    fn test_flip_against_top() {
        let flipped = flip_gcps(&[Gcp::new((3.0, 5.0), (0.0, 0.0))], 20.0);
        assert_eq!(flipped[0].image, (3.0, 15.0));
    }

    #[test]
    fn test_single_gcp_translates() {
        let fit = fit_gcps(&[Gcp::new((1.0, 1.0), (101.0, 201.0))]).unwrap();
        assert_eq!(fit, Affine::translation(100.0, 200.0));
    }

    #[test]
    fn test_two_gcps_similarity() {
        let gcps = [
            Gcp::new((0.0, 0.0), (10.0, 10.0)),
            Gcp::new((1.0, 0.0), (10.0, 12.0)),
        ];
        let fit = fit_gcps(&gcps).unwrap();
        // Scale 2, rotated a quarter turn
        assert!(close(fit.apply(0.0, 1.0), (8.0, 10.0)));
        for gcp in gcps {
            assert!(close(fit.apply(gcp.image.0, gcp.image.1), gcp.world));
        }
    }

    #[test]
    fn test_three_gcps_exact_affine() {
        let expected = Affine::new(2.0, 0.5, 100.0, -0.25, 3.0, 50.0);
        let gcps: Vec<Gcp> = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]
            .into_iter()
            .map(|(x, y)| Gcp::new((x, y), expected.apply(x, y)))
            .collect();
        let fit = fit_gcps(&gcps).unwrap();
        for gcp in &gcps {
            assert!(close(fit.apply(gcp.image.0, gcp.image.1), gcp.world));
        }
    }

    #[test]
    fn test_degenerate_gcps() {
        assert!(fit_gcps(&[]).is_err());
        let same = Gcp::new((1.0, 1.0), (0.0, 0.0));
        assert!(fit_gcps(&[same, same]).is_err());
        let collinear = [
            Gcp::new((0.0, 0.0), (0.0, 0.0)),
            Gcp::new((1.0, 1.0), (1.0, 1.0)),
            Gcp::new((2.0, 2.0), (2.0, 2.0)),
        ];
        assert!(matches!(fit_gcps(&collinear), Err(RasterError::Georeferencing(_))));
    }

    #[test]
    fn test_intermediate_paths() {
        let path = Path::new("/data/scan.tif");
        assert_eq!(virtual_raster_path(path), PathBuf::from("/data/scan.vrt"));
        assert_eq!(georeferenced_path(path), PathBuf::from("/data/scan_georeferenced.tif"));
    }
}
