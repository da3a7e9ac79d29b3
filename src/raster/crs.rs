//! Coordinate reference systems and point transforms.
//!
//! A [`Crs`] is identified by its EPSG code. PROJ definitions come from the
//! `crs-definitions` database and points are transformed with `proj4rs`, so
//! no system PROJ/GDAL installation is needed.

use std::fmt;
use std::str::FromStr;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::raster::affine::Bounds;
use crate::raster::error::{RasterError, Result};

/// Number of points sampled along each edge when transforming bounds.
const BOUNDS_DENSIFY_POINTS: usize = 21;

/// Latitude where spherical mercator reaches its square extent.
pub const MERCATOR_LATITUDE_LIMIT: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs(u16);

impl Crs {
    /// Spherical mercator used by OpenStreetMap and most web map tiling.
    pub const WEB_MERCATOR: Crs = Crs(3857);
    pub const WGS84: Crs = Crs(4326);

    pub fn from_epsg(code: u16) -> Self {
        Self(code)
    }

    pub fn epsg(&self) -> u16 {
        self.0
    }

    pub fn proj_string(&self) -> Option<&'static str> {
        crs_definitions::from_code(self.0).map(|def| def.proj4)
    }

    /// Geographic (lon/lat) systems take and return degrees.
    pub fn is_geographic(&self) -> bool {
        match self.proj_string() {
            Some(proj) => proj.contains("+proj=longlat"),
            None => (4000..5000).contains(&self.0),
        }
    }

    fn to_proj(self) -> Result<Proj> {
        let definition = self.proj_string().ok_or_else(|| {
            RasterError::Projection(format!("{self} is not in the crs-definitions database"))
        })?;
        Proj::from_proj_string(definition)
            .map_err(|e| RasterError::Projection(format!("invalid definition for {self}: {e:?}")))
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WEB_MERCATOR
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        code.parse::<u16>()
            .map(Crs)
            .map_err(|_| RasterError::Projection(format!("not an EPSG identifier: '{s}'")))
    }
}

impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Transforms points from one CRS into another.
pub struct CoordTransformer {
    source: Crs,
    target: Crs,
    projs: Option<(Proj, Proj)>,
}

impl CoordTransformer {
    pub fn new(source: Crs, target: Crs) -> Result<Self> {
        let projs = if source == target {
            None
        } else {
            Some((source.to_proj()?, target.to_proj()?))
        };
        Ok(Self {
            source,
            target,
            projs,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.projs.is_none()
    }

    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some((source_proj, target_proj)) = &self.projs else {
            return Ok((x, y));
        };

        let mut point = if self.source.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(source_proj, target_proj, &mut point).map_err(|e| {
            RasterError::Projection(format!(
                "{} -> {} failed for ({x}, {y}): {e:?}",
                self.source, self.target
            ))
        })?;

        if self.target.is_geographic() {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Bounding box, in the target CRS, of `bounds` given in the source CRS.
    ///
    /// Edges are densified so curved edges under non-linear projections are
    /// covered. Points the target cannot represent, such as the poles in
    /// mercator, are retried at the mercator latitude limit and otherwise
    /// left out. Fails only when no point can be transformed.
    pub fn transform_bounds(&self, bounds: &Bounds) -> Result<Bounds> {
        if self.is_identity() {
            return Ok(*bounds);
        }

        let mut result: Option<Bounds> = None;
        let mut last_error = None;
        let steps = (BOUNDS_DENSIFY_POINTS - 1) as f64;

        for i in 0..BOUNDS_DENSIFY_POINTS {
            let t = i as f64 / steps;
            let x = bounds.left + t * bounds.width();
            let y = bounds.bottom + t * bounds.height();
            let edge_points = [
                (x, bounds.top),
                (x, bounds.bottom),
                (bounds.left, y),
                (bounds.right, y),
            ];
            for (px, py) in edge_points {
                let (tx, ty) = match self.transform_clamped(px, py) {
                    Ok(point) => point,
                    Err(e) => {
                        last_error = Some(e);
                        continue;
                    }
                };
                result = Some(match result {
                    None => Bounds::new(tx, ty, tx, ty),
                    Some(b) => b.expand_to(tx, ty),
                });
            }
        }

        match (result, last_error) {
            (Some(bounds), _) => Ok(bounds),
            (None, Some(e)) => Err(e),
            (None, None) => Err(RasterError::Projection("empty bounds".to_string())),
        }
    }

    fn transform_clamped(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let finite = |(tx, ty): (f64, f64)| {
            if tx.is_finite() && ty.is_finite() {
                Ok((tx, ty))
            } else {
                Err(RasterError::Projection(format!(
                    "{} -> {} is undefined for ({x}, {y})",
                    self.source, self.target
                )))
            }
        };

        match self.transform(x, y).and_then(finite) {
            Ok(point) => Ok(point),
            Err(e) if self.source.is_geographic() && y.abs() > MERCATOR_LATITUDE_LIMIT => {
                let clamped = y.clamp(-MERCATOR_LATITUDE_LIMIT, MERCATOR_LATITUDE_LIMIT);
                self.transform(x, clamped).and_then(finite).map_err(|_| e)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let crs: Crs = "EPSG:3857".parse().unwrap();
        assert_eq!(crs, Crs::WEB_MERCATOR);
        assert_eq!(crs.to_string(), "EPSG:3857");
        assert_eq!("4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert!("mercator".parse::<Crs>().is_err());
    }

    #[test]
    fn test_geographic_detection() {
        assert!(Crs::WGS84.is_geographic());
        assert!(!Crs::WEB_MERCATOR.is_geographic());
    }

    #[test]
    fn test_identity_transform() {
        let transformer = CoordTransformer::new(Crs::WEB_MERCATOR, Crs::WEB_MERCATOR).unwrap();
        assert!(transformer.is_identity());
        assert_eq!(transformer.transform(12.5, -3.0).unwrap(), (12.5, -3.0));
    }

    #[test]
    fn test_mercator_roundtrip() {
        let forward = CoordTransformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let backward = CoordTransformer::new(Crs::WEB_MERCATOR, Crs::WGS84).unwrap();

        let (x, y) = forward.transform(5.0, 52.0).unwrap();
        assert!(x > 500_000.0 && x < 600_000.0, "x: {x}");
        let (lon, lat) = backward.transform(x, y).unwrap();
        assert!((lon - 5.0).abs() < 1e-6);
        assert!((lat - 52.0).abs() < 1e-6);
    }

    #[test]
    fn test_transform_bounds_contains_corners() {
        let transformer = CoordTransformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let bounds = Bounds::new(4.0, 51.0, 6.0, 53.0);
        let projected = transformer.transform_bounds(&bounds).unwrap();
        let (x, y) = transformer.transform(4.0, 53.0).unwrap();
        assert!(projected.left <= x && projected.top >= y);
    }

    #[test]
    fn test_world_bounds_clamp_to_mercator_square() {
        let transformer = CoordTransformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let projected = transformer
            .transform_bounds(&Bounds::new(-180.0, -90.0, 180.0, 90.0))
            .unwrap();

        let half_world = 20_037_508.342_789_244;
        for edge in [projected.left, projected.bottom] {
            assert!((edge + half_world).abs() < 1.0, "edge: {edge}");
        }
        for edge in [projected.right, projected.top] {
            assert!((edge - half_world).abs() < 1.0, "edge: {edge}");
        }
    }

    #[test]
    fn test_unknown_code_is_projection_error() {
        let result = CoordTransformer::new(Crs::WGS84, Crs::from_epsg(65000));
        assert!(matches!(result, Err(RasterError::Projection(_))));
    }
}
