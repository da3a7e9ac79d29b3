use std::path::PathBuf;

use thiserror::Error;

use crate::raster::crs::Crs;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported raster layout: {0}")]
    Format(String),

    #[error("Unsupported cell type: {0}")]
    Type(String),

    #[error("Coordinate reference systems differ: {left} vs {right}")]
    CrsMismatch { left: String, right: String },

    #[error("Raster shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize, usize),
        right: (usize, usize, usize),
    },

    #[error("Georeferencing failed: {0}")]
    Georeferencing(String),

    #[error("Projection failed: {0}")]
    Projection(String),

    #[error("Window lies outside the raster: {0}")]
    OutOfBounds(String),

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

impl RasterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Encode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn crs_mismatch(left: Option<Crs>, right: Option<Crs>) -> Self {
        let name = |crs: Option<Crs>| crs.map_or_else(|| "none".to_string(), |c| c.to_string());
        Self::CrsMismatch {
            left: name(left),
            right: name(right),
        }
    }

    /// True when the underlying file could not be found or opened.
    pub fn is_missing_file(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, RasterError>;
