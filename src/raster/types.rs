//! In-memory raster representation

use std::fmt;

use crate::raster::affine::{Affine, Bounds, Window};
use crate::raster::crs::Crs;
use crate::raster::error::{RasterError, Result};

/// Numeric type of the cells as stored on disk.
///
/// In memory every cell is an `f64`, which holds all of these exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl CellType {
    pub fn bits(&self) -> u16 {
        match self {
            CellType::UInt8 => 8,
            CellType::UInt16 | CellType::Int16 => 16,
            CellType::UInt32 | CellType::Int32 | CellType::Float32 => 32,
            CellType::Float64 => 64,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, CellType::Float32 | CellType::Float64)
    }

    /// Converts `value` to the closest value representable by this type.
    ///
    /// Integer types round and saturate; NaN becomes 0.
    pub fn cast(&self, value: f64) -> f64 {
        if self.is_integer() && value.is_nan() {
            return 0.0;
        }
        match self {
            CellType::UInt8 => value.round().clamp(0.0, u8::MAX as f64),
            CellType::UInt16 => value.round().clamp(0.0, u16::MAX as f64),
            CellType::Int16 => value.round().clamp(i16::MIN as f64, i16::MAX as f64),
            CellType::UInt32 => value.round().clamp(0.0, u32::MAX as f64),
            CellType::Int32 => value.round().clamp(i32::MIN as f64, i32::MAX as f64),
            CellType::Float32 => value as f32 as f64,
            CellType::Float64 => value,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellType::UInt8 => "uint8",
            CellType::UInt16 => "uint16",
            CellType::Int16 => "int16",
            CellType::UInt32 => "uint32",
            CellType::Int32 => "int32",
            CellType::Float32 => "float32",
            CellType::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// Georeferencing and layout shared by all bands of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub width: usize,
    pub height: usize,
    pub cell_type: CellType,
    pub crs: Option<Crs>,
    pub transform: Affine,
    pub nodata: Option<f64>,
}

impl Profile {
    pub fn new(width: usize, height: usize, cell_type: CellType) -> Self {
        Self {
            width,
            height,
            cell_type,
            crs: None,
            transform: Affine::identity(),
            nodata: None,
        }
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::of_grid(&self.transform, self.width, self.height)
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }
}

/// One 2-D array of cells in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Band {
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != width * height {
            return Err(RasterError::Format(format!(
                "band holds {} cells, expected {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            return Err(RasterError::Format("ragged rows".to_string()));
        }
        Band::new(width, height, rows.concat())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.width + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    pub fn window(&self, window: &Window) -> Band {
        let mut data = Vec::with_capacity(window.width * window.height);
        for row in window.row_off..window.row_off + window.height {
            let start = row * self.width + window.col_off;
            data.extend_from_slice(&self.data[start..start + window.width]);
        }
        Band {
            width: window.width,
            height: window.height,
            data,
        }
    }
}

/// A grid of cells with one or more bands and a geospatial placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    profile: Profile,
    bands: Vec<Band>,
}

impl Raster {
    /// Builds a raster, checking every band matches the profile's shape.
    pub fn new(profile: Profile, bands: Vec<Band>) -> Result<Self> {
        if profile.width == 0 || profile.height == 0 {
            return Err(RasterError::Format(format!(
                "empty raster {}x{}",
                profile.width, profile.height
            )));
        }
        if bands.is_empty() {
            return Err(RasterError::Format("raster has no bands".to_string()));
        }
        if let Some(band) = bands
            .iter()
            .find(|b| b.width != profile.width || b.height != profile.height)
        {
            return Err(RasterError::Format(format!(
                "band is {}x{}, raster is {}x{}",
                band.width, band.height, profile.width, profile.height
            )));
        }
        Ok(Self { profile, bands })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn width(&self) -> usize {
        self.profile.width
    }

    pub fn height(&self) -> usize {
        self.profile.height
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn cell_type(&self) -> CellType {
        self.profile.cell_type
    }

    pub fn crs(&self) -> Option<Crs> {
        self.profile.crs
    }

    pub fn transform(&self) -> Affine {
        self.profile.transform
    }

    pub fn nodata(&self) -> Option<f64> {
        self.profile.nodata
    }

    pub fn bounds(&self) -> Bounds {
        self.profile.bounds()
    }

    /// `(bands, height, width)`, the way array libraries report it.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.bands.len(), self.profile.height, self.profile.width)
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Band by 1-based index.
    pub fn band(&self, index: usize) -> Option<&Band> {
        index.checked_sub(1).and_then(|i| self.bands.get(i))
    }

    pub fn into_parts(self) -> (Profile, Vec<Band>) {
        (self.profile, self.bands)
    }

    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.profile.crs = crs;
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.profile.nodata = nodata;
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        is_nodata(value, self.profile.nodata)
    }

    /// Per-cell validity, `true` where the cell holds data.
    ///
    /// A cell is absent when every band equals the nodata value or, for an
    /// 8-bit RGBA raster without nodata, when its alpha is zero.
    pub fn dataset_mask(&self) -> Vec<bool> {
        let cells = self.profile.cell_count();
        if let Some(nodata) = self.profile.nodata {
            return (0..cells)
                .map(|i| !self.bands.iter().all(|b| is_nodata(b.data[i], Some(nodata))))
                .collect();
        }
        if self.bands.len() == 4 && self.profile.cell_type == CellType::UInt8 {
            return self.bands[3].data.iter().map(|&alpha| alpha != 0.0).collect();
        }
        vec![true; cells]
    }

    /// Cells of `window`, with the transform shifted to the window origin.
    pub fn read_window(&self, window: &Window) -> Result<Raster> {
        if window.width == 0
            || window.height == 0
            || window.col_off + window.width > self.profile.width
            || window.row_off + window.height > self.profile.height
        {
            return Err(RasterError::OutOfBounds(format!(
                "{window:?} in a {}x{} raster",
                self.profile.width, self.profile.height
            )));
        }
        let profile = Profile {
            width: window.width,
            height: window.height,
            transform: self.profile.transform.window_transform(window),
            ..self.profile.clone()
        };
        let bands = self.bands.iter().map(|band| band.window(window)).collect();
        Raster::new(profile, bands)
    }

    /// Window of cells covering `bounds`, rounded to the nearest cell edges.
    pub fn window(&self, bounds: &Bounds) -> Result<Window> {
        grid_window(&self.profile.transform, bounds)
    }
}

/// Window of the grid placed by `transform` covering `bounds`.
///
/// Offsets may not be negative; the caller checks the far edges.
pub fn grid_window(transform: &Affine, bounds: &Bounds) -> Result<Window> {
    let inverse = transform
        .inverse()
        .ok_or_else(|| RasterError::Format("transform is not invertible".to_string()))?;

    let corners = [
        inverse.apply(bounds.left, bounds.top),
        inverse.apply(bounds.right, bounds.top),
        inverse.apply(bounds.left, bounds.bottom),
        inverse.apply(bounds.right, bounds.bottom),
    ];
    let col_min = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let col_max = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let row_min = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let row_max = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let col_off = round_edge(col_min);
    let row_off = round_edge(row_min);
    if col_off < 0.0 || row_off < 0.0 {
        return Err(RasterError::OutOfBounds(format!(
            "{bounds:?} starts before the grid origin"
        )));
    }
    let width = round_edge(col_max) - col_off;
    let height = round_edge(row_max) - row_off;
    if width < 1.0 || height < 1.0 {
        return Err(RasterError::OutOfBounds(format!(
            "{bounds:?} covers no whole cell"
        )));
    }

    Ok(Window::new(
        col_off as usize,
        row_off as usize,
        width as usize,
        height as usize,
    ))
}

fn round_edge(value: f64) -> f64 {
    // Absorb floating point noise before rounding to the nearest edge.
    ((value * 1e6).round() / 1e6).round()
}

pub(crate) fn is_nodata(value: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => value.is_nan(),
        Some(nd) => value == nd,
        None => false,
    }
}
