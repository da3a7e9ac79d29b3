//! ESRI ASCII grid (`.asc`) support.
//!
//! The format holds a single band of square, north-up cells and no
//! coordinate reference system.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::raster::affine::Affine;
use crate::raster::error::{RasterError, Result};
use crate::raster::types::{Band, CellType, Profile, Raster};

pub fn read(path: &Path) -> Result<Raster> {
    let text = fs::read_to_string(path).map_err(|e| RasterError::io(path, e))?;
    parse(&text).map_err(|reason| RasterError::decode(path, reason))
}

pub fn write(path: &Path, raster: &Raster) -> Result<()> {
    let text = render(raster)?;
    fs::write(path, text).map_err(|e| RasterError::io(path, e))?;
    debug!(path = %path.display(), "Wrote ASCII grid");
    Ok(())
}

#[derive(Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    x: Option<f64>,
    y: Option<f64>,
    centered: bool,
    cellsize: Option<f64>,
    nodata: Option<f64>,
}

fn parse(text: &str) -> std::result::Result<Raster, String> {
    let mut header = Header::default();
    let mut tokens = text.split_whitespace().peekable();

    while let Some(&key) = tokens.peek() {
        if key.parse::<f64>().is_ok() {
            break;
        }
        tokens.next();
        let value = tokens.next().ok_or_else(|| format!("missing value for '{key}'"))?;
        let number = || value.parse::<f64>().map_err(|_| format!("bad value '{value}' for '{key}'"));
        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(number()? as usize),
            "nrows" => header.nrows = Some(number()? as usize),
            "xllcorner" => header.x = Some(number()?),
            "yllcorner" => header.y = Some(number()?),
            "xllcenter" => {
                header.x = Some(number()?);
                header.centered = true;
            }
            "yllcenter" => {
                header.y = Some(number()?);
                header.centered = true;
            }
            "cellsize" => header.cellsize = Some(number()?),
            "nodata_value" => header.nodata = Some(number()?),
            other => return Err(format!("unknown header key '{other}'")),
        }
    }

    let ncols = header.ncols.ok_or("missing ncols")?;
    let nrows = header.nrows.ok_or("missing nrows")?;
    let cellsize = header.cellsize.ok_or("missing cellsize")?;
    let (mut west, mut south) = (header.x.ok_or("missing xll")?, header.y.ok_or("missing yll")?);
    if header.centered {
        west -= cellsize / 2.0;
        south -= cellsize / 2.0;
    }

    let values = tokens
        .map(|t| t.parse::<f64>().map_err(|_| format!("bad cell value '{t}'")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if values.len() != ncols * nrows {
        return Err(format!("expected {} cells, found {}", ncols * nrows, values.len()));
    }

    let cell_type = if values.iter().all(|v| v.fract() == 0.0) {
        CellType::Int32
    } else {
        CellType::Float32
    };
    let north = south + nrows as f64 * cellsize;
    let profile = Profile::new(ncols, nrows, cell_type)
        .with_transform(Affine::from_origin(west, north, cellsize, cellsize))
        .with_nodata(header.nodata);
    let band = Band::new(ncols, nrows, values).map_err(|e| e.to_string())?;
    Raster::new(profile, vec![band]).map_err(|e| e.to_string())
}

fn render(raster: &Raster) -> Result<String> {
    if raster.band_count() != 1 {
        return Err(RasterError::Format(format!(
            "ASCII grids hold one band, raster has {}",
            raster.band_count()
        )));
    }
    let t = raster.transform();
    if !t.is_rectilinear() || t.a != -t.e || t.a <= 0.0 {
        return Err(RasterError::Format(
            "ASCII grids need square, north-up cells".to_string(),
        ));
    }

    let bounds = raster.bounds();
    let mut text = String::new();
    let _ = writeln!(text, "ncols        {}", raster.width());
    let _ = writeln!(text, "nrows        {}", raster.height());
    let _ = writeln!(text, "xllcorner    {}", bounds.left);
    let _ = writeln!(text, "yllcorner    {}", bounds.bottom);
    let _ = writeln!(text, "cellsize     {}", t.a);
    if let Some(nodata) = raster.nodata() {
        let _ = writeln!(text, "NODATA_value {nodata}");
    }

    let cell_type = raster.cell_type();
    let band = &raster.bands()[0];
    for row in 0..raster.height() {
        let line: Vec<String> = band
            .row(row)
            .iter()
            .map(|&v| cell_type.cast(v).to_string())
            .collect();
        text.push_str(&line.join(" "));
        text.push('\n');
    }
    Ok(text)
}
