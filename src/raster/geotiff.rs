//! GeoTIFF reading and writing on top of the `tiff` crate.
//!
//! Georeferencing is stored the way GDAL does for north-up and rotated
//! grids: ModelPixelScale + ModelTiepoint, or ModelTransformation, plus a
//! GeoKeyDirectory naming the EPSG code and the GDAL_NODATA ASCII tag.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::debug;

use crate::raster::affine::Affine;
use crate::raster::crs::Crs;
use crate::raster::error::{RasterError, Result};
use crate::raster::types::{Band, CellType, Profile, Raster};

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

// TIFF enumerations
const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
const PHOTOMETRIC_RGB: u16 = 2;
const EXTRA_SAMPLE_UNSPECIFIED: u16 = 0;
const EXTRA_SAMPLE_UNASSOCIATED_ALPHA: u16 = 2;
const SAMPLE_FORMAT_UINT: u16 = 1;
const SAMPLE_FORMAT_INT: u16 = 2;
const SAMPLE_FORMAT_IEEEFP: u16 = 3;

/// Reads a GeoTIFF into memory.
pub fn read(path: &Path) -> Result<Raster> {
    let file = File::open(path).map_err(|e| RasterError::io(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| RasterError::decode(path, e))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| RasterError::decode(path, e))?;
    let (width, height) = (width as usize, height as usize);

    let transform = read_transform(&mut decoder).map_err(|e| RasterError::decode(path, e))?;
    let crs = read_crs(&mut decoder).map_err(|e| RasterError::decode(path, e))?;
    let nodata = read_nodata(&mut decoder).map_err(|e| RasterError::decode(path, e))?;

    let image = decoder
        .read_image()
        .map_err(|e| RasterError::decode(path, e))?;
    let (cell_type, values) = decoded_values(image)
        .ok_or_else(|| RasterError::Type(format!("{}: unsupported sample type", path.display())))?;

    let cells = width * height;
    if cells == 0 || values.len() % cells != 0 {
        return Err(RasterError::decode(
            path,
            format!("{} samples for a {width}x{height} image", values.len()),
        ));
    }
    let band_count = values.len() / cells;
    debug!(
        path = %path.display(),
        width, height, band_count, %cell_type,
        "Decoded GeoTIFF"
    );

    let bands = deinterleave(&values, band_count, width, height)?;
    let mut profile = Profile::new(width, height, cell_type)
        .with_transform(transform)
        .with_nodata(nodata);
    profile.crs = crs;
    Raster::new(profile, bands)
}

/// Writes `raster` as an uncompressed, pixel-interleaved GeoTIFF.
pub fn write(path: &Path, raster: &Raster) -> Result<()> {
    let file = File::create(path).map_err(|e| RasterError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, raster).map_err(|e| RasterError::encode(path, e))?;
    writer.flush().map_err(|e| RasterError::io(path, e))?;
    debug!(
        path = %path.display(),
        width = raster.width(),
        height = raster.height(),
        bands = raster.band_count(),
        "Wrote GeoTIFF"
    );
    Ok(())
}

/// Encodes `raster` into any seekable writer.
pub fn write_to<W: Write + Seek>(writer: W, raster: &Raster) -> tiff::TiffResult<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let mut dir = encoder.image_directory()?;

    let bands = raster.band_count();
    let cell_type = raster.cell_type();
    let width = raster.width() as u32;
    let height = raster.height() as u32;

    let rgb = cell_type == CellType::UInt8 && (bands == 3 || bands == 4);

    dir.write_tag(Tag::ImageWidth, width)?;
    dir.write_tag(Tag::ImageLength, height)?;
    dir.write_tag(Tag::BitsPerSample, vec![cell_type.bits(); bands].as_slice())?;
    dir.write_tag(Tag::Compression, 1u16)?;
    dir.write_tag(
        Tag::PhotometricInterpretation,
        if rgb { PHOTOMETRIC_RGB } else { PHOTOMETRIC_MIN_IS_BLACK },
    )?;
    dir.write_tag(Tag::SamplesPerPixel, bands as u16)?;
    dir.write_tag(Tag::SampleFormat, vec![sample_format(cell_type); bands].as_slice())?;
    dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
    dir.write_tag(Tag::RowsPerStrip, height)?;

    let extra_samples: Vec<u16> = if rgb {
        vec![EXTRA_SAMPLE_UNASSOCIATED_ALPHA; bands - 3]
    } else {
        vec![EXTRA_SAMPLE_UNSPECIFIED; bands - 1]
    };
    if !extra_samples.is_empty() {
        dir.write_tag(Tag::ExtraSamples, extra_samples.as_slice())?;
    }

    write_geo_tags(&mut dir, raster)?;

    let (offset, byte_count) = write_cells(&mut dir, raster)?;
    dir.write_tag(Tag::StripOffsets, to_u32(offset)?)?;
    dir.write_tag(Tag::StripByteCounts, to_u32(byte_count)?)?;

    dir.finish()
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    raster: &Raster,
) -> tiff::TiffResult<()> {
    let t = raster.transform();
    if t.is_rectilinear() {
        dir.write_tag(Tag::ModelPixelScaleTag, [t.a, -t.e, 0.0].as_slice())?;
        dir.write_tag(Tag::ModelTiepointTag, [0.0, 0.0, 0.0, t.c, t.f, 0.0].as_slice())?;
    } else {
        let matrix = [
            t.a, t.b, 0.0, t.c, //
            t.d, t.e, 0.0, t.f, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, matrix.as_slice())?;
    }

    if let Some(crs) = raster.crs() {
        dir.write_tag(Tag::GeoKeyDirectoryTag, geokey_directory(crs).as_slice())?;
    }

    if let Some(nodata) = raster.nodata() {
        let text = format_nodata(nodata);
        dir.write_tag(Tag::GdalNodata, text.as_str())?;
    }
    Ok(())
}

fn write_cells<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    raster: &Raster,
) -> tiff::TiffResult<(u64, u64)> {
    let cell_type = raster.cell_type();
    let interleaved = interleave(raster);
    let count = interleaved.len() as u64;
    let byte_count = count * u64::from(cell_type.bits() / 8);

    macro_rules! write_as {
        ($t:ty) => {{
            let cells: Vec<$t> = interleaved.iter().map(|&v| cell_type.cast(v) as $t).collect();
            dir.write_data(cells.as_slice())?
        }};
    }

    let offset = match cell_type {
        CellType::UInt8 => write_as!(u8),
        CellType::UInt16 => write_as!(u16),
        CellType::Int16 => write_as!(i16),
        CellType::UInt32 => write_as!(u32),
        CellType::Int32 => write_as!(i32),
        CellType::Float32 => write_as!(f32),
        CellType::Float64 => write_as!(f64),
    };
    Ok((offset, byte_count))
}

fn interleave(raster: &Raster) -> Vec<f64> {
    let cells = raster.width() * raster.height();
    let bands = raster.bands();
    let mut out = Vec::with_capacity(cells * bands.len());
    for i in 0..cells {
        out.extend(bands.iter().map(|band| band.data()[i]));
    }
    out
}

fn deinterleave(values: &[f64], band_count: usize, width: usize, height: usize) -> Result<Vec<Band>> {
    (0..band_count)
        .map(|b| {
            let data = values.iter().skip(b).step_by(band_count).copied().collect();
            Band::new(width, height, data)
        })
        .collect()
}

fn to_u32(value: u64) -> tiff::TiffResult<u32> {
    u32::try_from(value).map_err(|_| {
        tiff::TiffError::LimitsExceeded
    })
}

fn sample_format(cell_type: CellType) -> u16 {
    match cell_type {
        CellType::UInt8 | CellType::UInt16 | CellType::UInt32 => SAMPLE_FORMAT_UINT,
        CellType::Int16 | CellType::Int32 => SAMPLE_FORMAT_INT,
        CellType::Float32 | CellType::Float64 => SAMPLE_FORMAT_IEEEFP,
    }
}

fn decoded_values(image: DecodingResult) -> Option<(CellType, Vec<f64>)> {
    fn widen<T: Copy + Into<f64>>(values: Vec<T>) -> Vec<f64> {
        values.into_iter().map(Into::into).collect()
    }

    let decoded = match image {
        DecodingResult::U8(v) => (CellType::UInt8, widen(v)),
        DecodingResult::U16(v) => (CellType::UInt16, widen(v)),
        DecodingResult::I16(v) => (CellType::Int16, widen(v)),
        DecodingResult::U32(v) => (CellType::UInt32, widen(v)),
        DecodingResult::I32(v) => (CellType::Int32, widen(v)),
        DecodingResult::F32(v) => (CellType::Float32, widen(v)),
        DecodingResult::F64(v) => (CellType::Float64, v),
        _ => return None,
    };
    Some(decoded)
}

fn geokey_directory(crs: Crs) -> Vec<u16> {
    let geographic = crs.is_geographic();
    let mut keys = vec![1, 1, 0, 3];
    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if geographic { MODEL_TYPE_GEOGRAPHIC } else { MODEL_TYPE_PROJECTED },
    ]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
    let crs_key = if geographic { GEOGRAPHIC_TYPE_GEO_KEY } else { PROJECTED_CS_TYPE_GEO_KEY };
    keys.extend_from_slice(&[crs_key, 0, 1, crs.epsg()]);
    keys
}

fn crs_from_geokeys(keys: &[u16]) -> Option<Crs> {
    let count = *keys.get(3)? as usize;
    let entries = keys.get(4..4 + count * 4)?;
    let mut geographic = None;
    let mut projected = None;
    for entry in entries.chunks_exact(4) {
        // Only keys stored inline (location 0) carry an EPSG code.
        if entry[1] != 0 || entry[3] == 0 || entry[3] == USER_DEFINED {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_GEO_KEY => projected = Some(entry[3]),
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(entry[3]),
            _ => {}
        }
    }
    projected.or(geographic).map(Crs::from_epsg)
}

fn read_crs<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> tiff::TiffResult<Option<Crs>> {
    match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(value) => Ok(crs_from_geokeys(&value.into_u16_vec()?)),
        None => Ok(None),
    }
}

fn read_transform<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> tiff::TiffResult<Affine> {
    if let Some(value) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = value.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(Affine::new(m[0], m[1], m[3], m[4], m[5], m[7]));
        }
    }

    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?;
    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?;
    match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => {
            let scale = scale.into_f64_vec()?;
            let tie = tiepoint.into_f64_vec()?;
            if scale.len() < 2 || tie.len() < 6 {
                return Ok(Affine::identity());
            }
            let (sx, sy) = (scale[0], scale[1]);
            Ok(Affine::new(sx, 0.0, tie[3] - tie[0] * sx, 0.0, -sy, tie[4] + tie[1] * sy))
        }
        _ => Ok(Affine::identity()),
    }
}

fn read_nodata<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> tiff::TiffResult<Option<f64>> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    Ok(text.trim_matches(char::from(0)).trim().parse::<f64>().ok())
}

fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else if nodata.fract() == 0.0 && nodata.abs() < 1e15 {
        format!("{}", nodata as i64)
    } else {
        format!("{nodata}")
    }
}
