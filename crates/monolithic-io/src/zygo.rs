//! Zygo MetroPro binary `.dat` files.
//!
//! Layout (all fields big-endian):
//!
//! | Section | Size |
//! |---|---|
//! | header | `header_size` bytes (834 for formats 1 and 2, 4096 for format 3) |
//! | intensity | `ac_n_bytes`: `ac_n_buckets` frames of `u16`, `ac_width x ac_height` |
//! | phase | `cn_n_bytes`: `i32`, `cn_width x cn_height` |
//!
//! Phase counts at or above [`INVALID_PHASE`] mark missing data. Valid
//! counts convert to metres as `count * S * O * λ / R` where `S` is the
//! interferometric scale factor, `O` the obliquity factor, `λ` the
//! wavelength and `R` the phase resolution divisor.
//!
//! The HDF5-based `.datx` format is read by [`crate::datx`].

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use monolithic_core::Grid;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MAGIC_FORMAT_1: u32 = 0x881B_036E;
pub const MAGIC_FORMAT_2: u32 = 0x881B_036F;
pub const MAGIC_FORMAT_3: u32 = 0x881B_0370;

/// Phase counts at or above this value are missing samples.
pub const INVALID_PHASE: i32 = 2_147_483_640;

const HEADER_SIZE_V1: u32 = 834;
const HEADER_SIZE_V3: u32 = 4096;

mod offset {
    pub const MAGIC: usize = 0;
    pub const HEADER_FORMAT: usize = 4;
    pub const HEADER_SIZE: usize = 6;
    pub const SOFTWARE_TYPE: usize = 10;
    pub const SOFTWARE_DATE: usize = 12;
    pub const SOFTWARE_DATE_LEN: usize = 30;
    pub const VERSION_MAJOR: usize = 42;
    pub const VERSION_MINOR: usize = 44;
    pub const VERSION_BUG: usize = 46;
    pub const AC_ORG_X: usize = 48;
    pub const AC_ORG_Y: usize = 50;
    pub const AC_WIDTH: usize = 52;
    pub const AC_HEIGHT: usize = 54;
    pub const AC_N_BUCKETS: usize = 56;
    pub const AC_RANGE: usize = 58;
    pub const AC_N_BYTES: usize = 60;
    pub const CN_ORG_X: usize = 64;
    pub const CN_ORG_Y: usize = 66;
    pub const CN_WIDTH: usize = 68;
    pub const CN_HEIGHT: usize = 70;
    pub const CN_N_BYTES: usize = 72;
    pub const TIME_STAMP: usize = 76;
    pub const COMMENT: usize = 80;
    pub const COMMENT_LEN: usize = 82;
    pub const SOURCE: usize = 162;
    pub const INTF_SCALE_FACTOR: usize = 164;
    pub const WAVELENGTH: usize = 168;
    pub const NUMERICAL_APERTURE: usize = 172;
    pub const OBLIQUITY_FACTOR: usize = 176;
    pub const MAGNIFICATION: usize = 180;
    pub const LATERAL_RESOLUTION: usize = 184;
    pub const PHASE_RES: usize = 218;
    /// Smallest header that holds every field above.
    pub const MIN_HEADER: usize = 220;
}

/// Phase resolution setting and its fringe divisor `R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseResolution {
    Normal,
    High,
    Super,
}

impl PhaseResolution {
    pub const fn divisor(self) -> f64 {
        match self {
            Self::Normal => 4096.0,
            Self::High => 32768.0,
            Self::Super => 131_072.0,
        }
    }

    const fn code(self) -> i16 {
        match self {
            Self::Normal => 0,
            Self::High => 1,
            Self::Super => 2,
        }
    }

    fn from_code(code: i16) -> Result<Self> {
        match code {
            0 => Ok(Self::Normal),
            1 => Ok(Self::High),
            2 => Ok(Self::Super),
            other => Err(Error::InvalidHeader(format!("unknown phase resolution {other}"))),
        }
    }
}

/// Geometry of the intensity (camera) block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntensityBlock {
    pub origin: (i16, i16),
    pub width: u16,
    pub height: u16,
    pub n_buckets: u16,
    pub range: u16,
    pub n_bytes: u32,
}

/// Geometry of the phase (connected) block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseBlock {
    pub origin: (i16, i16),
    pub width: u16,
    pub height: u16,
    pub n_bytes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatHeader {
    /// Header format, 1 to 3.
    pub format: u16,
    pub header_size: u32,
    pub software_type: i16,
    pub software_date: String,
    /// `(major, minor, bug)`.
    pub software_version: (i16, i16, i16),
    pub intensity: IntensityBlock,
    pub phase: PhaseBlock,
    /// Acquisition time, seconds since the Unix epoch.
    pub timestamp: i32,
    pub comment: String,
    pub source: i16,
    pub intf_scale_factor: f32,
    /// Wavelength in metres.
    pub wavelength: f32,
    pub numerical_aperture: f32,
    pub obliquity_factor: f32,
    pub magnification: f32,
    /// Lateral resolution (pixel size) in metres, 0 when unknown.
    pub lateral_resolution: f32,
    pub phase_resolution: PhaseResolution,
}

impl DatHeader {
    /// A format-1 header for a `width x height` phase map without intensity
    /// data, with a HeNe wavelength and unit scale and obliquity factors.
    pub fn for_phase(width: u16, height: u16, lateral_resolution: f32) -> Self {
        Self {
            format: 1,
            header_size: HEADER_SIZE_V1,
            software_type: 1,
            software_date: String::new(),
            software_version: (0, 0, 0),
            intensity: IntensityBlock::default(),
            phase: PhaseBlock {
                origin: (0, 0),
                width,
                height,
                n_bytes: u32::from(width) * u32::from(height) * 4,
            },
            timestamp: 0,
            comment: String::new(),
            source: 0,
            intf_scale_factor: 0.5,
            wavelength: 632.8e-9,
            numerical_aperture: 0.0,
            obliquity_factor: 1.0,
            magnification: 1.0,
            lateral_resolution,
            phase_resolution: PhaseResolution::High,
        }
    }

    /// Metres per phase count.
    pub fn phase_scale(&self) -> f64 {
        f64::from(self.intf_scale_factor)
            * f64::from(self.obliquity_factor)
            * f64::from(self.wavelength)
            / self.phase_resolution.divisor()
    }

    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.timestamp), 0)
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        let b = Bytes(bytes);
        if bytes.len() < offset::MIN_HEADER {
            return Err(Error::Truncated {
                section: "header",
                needed: offset::MIN_HEADER,
                available: bytes.len(),
            });
        }

        let magic = b.u32(offset::MAGIC);
        let expected_size = match magic {
            MAGIC_FORMAT_1 | MAGIC_FORMAT_2 => HEADER_SIZE_V1,
            MAGIC_FORMAT_3 => HEADER_SIZE_V3,
            other => return Err(Error::BadMagic(other)),
        };
        let format = b.u16(offset::HEADER_FORMAT);
        let header_size = b.u32(offset::HEADER_SIZE);
        if (header_size as usize) < offset::MIN_HEADER {
            return Err(Error::InvalidHeader(format!("header size {header_size} is too small")));
        }
        if header_size != expected_size {
            log::warn!(
                "MetroPro header size {} differs from the {} expected for magic {:#010x}",
                header_size,
                expected_size,
                magic
            );
        }

        Ok(Self {
            format,
            header_size,
            software_type: b.i16(offset::SOFTWARE_TYPE),
            software_date: b.text(offset::SOFTWARE_DATE, offset::SOFTWARE_DATE_LEN),
            software_version: (
                b.i16(offset::VERSION_MAJOR),
                b.i16(offset::VERSION_MINOR),
                b.i16(offset::VERSION_BUG),
            ),
            intensity: IntensityBlock {
                origin: (b.i16(offset::AC_ORG_X), b.i16(offset::AC_ORG_Y)),
                width: b.u16(offset::AC_WIDTH),
                height: b.u16(offset::AC_HEIGHT),
                n_buckets: b.u16(offset::AC_N_BUCKETS),
                range: b.u16(offset::AC_RANGE),
                n_bytes: b.u32(offset::AC_N_BYTES),
            },
            phase: PhaseBlock {
                origin: (b.i16(offset::CN_ORG_X), b.i16(offset::CN_ORG_Y)),
                width: b.u16(offset::CN_WIDTH),
                height: b.u16(offset::CN_HEIGHT),
                n_bytes: b.u32(offset::CN_N_BYTES),
            },
            timestamp: b.i32(offset::TIME_STAMP),
            comment: b.text(offset::COMMENT, offset::COMMENT_LEN),
            source: b.i16(offset::SOURCE),
            intf_scale_factor: b.f32(offset::INTF_SCALE_FACTOR),
            wavelength: b.f32(offset::WAVELENGTH),
            numerical_aperture: b.f32(offset::NUMERICAL_APERTURE),
            obliquity_factor: b.f32(offset::OBLIQUITY_FACTOR),
            magnification: b.f32(offset::MAGNIFICATION),
            lateral_resolution: b.f32(offset::LATERAL_RESOLUTION),
            phase_resolution: PhaseResolution::from_code(b.i16(offset::PHASE_RES))?,
        })
    }

    fn magic(&self) -> u32 {
        match self.format {
            3 => MAGIC_FORMAT_3,
            2 => MAGIC_FORMAT_2,
            _ => MAGIC_FORMAT_1,
        }
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + self.header_size as usize, 0);
        let h = &mut out[start..];
        put(h, offset::MAGIC, &self.magic().to_be_bytes());
        put(h, offset::HEADER_FORMAT, &self.format.to_be_bytes());
        put(h, offset::HEADER_SIZE, &self.header_size.to_be_bytes());
        put(h, offset::SOFTWARE_TYPE, &self.software_type.to_be_bytes());
        put_text(h, offset::SOFTWARE_DATE, offset::SOFTWARE_DATE_LEN, &self.software_date);
        put(h, offset::VERSION_MAJOR, &self.software_version.0.to_be_bytes());
        put(h, offset::VERSION_MINOR, &self.software_version.1.to_be_bytes());
        put(h, offset::VERSION_BUG, &self.software_version.2.to_be_bytes());
        put(h, offset::AC_ORG_X, &self.intensity.origin.0.to_be_bytes());
        put(h, offset::AC_ORG_Y, &self.intensity.origin.1.to_be_bytes());
        put(h, offset::AC_WIDTH, &self.intensity.width.to_be_bytes());
        put(h, offset::AC_HEIGHT, &self.intensity.height.to_be_bytes());
        put(h, offset::AC_N_BUCKETS, &self.intensity.n_buckets.to_be_bytes());
        put(h, offset::AC_RANGE, &self.intensity.range.to_be_bytes());
        put(h, offset::AC_N_BYTES, &self.intensity.n_bytes.to_be_bytes());
        put(h, offset::CN_ORG_X, &self.phase.origin.0.to_be_bytes());
        put(h, offset::CN_ORG_Y, &self.phase.origin.1.to_be_bytes());
        put(h, offset::CN_WIDTH, &self.phase.width.to_be_bytes());
        put(h, offset::CN_HEIGHT, &self.phase.height.to_be_bytes());
        put(h, offset::CN_N_BYTES, &self.phase.n_bytes.to_be_bytes());
        put(h, offset::TIME_STAMP, &self.timestamp.to_be_bytes());
        put_text(h, offset::COMMENT, offset::COMMENT_LEN, &self.comment);
        put(h, offset::SOURCE, &self.source.to_be_bytes());
        put(h, offset::INTF_SCALE_FACTOR, &self.intf_scale_factor.to_be_bytes());
        put(h, offset::WAVELENGTH, &self.wavelength.to_be_bytes());
        put(h, offset::NUMERICAL_APERTURE, &self.numerical_aperture.to_be_bytes());
        put(h, offset::OBLIQUITY_FACTOR, &self.obliquity_factor.to_be_bytes());
        put(h, offset::MAGNIFICATION, &self.magnification.to_be_bytes());
        put(h, offset::LATERAL_RESOLUTION, &self.lateral_resolution.to_be_bytes());
        put(h, offset::PHASE_RES, &self.phase_resolution.code().to_be_bytes());
    }
}

/// Big-endian field access into a header buffer already checked for length.
struct Bytes<'a>(&'a [u8]);

impl Bytes<'_> {
    fn array<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.0[at..at + N]);
        out
    }

    fn u16(&self, at: usize) -> u16 {
        u16::from_be_bytes(self.array(at))
    }

    fn i16(&self, at: usize) -> i16 {
        i16::from_be_bytes(self.array(at))
    }

    fn u32(&self, at: usize) -> u32 {
        u32::from_be_bytes(self.array(at))
    }

    fn i32(&self, at: usize) -> i32 {
        i32::from_be_bytes(self.array(at))
    }

    fn f32(&self, at: usize) -> f32 {
        f32::from_be_bytes(self.array(at))
    }

    /// NUL-terminated text field.
    fn text(&self, at: usize, len: usize) -> String {
        let raw = &self.0[at..at + len];
        let end = raw.iter().position(|&c| c == 0).unwrap_or(len);
        String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
    }
}

fn put(buf: &mut [u8], at: usize, bytes: &[u8]) {
    buf[at..at + bytes.len()].copy_from_slice(bytes);
}

fn put_text(buf: &mut [u8], at: usize, len: usize, text: &str) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(len - 1);
    buf[at..at + n].copy_from_slice(&bytes[..n]);
}

/// A metadata value, mirroring the attribute types found in instrument files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// A decoded `.dat` file.
#[derive(Debug, Clone, PartialEq)]
pub struct DatFile {
    pub header: DatHeader,
    /// Camera intensity frames, one grid per bucket.
    pub intensity: Option<Vec<Grid<u16>>>,
    /// Surface heights in metres, `NaN` where invalid.
    pub phase: Grid,
}

impl DatFile {
    /// Decode a complete `.dat` image.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = DatHeader::parse(bytes)?;
        let mut pos = header.header_size as usize;

        let intensity = if header.intensity.n_bytes == 0 {
            None
        } else {
            let block = section(bytes, pos, header.intensity.n_bytes as usize, "intensity")?;
            pos += block.len();
            Some(decode_intensity(&header.intensity, block)?)
        };

        let width = usize::from(header.phase.width);
        let height = usize::from(header.phase.height);
        let needed = width * height * 4;
        if header.phase.n_bytes as usize != needed {
            log::warn!(
                "phase block reports {} bytes but {}x{} needs {}",
                header.phase.n_bytes,
                width,
                height,
                needed
            );
        }
        let block = section(bytes, pos, needed, "phase")?;
        let scale = header.phase_scale();
        let samples = block
            .chunks_exact(4)
            .map(|c| {
                let count = i32::from_be_bytes([c[0], c[1], c[2], c[3]]);
                if count >= INVALID_PHASE {
                    f64::NAN
                } else {
                    f64::from(count) * scale
                }
            })
            .collect();
        let phase = Grid::new(height, width, samples)?;

        log::debug!(
            "decoded MetroPro format {} file: {}x{} phase, {} intensity frame(s)",
            header.format,
            width,
            height,
            intensity.as_ref().map_or(0, Vec::len)
        );

        Ok(Self {
            header,
            intensity,
            phase,
        })
    }

    /// Build a file around a height map (metres, `NaN` for missing samples).
    pub fn from_phase(header: DatHeader, phase: Grid) -> Result<Self> {
        let mut file = Self {
            header,
            intensity: None,
            phase,
        };
        file.header = file.synced_header()?;
        Ok(file)
    }

    /// The header with its block geometry taken from the data it describes.
    fn synced_header(&self) -> Result<DatHeader> {
        let mut header = self.header.clone();
        if (header.header_size as usize) < offset::MIN_HEADER {
            return Err(Error::InvalidHeader(format!(
                "header size {} is below the {} byte minimum",
                header.header_size,
                offset::MIN_HEADER
            )));
        }

        let (rows, cols) = self.phase.shape();
        header.phase.width = dimension("phase width", cols)?;
        header.phase.height = dimension("phase height", rows)?;
        header.phase.n_bytes = block_bytes("phase", rows * cols, 4)?;

        match self.intensity.as_deref() {
            None | Some([]) => {
                header.intensity.n_buckets = 0;
                header.intensity.n_bytes = 0;
            }
            Some(frames @ [first, ..]) => {
                let (rows, cols) = first.shape();
                if let Some(other) = frames.iter().find(|f| f.shape() != first.shape()) {
                    return Err(Error::InvalidHeader(format!(
                        "intensity frames differ in shape: {}x{} and {}x{}",
                        rows,
                        cols,
                        other.rows(),
                        other.cols()
                    )));
                }
                if first.is_empty() {
                    return Err(Error::InvalidHeader(String::from("empty intensity frame")));
                }
                header.intensity.width = dimension("intensity width", cols)?;
                header.intensity.height = dimension("intensity height", rows)?;
                header.intensity.n_buckets = dimension("intensity buckets", frames.len())?;
                header.intensity.n_bytes = block_bytes("intensity", first.len() * frames.len(), 2)?;
            }
        }
        Ok(header)
    }

    /// Encode back to the MetroPro binary layout.
    ///
    /// Heights are quantised to the header's phase scale. Block sizes in
    /// the written header follow the phase map and intensity frames.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let scale = self.header.phase_scale();
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::InvalidHeader(format!("phase scale {scale} is not positive")));
        }
        let header = self.synced_header()?;

        let mut out = Vec::with_capacity(
            header.header_size as usize
                + header.intensity.n_bytes as usize
                + header.phase.n_bytes as usize,
        );
        header.write_into(&mut out);
        for frame in self.intensity.iter().flatten() {
            for v in frame.iter() {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        for z in self.phase.iter() {
            let count = if z.is_finite() {
                (z / scale).round().clamp(f64::from(i32::MIN), f64::from(INVALID_PHASE - 1)) as i32
            } else {
                i32::MAX
            };
            out.extend_from_slice(&count.to_be_bytes());
        }
        Ok(out)
    }

    /// Lateral resolution in metres, `None` when the header reports zero.
    pub fn lateral_resolution(&self) -> Option<f64> {
        let res = f64::from(self.header.lateral_resolution);
        (res.is_finite() && res > 0.0).then_some(res)
    }

    /// Header attributes as a flat key/value map, including `lateral_res`
    /// in metres.
    pub fn meta(&self) -> BTreeMap<String, MetaValue> {
        let h = &self.header;
        let mut meta = BTreeMap::new();
        let mut int = |k: &str, v: i64| meta.insert(k.to_string(), MetaValue::Int(v));
        int("Header Format", i64::from(h.format));
        int("Software Type", i64::from(h.software_type));
        int("Time Stamp", i64::from(h.timestamp));
        int("Source", i64::from(h.source));
        int("Camera Width", i64::from(h.intensity.width));
        int("Camera Height", i64::from(h.intensity.height));
        int("Phase Width", i64::from(h.phase.width));
        int("Phase Height", i64::from(h.phase.height));
        int("Phase Res", i64::from(h.phase_resolution.code()));

        let mut float = |k: &str, v: f32| meta.insert(k.to_string(), MetaValue::Float(f64::from(v)));
        float("Interferometric Scale Factor", h.intf_scale_factor);
        float("Wavelength", h.wavelength);
        float("Numerical Aperture", h.numerical_aperture);
        float("Obliquity Factor", h.obliquity_factor);
        float("Magnification", h.magnification);
        float("Resolution:Value", h.lateral_resolution);

        let mut text = |k: &str, v: &str| meta.insert(k.to_string(), MetaValue::Text(v.to_string()));
        text("Resolution:Unit", "Meters");
        text(
            "Software Version",
            &format!(
                "{}.{}.{}",
                h.software_version.0, h.software_version.1, h.software_version.2
            ),
        );
        if !h.software_date.is_empty() {
            text("Software Date", &h.software_date);
        }
        if !h.comment.is_empty() {
            text("Comment", &h.comment);
        }

        meta.insert(
            "lateral_res".to_string(),
            MetaValue::Float(f64::from(h.lateral_resolution)),
        );
        meta
    }
}

fn dimension(what: &str, n: usize) -> Result<u16> {
    u16::try_from(n).map_err(|_| Error::InvalidHeader(format!("{what} {n} exceeds u16")))
}

fn block_bytes(section: &str, samples: usize, size: usize) -> Result<u32> {
    samples
        .checked_mul(size)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::InvalidHeader(format!("{section} block of {samples} samples is too large")))
}

fn section<'a>(bytes: &'a [u8], pos: usize, len: usize, name: &'static str) -> Result<&'a [u8]> {
    bytes.get(pos..pos + len).ok_or(Error::Truncated {
        section: name,
        needed: pos + len,
        available: bytes.len(),
    })
}

fn decode_intensity(info: &IntensityBlock, block: &[u8]) -> Result<Vec<Grid<u16>>> {
    let width = usize::from(info.width);
    let height = usize::from(info.height);
    let frame_len = width * height;
    if frame_len == 0 {
        return Err(Error::InvalidHeader(format!(
            "intensity block of {} bytes with a {}x{} frame",
            block.len(),
            width,
            height
        )));
    }
    let values: Vec<u16> = block
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    let buckets = usize::from(info.n_buckets.max(1));
    if values.len() < frame_len * buckets {
        return Err(Error::Truncated {
            section: "intensity",
            needed: frame_len * buckets * 2,
            available: block.len(),
        });
    }
    values
        .chunks_exact(frame_len)
        .take(buckets)
        .map(|frame| Grid::new(height, width, frame.to_vec()).map_err(Error::from))
        .collect()
}

/// Read a Zygo MetroPro `.dat` file.
///
/// `.datx` paths are rejected; use [`crate::datx::read_zygo_datx`].
pub fn read_zygo_dat(path: impl AsRef<Path>) -> Result<DatFile> {
    let path = path.as_ref();
    if crate::surface::is_datx(path) {
        return Err(Error::UnsupportedFormat(path.to_path_buf()));
    }
    log::debug!("Reading MetroPro file {}", path.display());
    let bytes = std::fs::read(path)?;
    DatFile::decode(&bytes)
}

/// Write a [`DatFile`] as a MetroPro `.dat` file.
pub fn write_zygo_dat(path: impl AsRef<Path>, file: &DatFile) -> Result<()> {
    std::fs::write(path, file.encode()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_phase() -> Grid {
        Grid::from_fn(3, 4, |r, c| {
            if r == 0 && c == 0 {
                f64::NAN
            } else {
                (r as f64 - 1.0) * 1e-8 + c as f64 * 2e-9
            }
        })
    }

    fn sample_file() -> DatFile {
        let mut header = DatHeader::for_phase(4, 3, 1e-5);
        header.comment = String::from("flat #3");
        header.software_version = (9, 1, 4);
        header.timestamp = 1_600_000_000;
        DatFile::from_phase(header, sample_phase()).unwrap()
    }

    #[test]
    fn test_phase_resolution_divisors() {
        assert!((PhaseResolution::Normal.divisor() - 4096.0).abs() < f64::EPSILON);
        assert!((PhaseResolution::High.divisor() - 32768.0).abs() < f64::EPSILON);
        assert!((PhaseResolution::Super.divisor() - 131_072.0).abs() < f64::EPSILON);
        assert!(PhaseResolution::from_code(7).is_err());
    }

    #[test]
    fn test_encode_decode() {
        let file = sample_file();
        let bytes = file.encode().unwrap();
        assert_eq!(bytes.len(), 834 + 3 * 4 * 4);
        assert_eq!(&bytes[..4], &MAGIC_FORMAT_1.to_be_bytes());

        let decoded = DatFile::decode(&bytes).unwrap();
        assert_eq!(decoded.header.comment, "flat #3");
        assert_eq!(decoded.header.software_version, (9, 1, 4));
        assert_eq!(decoded.header.phase.width, 4);
        assert_eq!(decoded.header.phase.height, 3);
        assert!(decoded.intensity.is_none());
        assert!(decoded.phase.get(0, 0).unwrap().is_nan());

        let step = decoded.header.phase_scale();
        for (a, b) in file.phase.iter().zip(decoded.phase.iter()).skip(1) {
            assert!((a - b).abs() <= step);
        }
    }

    #[test]
    fn test_phase_conversion_uses_header_factors() {
        let mut header = DatHeader::for_phase(1, 1, 0.0);
        header.intf_scale_factor = 0.5;
        header.obliquity_factor = 1.0;
        header.wavelength = 600e-9;
        header.phase_resolution = PhaseResolution::Normal;
        let mut bytes = Vec::new();
        header.write_into(&mut bytes);
        bytes.extend_from_slice(&4096i32.to_be_bytes());

        let file = DatFile::decode(&bytes).unwrap();
        let z = *file.phase.get(0, 0).unwrap();
        // one full count of R is one wave times S
        assert!((z - 300e-9).abs() < 1e-13);
        assert!(file.lateral_resolution().is_none());
    }

    #[test]
    fn test_intensity_frames() {
        let mut file = sample_file();
        file.header.intensity = IntensityBlock {
            origin: (0, 0),
            width: 2,
            height: 2,
            n_buckets: 2,
            range: 255,
            n_bytes: 0,
        };
        file.intensity = Some(vec![
            Grid::new(2, 2, vec![1, 2, 3, 4]).unwrap(),
            Grid::new(2, 2, vec![5, 6, 7, 65535]).unwrap(),
        ]);
        let decoded = DatFile::decode(&file.encode().unwrap()).unwrap();
        let frames = decoded.intensity.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_slice(), &[5, 6, 7, 65535]);
        assert_eq!(decoded.header.intensity.n_bytes, 16);
        assert_eq!(decoded.phase.shape(), (3, 4));
    }

    #[test]
    fn test_encode_syncs_stale_geometry() {
        let file = DatFile {
            header: DatHeader::for_phase(0, 0, 1e-5),
            intensity: Some(vec![
                Grid::new(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap(),
                Grid::new(2, 3, vec![7, 8, 9, 10, 11, 12]).unwrap(),
            ]),
            phase: sample_phase(),
        };
        let decoded = DatFile::decode(&file.encode().unwrap()).unwrap();
        assert_eq!(decoded.phase.shape(), (3, 4));
        assert_eq!(decoded.header.phase.n_bytes, 48);
        assert_eq!(decoded.header.intensity.width, 3);
        assert_eq!(decoded.header.intensity.height, 2);
        assert_eq!(decoded.header.intensity.n_buckets, 2);
        let frames = decoded.intensity.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_slice(), &[7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_intensity_added_after_from_phase() {
        let mut file = sample_file();
        file.intensity = Some(vec![Grid::new(2, 2, vec![10, 20, 30, 40]).unwrap()]);
        let decoded = DatFile::decode(&file.encode().unwrap()).unwrap();
        assert_eq!(decoded.intensity.unwrap()[0].as_slice(), &[10, 20, 30, 40]);
        assert_eq!(decoded.phase.shape(), (3, 4));
    }

    #[test]
    fn test_encode_rejects_mixed_frame_shapes() {
        let mut file = sample_file();
        file.intensity = Some(vec![
            Grid::filled(2, 2, 0u16),
            Grid::filled(3, 2, 0u16),
        ]);
        assert!(matches!(file.encode(), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_encode_rejects_short_header() {
        let mut file = sample_file();
        file.header.header_size = 100;
        assert!(matches!(file.encode(), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_invalid_phase_boundary() {
        let header = DatHeader::for_phase(2, 1, 1e-5);
        let mut bytes = Vec::new();
        header.write_into(&mut bytes);
        bytes.extend_from_slice(&2_147_483_639i32.to_be_bytes());
        bytes.extend_from_slice(&2_147_483_640i32.to_be_bytes());

        let file = DatFile::decode(&bytes).unwrap();
        let valid = *file.phase.get(0, 0).unwrap();
        let expected = 2_147_483_639.0 * header.phase_scale();
        assert!((valid - expected).abs() <= expected.abs() * 1e-12);
        assert!(file.phase.get(0, 1).unwrap().is_nan());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample_file().encode().unwrap();
        bytes[0] = 0;
        assert!(matches!(DatFile::decode(&bytes), Err(Error::BadMagic(_))));
    }

    #[test]
    fn test_truncated() {
        let bytes = sample_file().encode().unwrap();
        assert!(matches!(
            DatFile::decode(&bytes[..bytes.len() - 1]),
            Err(Error::Truncated { section: "phase", .. })
        ));
        assert!(matches!(
            DatFile::decode(&bytes[..100]),
            Err(Error::Truncated { section: "header", .. })
        ));
    }

    #[test]
    fn test_meta_contains_lateral_res() {
        let meta = sample_file().meta();
        assert!(matches!(meta.get("lateral_res"), Some(MetaValue::Float(v)) if (v - 1e-5).abs() < 1e-12));
        assert_eq!(meta.get("Comment"), Some(&MetaValue::Text(String::from("flat #3"))));
        assert_eq!(meta.get("Phase Width"), Some(&MetaValue::Int(4)));
        assert!(!meta.contains_key("Software Date"));
    }

    #[test]
    fn test_acquired_at() {
        let file = sample_file();
        let at = file.header.acquired_at().unwrap();
        assert_eq!(at.timestamp(), 1_600_000_000);
    }

    #[test]
    fn test_datx_is_rejected() {
        assert!(matches!(
            read_zygo_dat("scan.datx"),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
