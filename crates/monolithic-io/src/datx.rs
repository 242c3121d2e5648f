//! Zygo `.datx` files (HDF5).
//!
//! A `.datx` file keeps the surface in the first dataset of `Data/Surface`,
//! an optional camera frame in the first dataset of `Data/Intensity`, and
//! the measurement attributes on the last group under `Attributes`.
//!
//! Surface values at or above the dataset's `No Data` attribute are
//! missing. Valid values convert to metres as `v * O * S * λ` using the
//! `Obliquity Factor`, `Interferometric Scale Factor` and `Wavelength`
//! attributes of the same dataset.
//!
//! Opening files needs the `datx` feature, which links the HDF5 library.

use std::collections::BTreeMap;
use std::path::Path;

use monolithic_core::units::metres_per_unit;
use monolithic_core::Grid;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::zygo::MetaValue;

/// Prefix carried by the measurement attributes proper.
pub const ATTRIBUTE_PREFIX: &str = "Data Context.Data Attributes.";

/// Bookkeeping attributes left out of the metadata.
const SKIPPED_ATTRIBUTES: [&str; 3] = ["Property Bag List", "Group Number", "TextCount"];

/// Metadata key for an HDF5 attribute name, `None` for bookkeeping entries.
pub fn attribute_key(name: &str) -> Option<&str> {
    if let Some(key) = name.strip_prefix(ATTRIBUTE_PREFIX) {
        return Some(key);
    }
    (!SKIPPED_ATTRIBUTES.contains(&name)).then_some(name)
}

/// `Resolution:Value` in metres, converted with `Resolution:Unit`.
///
/// A missing or unknown unit is taken as metres.
pub fn lateral_resolution(meta: &BTreeMap<String, MetaValue>) -> Option<f64> {
    let value = match meta.get("Resolution:Value")? {
        MetaValue::Float(v) => *v,
        MetaValue::Int(v) => *v as f64,
        MetaValue::Text(_) => return None,
    };
    let factor = match meta.get("Resolution:Unit") {
        Some(MetaValue::Text(unit)) => metres_per_unit(unit).unwrap_or_else(|| {
            log::warn!("unknown resolution unit '{unit}', assuming metres");
            1.0
        }),
        _ => 1.0,
    };
    Some(value * factor)
}

/// Attributes of the surface dataset that turn raw values into heights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceScale {
    /// Raw values at or above this are missing.
    pub no_data: f64,
    /// Wavelength in metres.
    pub wavelength: f64,
    pub scale_factor: f64,
    pub obliquity: f64,
}

impl SurfaceScale {
    pub fn metres_per_count(&self) -> f64 {
        self.obliquity * self.scale_factor * self.wavelength
    }

    /// Heights in metres, `NaN` where the raw value is missing.
    pub fn to_metres(&self, raw: &Grid) -> Grid {
        let k = self.metres_per_count();
        raw.map(|&v| {
            if v.is_finite() && v < self.no_data {
                v * k
            } else {
                f64::NAN
            }
        })
    }
}

/// A decoded `.datx` file.
#[derive(Debug, Clone, PartialEq)]
pub struct DatxFile {
    /// Measurement attributes, including `lateral_res` in metres when the
    /// file reports a resolution.
    pub meta: BTreeMap<String, MetaValue>,
    pub intensity: Option<Grid<u16>>,
    /// Surface heights in metres, `NaN` where invalid.
    pub phase: Grid,
}

impl DatxFile {
    /// Assemble a file from the raw surface values and attributes.
    pub fn from_raw(
        raw_phase: &Grid,
        scale: SurfaceScale,
        intensity: Option<Grid<u16>>,
        mut meta: BTreeMap<String, MetaValue>,
    ) -> Self {
        if let Some(res) = lateral_resolution(&meta) {
            meta.insert(String::from("lateral_res"), MetaValue::Float(res));
        }
        Self {
            meta,
            intensity,
            phase: scale.to_metres(raw_phase),
        }
    }

    /// Lateral resolution in metres, `None` when unknown or zero.
    pub fn lateral_resolution(&self) -> Option<f64> {
        match self.meta.get("lateral_res") {
            Some(MetaValue::Float(res)) if res.is_finite() && *res > 0.0 => Some(*res),
            _ => None,
        }
    }
}

/// Read a Zygo `.datx` file.
#[cfg(feature = "datx")]
pub fn read_zygo_datx(path: impl AsRef<Path>) -> Result<DatxFile> {
    let path = path.as_ref();
    log::debug!("Reading datx file {}", path.display());
    hdf::read(path)
}

/// Read a Zygo `.datx` file.
///
/// This build has no HDF5 support and always returns
/// [`Error::FeatureDisabled`](crate::Error::FeatureDisabled).
#[cfg(not(feature = "datx"))]
pub fn read_zygo_datx(path: impl AsRef<Path>) -> Result<DatxFile> {
    Err(crate::Error::FeatureDisabled {
        path: path.as_ref().to_path_buf(),
        feature: "datx",
    })
}

#[cfg(feature = "datx")]
mod hdf {
    use std::collections::BTreeMap;
    use std::path::Path;

    use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
    use hdf5::{Attribute, Dataset, File, Group, H5Type, Location};
    use monolithic_core::Grid;

    use super::{attribute_key, DatxFile, SurfaceScale};
    use crate::error::{Error, Result};
    use crate::zygo::MetaValue;

    pub(super) fn read(path: &Path) -> Result<DatxFile> {
        let file = File::open(path)?;
        let data = file.group("Data")?;

        let intensity = if data.member_names()?.iter().any(|n| n == "Intensity") {
            Some(read_grid::<u16>(&first_dataset(&data, "Intensity")?)?)
        } else {
            None
        };

        let surface = first_dataset(&data, "Surface")?;
        let scale = SurfaceScale {
            no_data: first_value(&surface, "No Data")?,
            wavelength: first_value(&surface, "Wavelength")?,
            scale_factor: first_value(&surface, "Interferometric Scale Factor")?,
            obliquity: first_value(&surface, "Obliquity Factor")?,
        };
        let raw = read_grid::<f64>(&surface)?;
        let meta = read_meta(&file.group("Attributes")?)?;

        Ok(DatxFile::from_raw(&raw, scale, intensity, meta))
    }

    fn first_dataset(parent: &Group, name: &str) -> Result<Dataset> {
        let group = parent.group(name)?;
        let first = group
            .member_names()?
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidHeader(format!("Data/{name} holds no dataset")))?;
        Ok(group.dataset(&first)?)
    }

    fn first_value(location: &Location, name: &str) -> Result<f64> {
        location
            .attr(name)?
            .read_raw::<f64>()?
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidHeader(format!("attribute '{name}' is empty")))
    }

    /// A 2-D dataset, allowing leading unit dimensions.
    fn read_grid<T: H5Type>(dataset: &Dataset) -> Result<Grid<T>> {
        let shape = dataset.shape();
        let (rows, cols) = match shape.as_slice() {
            [lead @ .., rows, cols] if lead.iter().all(|&d| d == 1) => (*rows, *cols),
            _ => {
                return Err(Error::InvalidHeader(format!(
                    "expected a 2-D dataset, got shape {shape:?}"
                )));
            }
        };
        Ok(Grid::new(rows, cols, dataset.read_raw::<T>()?)?)
    }

    fn read_meta(attributes: &Group) -> Result<BTreeMap<String, MetaValue>> {
        let names = attributes.member_names()?;
        let last = names
            .last()
            .ok_or_else(|| Error::InvalidHeader(String::from("Attributes holds no group")))?;
        let group = attributes.group(last)?;

        let mut meta = BTreeMap::new();
        for name in group.attr_names()? {
            let Some(key) = attribute_key(&name) else {
                continue;
            };
            if let Some(value) = attribute_value(&group.attr(&name)?)? {
                meta.insert(key.to_string(), value);
            }
        }
        Ok(meta)
    }

    /// First element of a scalar-like attribute; compound and array types
    /// are skipped.
    fn attribute_value(attr: &Attribute) -> Result<Option<MetaValue>> {
        let value = match attr.dtype()?.to_descriptor()? {
            TypeDescriptor::VarLenUnicode => attr
                .read_raw::<VarLenUnicode>()?
                .first()
                .map(|s| MetaValue::Text(s.as_str().to_string())),
            TypeDescriptor::VarLenAscii => attr
                .read_raw::<VarLenAscii>()?
                .first()
                .map(|s| MetaValue::Text(s.as_str().to_string())),
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
                attr.read_raw::<i64>()?.first().map(|v| MetaValue::Int(*v))
            }
            TypeDescriptor::Float(_) => attr.read_raw::<f64>()?.first().map(|v| MetaValue::Float(*v)),
            _ => None,
        };
        Ok(value)
    }
}
