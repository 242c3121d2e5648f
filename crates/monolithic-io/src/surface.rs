//! Height maps with coordinate grids, and clear-aperture cropping.

use std::path::Path;

use monolithic_core::{meshgrid, Grid};
use serde::{Deserialize, Serialize};

use crate::datx::{read_zygo_datx, DatxFile};
use crate::error::Result;
use crate::zygo::{read_zygo_dat, DatFile};

/// A height map `z` sampled on coordinate grids `x`, `y` (all in metres).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMap {
    pub x: Grid,
    pub y: Grid,
    pub z: Grid,
}

impl SurfaceMap {
    /// Sample `z` on a regular grid: `x[c] = c * pixel_size`, `y[r] = r * pixel_size`.
    pub fn regular(z: Grid, pixel_size: f64) -> Self {
        let (rows, cols) = z.shape();
        let xs: Vec<f64> = (0..cols).map(|c| c as f64 * pixel_size).collect();
        let ys: Vec<f64> = (0..rows).map(|r| r as f64 * pixel_size).collect();
        let (x, y) = meshgrid(&xs, &ys);
        Self { x, y, z }
    }

    /// Lay out `z` at `pixel_size`, falling back to pixel units when the
    /// instrument reports no lateral resolution.
    pub fn from_heights(z: Grid, pixel_size: Option<f64>) -> Self {
        let pixel_size = pixel_size.unwrap_or_else(|| {
            log::warn!("file reports no lateral resolution, using pixel units");
            1.0
        });
        Self::regular(z, pixel_size)
    }

    /// Build the full-frame map of a decoded `.dat` file.
    pub fn from_dat(file: &DatFile) -> Self {
        Self::from_heights(file.phase.clone(), file.lateral_resolution())
    }

    /// Build the full-frame map of a decoded `.datx` file.
    pub fn from_datx(file: &DatxFile) -> Self {
        Self::from_heights(file.phase.clone(), file.lateral_resolution())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.z.shape()
    }

    /// Crop to the bounding box of the valid samples.
    ///
    /// # Errors
    /// Returns `NoValidData` when every sample is missing.
    pub fn clear_aperture(&self) -> Result<Self> {
        let (rows, cols) = self
            .z
            .finite_bounds()
            .ok_or(monolithic_core::Error::NoValidData("surface map"))?;
        Ok(Self {
            x: self.x.subgrid(rows.clone(), cols.clone())?,
            y: self.y.subgrid(rows.clone(), cols.clone())?,
            z: self.z.subgrid(rows, cols)?,
        })
    }

    /// Median spacing between neighbouring x samples along the rows.
    pub fn median_pixel_size(&self) -> Option<f64> {
        let mut steps: Vec<f64> = (0..self.x.rows())
            .filter_map(|r| self.x.row(r))
            .flat_map(|row| row.windows(2).map(|w| (w[1] - w[0]).abs()))
            .filter(|d| d.is_finite() && *d > 0.0)
            .collect();
        if steps.is_empty() {
            return None;
        }
        steps.sort_by(f64::total_cmp);
        let mid = steps.len() / 2;
        Some(if steps.len() % 2 == 0 {
            (steps[mid - 1] + steps[mid]) * 0.5
        } else {
            steps[mid]
        })
    }

    /// Replace the heights, keeping the coordinates.
    #[must_use]
    pub fn with_heights(&self, z: Grid) -> Self {
        Self {
            x: self.x.clone(),
            y: self.y.clone(),
            z,
        }
    }
}

/// Full-frame and clear-aperture views of one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceData {
    pub full: SurfaceMap,
    pub clear_aperture: SurfaceMap,
}

impl SurfaceData {
    /// Pair a full-frame map with its clear aperture.
    pub fn from_full(full: SurfaceMap) -> Result<Self> {
        let clear_aperture = full.clear_aperture()?;
        log::debug!(
            "clear aperture {}x{} within {}x{} frame",
            clear_aperture.shape().0,
            clear_aperture.shape().1,
            full.shape().0,
            full.shape().1
        );
        Ok(Self {
            full,
            clear_aperture,
        })
    }

    pub fn from_dat(file: &DatFile) -> Result<Self> {
        Self::from_full(SurfaceMap::from_dat(file))
    }

    pub fn from_datx(file: &DatxFile) -> Result<Self> {
        Self::from_full(SurfaceMap::from_datx(file))
    }
}

/// Whether `path` names an HDF5 `.datx` file.
pub fn is_datx(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("datx"))
}

/// Read a Zygo `.dat` or `.datx` file into full-frame and clear-aperture
/// surface maps.
pub fn read_zygo_binary(path: impl AsRef<Path>) -> Result<SurfaceData> {
    let path = path.as_ref();
    if is_datx(path) {
        SurfaceData::from_datx(&read_zygo_datx(path)?)
    } else {
        SurfaceData::from_dat(&read_zygo_dat(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datx::SurfaceScale;
    use crate::zygo::{DatHeader, MetaValue};
    use crate::Error;
    use std::collections::BTreeMap;

    fn padded() -> Grid {
        Grid::from_fn(6, 7, |r, c| {
            if (1..4).contains(&r) && (2..6).contains(&c) {
                (r * 10 + c) as f64 * 1e-9
            } else {
                f64::NAN
            }
        })
    }

    #[test]
    fn test_regular_coordinates() {
        let map = SurfaceMap::regular(Grid::filled(2, 3, 0.0), 1e-5);
        assert!((map.x.get(1, 2).unwrap() - 2e-5).abs() < 1e-18);
        assert!((map.y.get(1, 2).unwrap() - 1e-5).abs() < 1e-18);
        assert!((map.median_pixel_size().unwrap() - 1e-5).abs() < 1e-18);
    }

    #[test]
    fn test_clear_aperture_crops_to_valid_region() {
        let map = SurfaceMap::regular(padded(), 1.0);
        let ca = map.clear_aperture().unwrap();
        assert_eq!(ca.shape(), (3, 4));
        assert_eq!(ca.x.shape(), ca.z.shape());
        assert!((ca.x.get(0, 0).unwrap() - 2.0).abs() < f64::EPSILON);
        assert!((ca.y.get(0, 0).unwrap() - 1.0).abs() < f64::EPSILON);
        assert_eq!(ca.z.count_finite(), 12);
    }

    #[test]
    fn test_clear_aperture_of_empty_map() {
        let map = SurfaceMap::regular(Grid::filled(3, 3, f64::NAN), 1.0);
        assert!(matches!(
            map.clear_aperture(),
            Err(Error::Core(monolithic_core::Error::NoValidData(_)))
        ));
    }

    #[test]
    fn test_is_datx() {
        assert!(is_datx(Path::new("scan.datx")));
        assert!(is_datx(Path::new("dir/SCAN.DATX")));
        assert!(!is_datx(Path::new("scan.dat")));
    }

    #[test]
    fn test_from_datx_uses_reported_resolution() {
        let mut meta = BTreeMap::new();
        meta.insert(String::from("Resolution:Value"), MetaValue::Float(4.0));
        meta.insert(
            String::from("Resolution:Unit"),
            MetaValue::Text(String::from("MicroMeters")),
        );
        let scale = SurfaceScale {
            no_data: 1e38,
            wavelength: 1e-6,
            scale_factor: 1.0,
            obliquity: 1.0,
        };
        let raw = Grid::from_fn(6, 7, |r, c| if r == 0 { 1e38 } else { (r + c) as f64 });
        let file = DatxFile::from_raw(&raw, scale, None, meta);
        let data = SurfaceData::from_datx(&file).unwrap();
        assert_eq!(data.full.shape(), (6, 7));
        assert_eq!(data.clear_aperture.shape(), (5, 7));
        assert!((data.full.median_pixel_size().unwrap() - 4e-6).abs() < 1e-18);
    }

    #[cfg(not(feature = "datx"))]
    #[test]
    fn test_read_datx_without_hdf5_support() {
        assert!(matches!(
            read_zygo_binary("scan.datx"),
            Err(Error::FeatureDisabled { .. })
        ));
    }

    #[test]
    fn test_from_dat_without_resolution_uses_pixels() {
        let file = DatFile::from_phase(DatHeader::for_phase(0, 0, 0.0), padded()).unwrap();
        let data = SurfaceData::from_dat(&file).unwrap();
        assert_eq!(data.full.shape(), (6, 7));
        assert_eq!(data.clear_aperture.shape(), (3, 4));
        assert!((data.full.median_pixel_size().unwrap() - 1.0).abs() < f64::EPSILON);
    }
}
