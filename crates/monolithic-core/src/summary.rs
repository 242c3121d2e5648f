//! Human-readable surface summaries in display units.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::Grid;
use crate::statistics::SurfaceStats;

/// Scale factors and labels for presenting SI data.
///
/// Coordinates and heights are multiplied by `coord_scale` and
/// `height_scale` respectively (metres to millimetres and nanometres by
/// default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayUnits {
    pub coord_scale: f64,
    pub coord_label: String,
    pub height_scale: f64,
    pub height_label: String,
}

impl Default for DisplayUnits {
    fn default() -> Self {
        Self {
            coord_scale: 1e3,
            coord_label: String::from("mm"),
            height_scale: 1e9,
            height_label: String::from("nm"),
        }
    }
}

/// PV/RMS and extent of a surface, in display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSummary {
    pub title: String,
    pub stats: SurfaceStats,
    /// `(width, height)` of the coordinate extent.
    pub extent: (f64, f64),
    pub units: DisplayUnits,
}

impl SurfaceSummary {
    pub fn new(title: impl Into<String>, x: &Grid, y: &Grid, z: &Grid, units: DisplayUnits) -> Result<Self> {
        let stats = SurfaceStats::compute(z.as_slice())?.scaled(units.height_scale);
        let extent = (
            span(x.as_slice()) * units.coord_scale,
            span(y.as_slice()) * units.coord_scale,
        );
        Ok(Self {
            title: title.into(),
            stats,
            extent,
            units,
        })
    }
}

fn span(values: &[f64]) -> f64 {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if hi >= lo {
        hi - lo
    } else {
        0.0
    }
}

impl fmt::Display for SurfaceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = &self.units.height_label;
        write!(
            f,
            "{}: PV = {:.2} {unit}, RMS = {:.2} {unit}",
            self.title, self.stats.pv, self.stats.rms
        )
    }
}
