//! Loading and form removal shared by the analysis commands.

use anyhow::{Context, Result};
use monolithic_core::{remove_polynomials, remove_sphere, remove_surface};
use monolithic_io::{read_zygo_binary, SurfaceMap};
use std::path::Path;

/// Form to remove before analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Removal {
    /// Keep the data as measured
    #[default]
    None,
    /// Piston and tilt
    Plane,
    /// Piston, tilt and power
    Sphere,
    /// All polynomial terms up to --order
    Poly,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RemovalArgs {
    /// Form to remove before analysis
    #[arg(long, value_enum, default_value_t = Removal::None)]
    pub remove: Removal,

    /// Polynomial order for --remove poly
    #[arg(long, default_value_t = 2)]
    pub order: usize,
}

/// Read a surface, optionally keeping the full camera frame instead of
/// cropping to the clear aperture.
pub fn load_surface(path: &Path, full: bool) -> Result<SurfaceMap> {
    let data = read_zygo_binary(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(if full { data.full } else { data.clear_aperture })
}

/// Apply the requested removal and return the residual map.
pub fn apply_removal(map: SurfaceMap, args: &RemovalArgs) -> Result<SurfaceMap> {
    let residual = match args.remove {
        Removal::None => return Ok(map),
        Removal::Plane => remove_surface(&map.x, &map.y, &map.z)?.residual,
        Removal::Poly => {
            let fit = remove_polynomials(&map.x, &map.y, &map.z, args.order)?;
            log::info!(
                "Removed order {} polynomial ({} terms)",
                fit.model.order(),
                fit.model.terms().len()
            );
            fit.residual
        }
        Removal::Sphere => {
            let fit = remove_sphere(&map.x, &map.y, &map.z)?;
            log::debug!("Sphere power coefficient {:?}", fit.model.power());
            match fit.radius {
                Some(radius) => log::info!("Removed sphere with radius of curvature {:.4} m", radius),
                None => log::info!("Removed sphere: surface has no power"),
            }
            fit.residual
        }
    };
    Ok(map.with_heights(residual))
}

/// Title used in summaries for a given removal.
pub fn title(removal: &RemovalArgs) -> String {
    match removal.remove {
        Removal::None => String::from("Surface"),
        Removal::Plane => String::from("Surface - plane"),
        Removal::Sphere => String::from("Surface - sphere"),
        Removal::Poly => format!("Surface - order {} polynomial", removal.order),
    }
}
