use anyhow::{Context, Result};
use monolithic_core::{psd_1d, psd_2d, Axis, WindowKind};
use std::io::Write;
use std::path::Path;

use super::surface::{apply_removal, load_surface, RemovalArgs};

#[derive(Debug, Clone)]
pub struct PsdOptions {
    pub axis: Axis,
    pub window: WindowKind,
    /// Radially averaged 2-D PSD instead of averaged line profiles.
    pub radial: bool,
    pub full: bool,
}

/// Compute the PSD of a surface and write it as CSV to `output` or stdout.
pub fn run_psd(
    path: &Path,
    removal: &RemovalArgs,
    options: &PsdOptions,
    output: Option<&Path>,
) -> Result<()> {
    let map = apply_removal(load_surface(path, options.full)?, removal)?;
    let pixel = map
        .median_pixel_size()
        .context("Surface is too small to determine a pixel size")?;
    log::debug!("PSD pixel size {pixel:e} m, window {}", options.window);

    match output {
        Some(out) => {
            let file = std::fs::File::create(out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
            write_psd(&map.z, pixel, options, file)?;
            println!("✓ Wrote PSD to {}", out.display());
        }
        None => write_psd(&map.z, pixel, options, std::io::stdout().lock())?,
    }

    Ok(())
}

fn write_psd<W: Write>(
    z: &monolithic_core::Grid,
    pixel: f64,
    options: &PsdOptions,
    writer: W,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if options.radial {
        let psd = psd_2d(z, pixel, options.window)
            .context("Radial PSD needs a surface without missing samples")?;
        csv.write_record(["q", "c"])?;
        for (q, c) in psd.q.iter().zip(&psd.c) {
            csv.write_record([q.to_string(), c.to_string()])?;
        }
    } else {
        let psd = psd_1d(z, pixel, options.axis, options.window)?;
        log::info!("Averaged {} profile(s), RMS {:e} m", psd.profiles, psd.rms());
        csv.write_record(["q", "c", "int_c"])?;
        for ((q, c), int_c) in psd.q.iter().zip(&psd.c).zip(&psd.int_c) {
            csv.write_record([q.to_string(), c.to_string(), int_c.to_string()])?;
        }
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use monolithic_core::Grid;

    fn ripple() -> Grid {
        Grid::from_fn(16, 16, |_, c| 1e-9 * (2.0 * std::f64::consts::PI * c as f64 / 4.0).sin())
    }

    fn options(radial: bool) -> PsdOptions {
        PsdOptions {
            axis: Axis::X,
            window: WindowKind::Hann,
            radial,
            full: false,
        }
    }

    #[test]
    fn test_write_psd_1d_csv() {
        let mut buf = Vec::new();
        write_psd(&ripple(), 1e-5, &options(false), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("q,c,int_c"));
        assert_eq!(lines.count(), 9);
    }

    #[test]
    fn test_write_psd_radial_csv() {
        let mut buf = Vec::new();
        write_psd(&ripple(), 1e-5, &options(true), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("q,c\n"));
    }

    #[test]
    fn test_radial_rejects_missing_samples() {
        let mut z = ripple();
        *z.get_mut(3, 3).unwrap() = f64::NAN;
        let mut buf = Vec::new();
        assert!(write_psd(&z, 1e-5, &options(true), &mut buf).is_err());
    }
}
