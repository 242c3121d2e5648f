use anyhow::{Context, Result};
use monolithic_io::SurfaceMap;
use std::io::Write;
use std::path::Path;

use super::surface::{apply_removal, load_surface, RemovalArgs};

/// Write the valid samples of a surface as `x,y,z` CSV rows, in metres.
pub fn run_export(path: &Path, output: &Path, removal: &RemovalArgs, full: bool) -> Result<()> {
    let map = apply_removal(load_surface(path, full)?, removal)?;
    let file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let written = write_points(&map, file)?;

    println!("✓ Exported {written} point(s) to {}", output.display());
    Ok(())
}

fn write_points<W: Write>(map: &SurfaceMap, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["x", "y", "z"])?;
    let mut written = 0;
    for ((x, y), z) in map.x.iter().zip(map.y.iter()).zip(map.z.iter()) {
        if !z.is_finite() {
            continue;
        }
        csv.write_record([x.to_string(), y.to_string(), z.to_string()])?;
        written += 1;
    }
    csv.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monolithic_core::Grid;

    #[test]
    fn test_write_points_skips_missing() {
        let z = Grid::from_rows(vec![vec![1.0, f64::NAN], vec![2.0, 3.0]]).unwrap();
        let map = SurfaceMap::regular(z, 0.5);
        let mut buf = Vec::new();
        assert_eq!(write_points(&map, &mut buf).unwrap(), 3);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["x,y,z", "0,0,1", "0,0.5,2", "0.5,0.5,3"]);
    }
}
