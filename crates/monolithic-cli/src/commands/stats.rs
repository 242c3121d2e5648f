use anyhow::Result;
use monolithic_core::{DisplayUnits, SurfaceSummary};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::surface::{apply_removal, load_surface, title, RemovalArgs};

/// Summarise one file, or every `.dat` file below a directory.
pub fn run_stats(
    path: &Path,
    removal: &RemovalArgs,
    full: bool,
    json: bool,
    units: &DisplayUnits,
) -> Result<()> {
    let files = discover(path);
    if files.is_empty() {
        anyhow::bail!("No .dat or .datx files found in {}", path.display());
    }

    let mut summaries = Vec::new();
    let mut failed = 0;
    for file in &files {
        match summarise(file, removal, full, units) {
            Ok(summary) => summaries.push((file.clone(), summary)),
            Err(e) if files.len() > 1 => {
                log::warn!("Skipping {}: {:#}", file.display(), e);
                failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if json {
        let entries: Vec<serde_json::Value> = summaries
            .iter()
            .map(|(file, summary)| serde_json::json!({ "file": file, "summary": summary }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (file, summary) in &summaries {
            println!("{}", file.display());
            println!("  {summary}");
            println!(
                "  {} of {} samples valid ({:.1}%), {:.3} x {:.3} {}",
                summary.stats.valid,
                summary.stats.total,
                summary.stats.fill_factor() * 100.0,
                summary.extent.0,
                summary.extent.1,
                summary.units.coord_label
            );
        }
        if files.len() > 1 {
            println!("\n✓ {} file(s) analysed, {} skipped", summaries.len(), failed);
        }
    }

    Ok(())
}

fn summarise(
    path: &Path,
    removal: &RemovalArgs,
    full: bool,
    units: &DisplayUnits,
) -> Result<SurfaceSummary> {
    let map = apply_removal(load_surface(path, full)?, removal)?;
    Ok(SurfaceSummary::new(title(removal), &map.x, &map.y, &map.z, units.clone())?)
}

/// A file path is returned as is; directories are walked for `.dat` and
/// `.datx` files.
fn discover(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dat") || ext.eq_ignore_ascii_case("datx"))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::surface::Removal;
    use monolithic_core::Grid;
    use monolithic_io::zygo::write_zygo_dat;
    use monolithic_io::{DatFile, DatHeader};
    use tempfile::TempDir;

    fn write_flat(path: &Path) {
        let z = Grid::from_fn(8, 8, |r, c| 1e-9 * (r as f64 - c as f64));
        let file = DatFile::from_phase(DatHeader::for_phase(0, 0, 1e-4), z).unwrap();
        write_zygo_dat(path, &file).unwrap();
    }

    #[test]
    fn test_discover_walks_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        write_flat(&dir.path().join("a.dat"));
        write_flat(&dir.path().join("sub").join("b.DAT"));
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("scan.datx"), "x").unwrap();

        let files = discover(dir.path());
        assert_eq!(files.len(), 3);
        assert_eq!(discover(&dir.path().join("a.dat")).len(), 1);
    }

    #[test]
    fn test_summarise_with_plane_removal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flat.dat");
        write_flat(&path);

        let none = RemovalArgs { remove: Removal::None, order: 2 };
        let summary = summarise(&path, &none, false, &DisplayUnits::default()).unwrap();
        assert!(summary.stats.pv > 10.0);

        let plane = RemovalArgs { remove: Removal::Plane, order: 2 };
        let summary = summarise(&path, &plane, false, &DisplayUnits::default()).unwrap();
        assert!(summary.stats.pv < 0.1);
        assert!(summary.title.contains("plane"));
    }

    #[test]
    fn test_run_stats_on_empty_directory() {
        let dir = TempDir::new().unwrap();
        let args = RemovalArgs { remove: Removal::None, order: 2 };
        assert!(run_stats(dir.path(), &args, false, false, &DisplayUnits::default()).is_err());
    }
}
