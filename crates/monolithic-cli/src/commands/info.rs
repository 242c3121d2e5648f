use anyhow::{Context, Result};
use monolithic_io::{is_datx, read_zygo_dat, read_zygo_datx, DatFile, DatxFile, MetaValue};
use std::path::Path;

/// Print the header of a MetroPro file, or the attributes of a `.datx` file.
pub fn show_info(path: &Path, json: bool) -> Result<()> {
    if is_datx(path) {
        let file =
            read_zygo_datx(path).with_context(|| format!("Failed to read {}", path.display()))?;
        if json {
            println!("{}", serde_json::to_string_pretty(&datx_json(&file))?);
        } else {
            print!("{}", datx_text(path, &file));
        }
        return Ok(());
    }

    let file = read_zygo_dat(path).with_context(|| format!("Failed to read {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info_json(&file))?);
    } else {
        print!("{}", info_text(path, &file));
    }

    Ok(())
}

fn info_json(file: &DatFile) -> serde_json::Value {
    serde_json::json!({
        "header": file.header,
        "meta": file.meta(),
        "acquired_at": file.header.acquired_at().map(|t| t.to_rfc3339()),
        "has_intensity": file.intensity.is_some(),
    })
}

fn datx_json(file: &DatxFile) -> serde_json::Value {
    serde_json::json!({
        "meta": file.meta,
        "shape": file.phase.shape(),
        "has_intensity": file.intensity.is_some(),
    })
}

fn datx_text(path: &Path, file: &DatxFile) -> String {
    let (rows, cols) = file.phase.shape();
    let mut lines = vec![
        format!("File: {}", path.display()),
        format!("Phase: {cols}x{rows}"),
        format!(
            "Intensity: {}",
            if file.intensity.is_some() { "present" } else { "none" }
        ),
    ];
    for (key, value) in &file.meta {
        let value = match value {
            MetaValue::Int(v) => v.to_string(),
            MetaValue::Float(v) => v.to_string(),
            MetaValue::Text(v) => v.clone(),
        };
        lines.push(format!("{key}: {value}"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn info_text(path: &Path, file: &DatFile) -> String {
    let h = &file.header;
    let (major, minor, bug) = h.software_version;
    let mut lines = vec![
        format!("File: {}", path.display()),
        format!("Format: {} ({} byte header)", h.format, h.header_size),
        format!("Software: {major}.{minor}.{bug} {}", h.software_date.trim()),
    ];
    if let Some(t) = h.acquired_at() {
        lines.push(format!("Acquired: {}", t.to_rfc3339()));
    }
    if !h.comment.is_empty() {
        lines.push(format!("Comment: {}", h.comment));
    }
    lines.push(format!(
        "Phase: {}x{} at ({}, {})",
        h.phase.width, h.phase.height, h.phase.origin.0, h.phase.origin.1
    ));
    lines.push(match &file.intensity {
        Some(buckets) => format!(
            "Intensity: {} bucket(s) of {}x{}",
            buckets.len(),
            h.intensity.width,
            h.intensity.height
        ),
        None => String::from("Intensity: none"),
    });
    lines.push(format!("Wavelength: {:.1} nm", f64::from(h.wavelength) * 1e9));
    lines.push(match file.lateral_resolution() {
        Some(res) => format!("Lateral resolution: {:.3} um", res * 1e6),
        None => String::from("Lateral resolution: unknown"),
    });
    lines.push(format!("Phase resolution: {:?}", h.phase_resolution));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use monolithic_core::Grid;
    use monolithic_io::DatHeader;

    fn sample() -> DatFile {
        let mut header = DatHeader::for_phase(0, 0, 1e-5);
        header.comment = String::from("bench flat");
        DatFile::from_phase(header, Grid::filled(3, 4, 1e-9)).unwrap()
    }

    #[test]
    fn test_info_text() {
        let text = info_text(Path::new("flat.dat"), &sample());
        assert!(text.contains("File: flat.dat"));
        assert!(text.contains("Comment: bench flat"));
        assert!(text.contains("Phase: 4x3"));
        assert!(text.contains("Intensity: none"));
        assert!(text.contains("Wavelength: 632.8 nm"));
    }

    #[test]
    fn test_datx_text() {
        let mut meta = std::collections::BTreeMap::new();
        meta.insert(String::from("lateral_res"), MetaValue::Float(2e-6));
        meta.insert(String::from("Resolution:Unit"), MetaValue::Text(String::from("MicroMeters")));
        let file = DatxFile {
            meta,
            intensity: None,
            phase: Grid::filled(2, 5, 0.0),
        };
        let text = datx_text(Path::new("scan.datx"), &file);
        assert!(text.contains("Phase: 5x2"));
        assert!(text.contains("Resolution:Unit: MicroMeters"));
        assert!(text.contains("lateral_res: 0.000002"));
        assert_eq!(datx_json(&file)["shape"][1], 5);
    }

    #[test]
    fn test_info_json() {
        let value = info_json(&sample());
        assert_eq!(value["header"]["comment"], "bench flat");
        assert_eq!(value["has_intensity"], false);
        assert!(value["meta"].get("lateral_res").is_some());
    }
}
