use anyhow::{Context, Result};
use std::path::Path;
use toml_edit::{value, DocumentMut, Item, Table};

use crate::config::{self, Config, KEYS};

/// Show the current effective configuration.
pub fn show_config(config_path: &Path) -> Result<()> {
    let config = Config::load_from(config_path)?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config_path.display());
    let exists = config_path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    for key in KEYS {
        if let Some(v) = lookup(&config, key) {
            println!("  {key}: {v}");
        }
    }
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());

    println!("\nPriority: CLI args > ENV vars (MONO_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value, or print the whole file when no key is given.
pub fn get_config(config_path: &Path, key: Option<&str>) -> Result<()> {
    if let Some(key) = key {
        let config = Config::load_from(config_path)?;
        match lookup(&config, key) {
            Some(v) => println!("{v}"),
            None => anyhow::bail!("Unknown config key: {}\n\nValid keys: {}", key, KEYS.join(", ")),
        }
    } else if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).context("Failed to read config file")?;
        print!("{contents}");
    } else {
        println!("Config file does not exist: {}", config_path.display());
        println!("\nRun 'monolithic config init' to create it.");
    }

    Ok(())
}

/// Set a config value, keeping the rest of the file intact.
pub fn set_config(config_path: &Path, key: &str, raw: &str) -> Result<()> {
    config::ensure_config_file(config_path)?;
    let contents = std::fs::read_to_string(config_path).context("Failed to read config file")?;

    let updated = update_document(&contents, key, raw)?;
    // reject values the loader would not accept
    toml::from_str::<Config>(&updated).with_context(|| format!("Invalid value for {key}: {raw}"))?;

    std::fs::write(config_path, updated).context("Failed to write config file")?;

    println!("✓ Updated {key} = {raw}");
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path(config_path: &Path) {
    println!("{}", config_path.display());
}

/// Show example configuration.
pub fn show_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config(config_path: &Path) -> Result<()> {
    if config::ensure_config_file(config_path)? {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure monolithic.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}

fn lookup(config: &Config, key: &str) -> Option<String> {
    let units = &config.units;
    Some(match key {
        "units.coord_scale" => units.coord_scale.to_string(),
        "units.coord_label" => units.coord_label.clone(),
        "units.height_scale" => units.height_scale.to_string(),
        "units.height_label" => units.height_label.clone(),
        "psd.window" => config.psd.window.to_string(),
        "psd.axis" => format!("{:?}", config.psd.axis).to_lowercase(),
        _ => return None,
    })
}

fn update_document(contents: &str, key: &str, raw: &str) -> Result<String> {
    if !KEYS.contains(&key) {
        anyhow::bail!("Unknown config key: {}\n\nValid keys: {}", key, KEYS.join(", "));
    }
    let (section, field) = key
        .split_once('.')
        .with_context(|| format!("Malformed key: {key}"))?;

    let mut doc: DocumentMut = contents.parse().context("Failed to parse config file")?;
    let table = doc
        .entry(section)
        .or_insert_with(|| Item::Table(Table::new()))
        .as_table_mut()
        .with_context(|| format!("[{section}] is not a table"))?;

    table[field] = match field {
        "coord_scale" | "height_scale" => {
            let number: f64 = raw
                .parse()
                .with_context(|| format!("{key} must be a number, got '{raw}'"))?;
            value(number)
        }
        "window" | "axis" => value(raw.to_lowercase()),
        _ => value(raw),
    };

    Ok(doc.to_string())
}
