use anyhow::{Context, Result};
use confyg::{env, Confygery};
use monolithic_core::{Axis, DisplayUnits, WindowKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for monolithic.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (MONO_* prefix)
/// 3. Config file (~/.config/monolithic/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logger settings, passed to twyg as is.
    #[serde(default)]
    pub logging: twyg::Opts,

    /// Display units for reports.
    ///
    /// Can be set via:
    /// - ENV: MONO_UNITS_HEIGHT_SCALE, MONO_UNITS_HEIGHT_LABEL, ...
    /// - Config: [units] height_scale = 1e9
    #[serde(default)]
    pub units: DisplayUnits,

    /// Defaults for the `psd` command.
    #[serde(default)]
    pub psd: PsdConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsdConfig {
    pub window: WindowKind,
    pub axis: Axis,
}

impl Config {
    /// Load configuration from `config_path` (if it exists) and
    /// environment variables with the MONO_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("mono");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        Ok(config)
    }
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/monolithic/config.toml
/// - macOS: ~/Library/Application Support/monolithic/config.toml
/// - Windows: %APPDATA%\monolithic\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("monolithic")
        .join("config.toml")
}

/// Keys accepted by `config get` and `config set`.
pub const KEYS: &[&str] = &[
    "units.coord_scale",
    "units.coord_label",
    "units.height_scale",
    "units.height_label",
    "psd.window",
    "psd.axis",
];

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Monolithic Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (MONO_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Display units. Data is stored in metres; reports multiply coordinates
# by coord_scale and heights by height_scale.
[units]
coord_scale = 1000.0
coord_label = "mm"
height_scale = 1000000000.0
height_label = "nm"

# Defaults for `monolithic psd`
#
# window: none, hann or welch
# axis: x (row profiles) or y (column profiles)
[psd]
window = "welch"
axis = "x"

# Logging (twyg)
#[logging]
#coloured = true
#level = "info"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
