use anyhow::Result;
use clap::Parser;
use monolithic_core::{Axis, WindowKind};
use std::path::PathBuf;

mod commands;
mod config;

use commands::psd::PsdOptions;
use commands::RemovalArgs;
use config::Config;

#[derive(Debug, Parser)]
#[command(name = "monolithic", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file (default: ~/.config/monolithic/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Show the header of a Zygo .dat file or the attributes of a .datx file
    Info {
        /// Path to the .dat or .datx file
        file: PathBuf,

        /// Print the header and metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report PV and RMS of one file or every .dat/.datx file below a directory
    ///
    /// Each file is read, cropped to its clear aperture (unless --full is
    /// given) and optionally has its form removed before the statistics
    /// are computed. Heights are reported in the configured display units.
    Stats {
        /// A .dat/.datx file or a directory to search
        path: PathBuf,

        #[command(flatten)]
        removal: RemovalArgs,

        /// Analyse the full camera frame instead of the clear aperture
        #[arg(long)]
        full: bool,

        /// Print the summaries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute the power spectral density of a surface as CSV
    ///
    /// By default the PSD of every complete line profile along --axis is
    /// averaged; the columns are spatial frequency q (1/m), PSD c (m^3) and
    /// the cumulative RMS int_c (m). With --radial the radially averaged
    /// 2-D PSD is written instead (columns q, c).
    Psd {
        /// Path to the .dat or .datx file
        file: PathBuf,

        /// Profile direction (x or y) [default: from config]
        #[arg(long)]
        axis: Option<Axis>,

        /// Window function (none, hann or welch) [default: from config]
        #[arg(long)]
        window: Option<WindowKind>,

        /// Radially averaged 2-D PSD
        #[arg(long)]
        radial: bool,

        #[command(flatten)]
        removal: RemovalArgs,

        /// Analyse the full camera frame instead of the clear aperture
        #[arg(long)]
        full: bool,

        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Export the valid samples of a surface as x,y,z CSV in metres
    Export {
        /// Path to the .dat or .datx file
        file: PathBuf,

        /// Output CSV file
        #[arg(long, short)]
        output: PathBuf,

        #[command(flatten)]
        removal: RemovalArgs,

        /// Export the full camera frame instead of the clear aperture
        #[arg(long)]
        full: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show current effective configuration
    Show,
    /// Get a config value (or the whole file when no key is given)
    Get {
        /// Config key, e.g. units.height_label
        key: Option<String>,
    },
    /// Set a config value
    Set {
        /// Config key, e.g. psd.window
        key: String,
        /// New value
        value: String,
    },
    /// Show config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(config::config_file_path);
    let config = Config::load_from(&config_path)?;

    if let Err(e) = twyg::setup(config.logging.clone()) {
        anyhow::bail!("Failed to set up logging: {e:?}");
    }
    log::debug!("Loaded config from {}", config_path.display());

    let Some(command) = cli.command else {
        commands::show_banner();
        return Ok(());
    };

    match command {
        Commands::Info { file, json } => {
            commands::show_info(&file, json)?;
        }
        Commands::Stats {
            path,
            removal,
            full,
            json,
        } => {
            commands::run_stats(&path, &removal, full, json, &config.units)?;
        }
        Commands::Psd {
            file,
            axis,
            window,
            radial,
            removal,
            full,
            output,
        } => {
            let options = PsdOptions {
                axis: axis.unwrap_or(config.psd.axis),
                window: window.unwrap_or(config.psd.window),
                radial,
                full,
            };
            commands::run_psd(&file, &removal, &options, output.as_deref())?;
        }
        Commands::Export {
            file,
            output,
            removal,
            full,
        } => {
            commands::run_export(&file, &output, &removal, full)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config_path)?,
            ConfigAction::Get { key } => commands::config::get_config(&config_path, key.as_deref())?,
            ConfigAction::Set { key, value } => {
                commands::config::set_config(&config_path, &key, &value)?;
            }
            ConfigAction::Path => commands::config::show_path(&config_path),
            ConfigAction::Example => commands::config::show_example(),
            ConfigAction::Init => commands::config::init_config(&config_path)?,
        },
    }

    Ok(())
}
