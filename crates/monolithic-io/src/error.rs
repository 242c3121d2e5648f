use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Core(#[from] monolithic_core::Error),

    #[error("not a MetroPro file: bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("file truncated: {section} needs {needed} bytes, {available} available")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("reading {} needs the `{feature}` feature", .path.display())]
    FeatureDisabled { path: PathBuf, feature: &'static str },

    #[cfg(feature = "datx")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
