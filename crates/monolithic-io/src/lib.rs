//! Instrument data I/O for monolithic.
//!
//! Reads Zygo MetroPro binary `.dat` files and HDF5 `.datx` files into
//! height maps with coordinate grids, and crops them to their clear
//! aperture. `.datx` support is behind the `datx` feature.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod datx;
pub mod error;
pub mod surface;
pub mod zygo;

pub use datx::{read_zygo_datx, DatxFile};
pub use error::{Error, Result};
pub use surface::{is_datx, read_zygo_binary, SurfaceData, SurfaceMap};
pub use zygo::{read_zygo_dat, write_zygo_dat, DatFile, DatHeader, MetaValue, PhaseResolution};
