pub mod banner;
pub mod config;
pub mod export;
pub mod info;
pub mod psd;
pub mod stats;
pub mod surface;

pub use banner::show_banner;
pub use export::run_export;
pub use info::show_info;
pub use psd::run_psd;
pub use stats::run_stats;
pub use surface::RemovalArgs;
