pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::{FileRowSource, LocalStorage, SourceFormat};
pub use config::DashboardConfig;
pub use core::{etl::DashboardEngine, pipeline::DashboardPipeline};
pub use utils::error::{OkrError, Result};
