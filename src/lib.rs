pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use adapters::{BigQueryClient, LocalStorage};
pub use config::{PathsConfig, TomlConfig, WarehouseConfig};
pub use crate::core::{
    etl::{EtlEngine, RetryPolicy, StageName},
    pipeline::TaxiPipeline,
};
pub use utils::error::{EtlError, Result};
