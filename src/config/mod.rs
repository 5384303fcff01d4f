#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;
pub mod warehouse;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};
pub use toml_config::{PathsConfig, TomlConfig};
pub use warehouse::{Credentials, WarehouseConfig, WarehouseSettings};
