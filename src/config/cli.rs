use crate::config::toml_config::TomlConfig;
use crate::core::etl::StageName;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "taxi-etl")]
#[command(about = "Extract, clean and load the NYC taxi sample into BigQuery")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override paths.data_dir
    #[arg(long)]
    pub data_dir: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage after each stage")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Normalize the raw CSV headers into the staging file
    Extract,
    /// Parse timestamps, derive trip duration and filter invalid rows
    Transform,
    /// Replace the warehouse table with the processed file
    Load,
    /// Run extract, transform and load once, in order
    Run {
        /// Show what would be processed without executing
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the pipeline every day at schedule.daily_at (UTC)
    Schedule,
}

impl Command {
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Command::Extract => Some(StageName::Extract),
            Command::Transform => Some(StageName::Transform),
            Command::Load => Some(StageName::Load),
            Command::Run { .. } | Command::Schedule => None,
        }
    }

    /// 只有 extract / transform 不需要倉儲設定
    pub fn needs_warehouse(&self) -> bool {
        !matches!(self, Command::Extract | Command::Transform)
    }
}

impl CliConfig {
    /// File config (or defaults) with command-line overrides applied.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.paths.data_dir = data_dir.clone();
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = CliConfig::parse_from([
            "taxi-etl",
            "--data-dir",
            "/tmp/taxi",
            "--monitor",
            "run",
            "--dry-run",
        ]);
        assert!(matches!(cli.command, Command::Run { dry_run: true }));

        let config = cli.resolve().unwrap();
        assert_eq!(config.paths.data_dir, "/tmp/taxi");
        assert!(config.monitoring.enabled);
    }

    #[test]
    fn test_stage_commands() {
        let cli = CliConfig::parse_from(["taxi-etl", "transform"]);
        assert_eq!(cli.command.stage(), Some(StageName::Transform));
        assert!(!cli.command.needs_warehouse());

        let cli = CliConfig::parse_from(["taxi-etl", "load"]);
        assert!(cli.command.needs_warehouse());

        let cli = CliConfig::parse_from(["taxi-etl", "schedule"]);
        assert_eq!(cli.command.stage(), None);
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let cli = CliConfig::parse_from(["taxi-etl", "--config", "/nonexistent/etl.toml", "run"]);
        assert!(matches!(
            cli.resolve(),
            Err(crate::utils::error::EtlError::IoError { .. })
        ));
    }
}
