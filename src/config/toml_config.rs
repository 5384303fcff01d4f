use crate::config::warehouse::{WarehouseConfig, WarehouseSettings};
use crate::core::etl::RetryPolicy;
use crate::core::schedule::DailySchedule;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_path, validate_range, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub paths: PathsConfig,
    pub warehouse: WarehouseSettings,
    pub schedule: ScheduleConfig,
    pub monitoring: MonitoringConfig,
}

/// Artifact locations. `raw`, `staging` and `processed` are relative to
/// `data_dir` unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: String,
    pub raw: String,
    pub staging: String,
    pub processed: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            raw: "raw/nyc_taxi_sample.csv".to_string(),
            staging: "staging/nyc_taxi_clean.csv".to_string(),
            processed: "processed/nyc_taxi_ready.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub retries: u32,
    pub retry_delay_seconds: u64,
    pub daily_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            retries: 1,
            retry_delay_seconds: 120,
            daily_at: "00:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EtlError::io(path.display().to_string(), e))?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GCP_PROJECT_ID})，找不到的保留原字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.schedule.retries,
            delay: Duration::from_secs(self.schedule.retry_delay_seconds),
        }
    }

    pub fn daily_schedule(&self) -> Result<DailySchedule> {
        DailySchedule::parse(&self.schedule.daily_at).ok_or_else(|| {
            EtlError::InvalidConfigValueError {
                field: "schedule.daily_at".to_string(),
                value: self.schedule.daily_at.clone(),
                reason: "Expected HH:MM or HH:MM:SS".to_string(),
            }
        })
    }

    /// Warehouse settings from the file, overridden by the environment.
    pub fn warehouse_config(&self) -> Result<WarehouseConfig> {
        let settings = self
            .warehouse
            .clone()
            .with_env_overrides(|key| std::env::var(key).ok());
        WarehouseConfig::from_settings(settings)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_path("paths.data_dir", &self.paths.data_dir)?;
        validate_path("paths.raw", &self.paths.raw)?;
        validate_path("paths.staging", &self.paths.staging)?;
        validate_path("paths.processed", &self.paths.processed)?;

        if self.paths.raw == self.paths.staging
            || self.paths.staging == self.paths.processed
            || self.paths.raw == self.paths.processed
        {
            return Err(EtlError::ConfigError {
                message: "raw, staging and processed paths must all differ".to_string(),
            });
        }

        validate_range("schedule.retries", self.schedule.retries, 0, 10)?;
        self.daily_schedule()?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.paths, PathsConfig::default());
        assert_eq!(config.schedule, ScheduleConfig::default());
        assert!(!config.monitoring.enabled);
        assert!(config.validate().is_ok());

        let retry = config.retry_policy();
        assert_eq!(retry, RetryPolicy::default());
    }

    #[test]
    fn test_full_file() {
        let config = TomlConfig::from_toml_str(
            r#"
[paths]
data_dir = "/opt/airflow/data"

[warehouse]
project = "demo-project"
table = "trips"
poll_interval_ms = 250

[schedule]
retries = 2
retry_delay_seconds = 5
daily_at = "03:15"

[monitoring]
enabled = true
"#,
        )
        .unwrap();

        assert_eq!(config.paths.data_dir, "/opt/airflow/data");
        assert_eq!(config.paths.raw, "raw/nyc_taxi_sample.csv");
        assert_eq!(config.warehouse.table.as_deref(), Some("trips"));
        assert_eq!(config.retry_policy().delay, Duration::from_secs(5));
        assert!(config.daily_schedule().is_ok());
        assert!(config.monitoring.enabled);
    }

    #[test]
    fn test_unknown_variable_left_verbatim() {
        let config = TomlConfig::from_toml_str(
            r#"
[warehouse]
project = "${TAXI_ETL_SURELY_UNSET_VARIABLE}"
"#,
        )
        .unwrap();
        assert_eq!(
            config.warehouse.project.as_deref(),
            Some("${TAXI_ETL_SURELY_UNSET_VARIABLE}")
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = TomlConfig::from_toml_str("[paths\nraw = 1").unwrap_err();
        assert!(matches!(err, EtlError::ConfigError { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TomlConfig::default();
        config.schedule.retries = 50;
        assert!(config.validate().is_err());

        let mut config = TomlConfig::default();
        config.schedule.daily_at = "later".to_string();
        assert!(config.validate().is_err());

        let mut config = TomlConfig::default();
        config.paths.processed = config.paths.staging.clone();
        assert!(config.validate().is_err());
    }
}
