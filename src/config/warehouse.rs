use crate::domain::model::TableRef;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_pattern, validate_url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const PROJECT_ENV: &str = "GCP_PROJECT_ID";
pub const DATASET_ENV: &str = "BQ_DATASET";
pub const TABLE_ENV: &str = "BQ_TABLE";
pub const LOCATION_ENV: &str = "BQ_LOCATION";
pub const ACCESS_TOKEN_ENV: &str = "GCP_ACCESS_TOKEN";
pub const API_BASE_URL_ENV: &str = "BQ_API_BASE_URL";
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

pub const DEFAULT_DATASET: &str = "demo_ds";
pub const DEFAULT_TABLE: &str = "nyc_taxi";
pub const DEFAULT_API_BASE_URL: &str = "https://bigquery.googleapis.com";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";

const PROJECT_PATTERN: &str = r"^(?:[a-z][a-z0-9.-]*:)?[a-z][a-z0-9-]{4,28}[a-z0-9]$";
const DATASET_PATTERN: &str = r"^[A-Za-z0-9_]{1,1024}$";
const TABLE_PATTERN: &str = r"^[\w-]{1,1024}$";

/// `[warehouse]` section as written in the TOML file; everything optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseSettings {
    pub project: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
    pub location: Option<String>,
    pub api_base_url: Option<String>,
    pub access_token: Option<String>,
    pub metadata_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

impl WarehouseSettings {
    /// 環境變數優先於檔案設定，空字串視為未設定
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(PROJECT_ENV) {
            self.project = Some(v);
        }
        if let Some(v) = get(DATASET_ENV) {
            self.dataset = Some(v);
        }
        if let Some(v) = get(TABLE_ENV) {
            self.table = Some(v);
        }
        if let Some(v) = get(LOCATION_ENV) {
            self.location = Some(v);
        }
        if let Some(v) = get(ACCESS_TOKEN_ENV) {
            self.access_token = Some(v);
        }
        if let Some(v) = get(API_BASE_URL_ENV) {
            self.api_base_url = Some(v);
        }
        // GCE_METADATA_HOST 只給 host[:port]
        if let Some(v) = get(METADATA_HOST_ENV) {
            self.metadata_url = Some(format!("http://{}", v.trim()));
        }
        self
    }
}

/// Where bearer tokens for the warehouse API come from.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Fixed token from config or `GCP_ACCESS_TOKEN`; never refreshed.
    AccessToken(String),
    /// Short-lived service-account tokens from the GCE/GKE metadata server,
    /// re-fetched before they expire.
    MetadataServer { url: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::AccessToken(_) => f.write_str("AccessToken(***)"),
            Credentials::MetadataServer { url } => {
                f.debug_struct("MetadataServer").field("url", url).finish()
            }
        }
    }
}

/// Validated destination settings for the loader.
#[derive(Clone)]
pub struct WarehouseConfig {
    pub destination: TableRef,
    pub location: Option<String>,
    pub api_base_url: String,
    pub credentials: Credentials,
    pub poll_interval: Duration,
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("destination", &self.destination.to_string())
            .field("location", &self.location)
            .field("api_base_url", &self.api_base_url)
            .field("credentials", &self.credentials)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl WarehouseConfig {
    /// Validate settings. A missing or malformed destination is a
    /// [`EtlError::LoadError`], raised before any network call.
    pub fn from_settings(settings: WarehouseSettings) -> Result<Self> {
        let project = settings
            .project
            // 未替換的 ${VAR} 佔位符也算未設定
            .filter(|p| !p.trim().is_empty() && !p.starts_with("${"))
            .ok_or_else(|| {
                EtlError::load(format!(
                    "{} is not set; cannot build the destination table id",
                    PROJECT_ENV
                ))
            })?;
        let dataset = settings
            .dataset
            .unwrap_or_else(|| DEFAULT_DATASET.to_string());
        let table = settings.table.unwrap_or_else(|| DEFAULT_TABLE.to_string());

        let destination_error = |e: EtlError| EtlError::load(format!("invalid destination: {}", e));
        validate_pattern("project", &project, PROJECT_PATTERN, "GCP project id")
            .map_err(destination_error)?;
        validate_pattern("dataset", &dataset, DATASET_PATTERN, "BigQuery dataset id")
            .map_err(destination_error)?;
        validate_pattern("table", &table, TABLE_PATTERN, "BigQuery table id")
            .map_err(destination_error)?;

        let api_base_url = settings
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        validate_url("warehouse.api_base_url", &api_base_url)?;

        // 沒有固定 token 時改向 metadata server 取得
        let credentials = match settings.access_token.filter(|t| !t.starts_with("${")) {
            Some(token) => Credentials::AccessToken(token),
            None => {
                let url = settings
                    .metadata_url
                    .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string());
                validate_url("warehouse.metadata_url", &url)?;
                Credentials::MetadataServer {
                    url: url.trim_end_matches('/').to_string(),
                }
            }
        };

        Ok(Self {
            destination: TableRef {
                project,
                dataset,
                table,
            },
            location: settings.location,
            api_base_url,
            credentials,
            poll_interval: Duration::from_millis(
                settings.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
        })
    }
}
