use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error at '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error in '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("Load error: {message}")]
    LoadError { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Parse,
    Load,
    Network,
    Serialization,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        EtlError::IoError {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        EtlError::LoadError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::IoError { .. } => ErrorCategory::Io,
            EtlError::ParseError { .. } => ErrorCategory::Parse,
            EtlError::LoadError { .. } => ErrorCategory::Load,
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::SerializationError(_) => ErrorCategory::Serialization,
            EtlError::ConfigError { .. } | EtlError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路錯誤通常可以重試
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Io
            | ErrorCategory::Parse
            | ErrorCategory::Load
            | ErrorCategory::Serialization => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::IoError { path, .. } => format!(
                "Check that '{}' exists and is readable, and that the previous stage completed",
                path
            ),
            EtlError::ParseError { path, .. } => format!(
                "Make sure '{}' is comma-separated text with a header row",
                path
            ),
            EtlError::LoadError { .. } => {
                "Check GCP_PROJECT_ID, BQ_DATASET, BQ_TABLE and the credentials used for BigQuery"
                    .to_string()
            }
            EtlError::ApiError(_) => {
                "Check network connectivity to the BigQuery API and retry".to_string()
            }
            EtlError::SerializationError(_) => {
                "The BigQuery API returned an unexpected payload; check api_base_url".to_string()
            }
            EtlError::ConfigError { .. } => "Review the configuration file".to_string(),
            EtlError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}'", field)
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("Could not access a pipeline file. {}", self),
            ErrorCategory::Parse => format!("Input is not valid CSV. {}", self),
            ErrorCategory::Load => format!("Loading into the warehouse failed. {}", self),
            ErrorCategory::Network => format!("Could not reach the warehouse. {}", self),
            ErrorCategory::Serialization => format!("Unexpected warehouse response. {}", self),
            ErrorCategory::Configuration => format!("Configuration problem. {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let io = EtlError::io(
            "staging/a.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(io.category(), ErrorCategory::Io);
        assert_eq!(io.severity(), ErrorSeverity::High);
        assert!(io.to_string().contains("staging/a.csv"));

        let load = EtlError::load("job failed");
        assert_eq!(load.category(), ErrorCategory::Load);

        let config = EtlError::InvalidConfigValueError {
            field: "paths.raw".to_string(),
            value: String::new(),
            reason: "Path cannot be empty".to_string(),
        };
        assert_eq!(config.severity(), ErrorSeverity::Critical);
        assert!(config.recovery_suggestion().contains("paths.raw"));
    }
}
