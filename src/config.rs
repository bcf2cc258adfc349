//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_DATABASE_URL: &str = "file:data/reviews.db";
    pub const DEV_HOST: &str = "127.0.0.1";
    pub const DEV_PORT: u16 = 8080;
    pub const DEV_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024; // 10MB per CSV upload
    pub const DEV_MAX_ROWS: usize = 10_000; // Max review rows per upload
    pub const DEV_CHUNK_SIZE: usize = 35; // Reviews per model call
    pub const DEV_TOP_THEMES: usize = 3; // Top-N themes per polarity
    pub const DEV_TREND_WINDOW_DAYS: i64 = 60; // Trailing trend comparison window

    // Model collaborator defaults (OpenAI-compatible chat completions)
    pub const DEV_MODEL_BASE_URL: &str = "https://api.groq.com/openai/v1";
    pub const DEV_MODEL_NAME: &str = "openai/gpt-oss-120b";
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Check if this is a development environment.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Check if this is a production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Model collaborator configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL for the OpenAI-compatible completion API
    pub base_url: String,
    /// Model identifier sent with each request
    pub model: String,
    /// API key (required for real analysis; jobs fail over to fallback briefs without it)
    pub api_key: Option<String>,
}

/// Analysis tuning knobs shared by the pipeline services.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Reviews per theme-extraction chunk
    pub chunk_size: usize,
    /// Top-N themes kept per polarity
    pub top_themes: usize,
    /// Trailing window for the trend comparison, in days
    pub trend_window_days: i64,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL (file:path/to/reviews.db)
    pub database_url: String,
    /// Maximum upload size in bytes (default: 10MB)
    pub max_upload_size: usize,
    /// Maximum review rows per upload (default: 10000)
    pub max_rows: usize,
    /// Directory holding downloadable sample CSV files (optional)
    pub samples_dir: Option<PathBuf>,
    /// Model collaborator configuration
    pub model: ModelConfig,
    /// Analysis tuning knobs
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In development mode (RUST_ENV=development) every variable has a
    /// default and only RUST_ENV is required. In production mode the server
    /// refuses to start with development defaults for DATABASE_URL, and a
    /// model API key must be set.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `RIS_HOST`: Server host (default: 127.0.0.1)
    /// - `RIS_PORT`: Server port (default: 8080)
    /// - `DATABASE_URL`: SQLite URL, `file:` prefixed (default: file:data/reviews.db)
    /// - `RIS_MAX_UPLOAD_SIZE`: Max upload size in bytes (default: 10MB)
    /// - `RIS_MAX_ROWS`: Max review rows per upload (default: 10000)
    /// - `RIS_SAMPLES_DIR`: Directory of sample CSV files (optional)
    /// - `RIS_CHUNK_SIZE`: Reviews per model call (default: 35)
    /// - `RIS_TOP_THEMES`: Top-N themes per polarity (default: 3)
    /// - `RIS_TREND_WINDOW_DAYS`: Trend window in days (default: 60)
    /// - `GROQ_API_KEY`: Model API key (required in production)
    /// - `GROQ_BASE_URL`: Completion API base URL (default: Groq)
    /// - `GROQ_MODEL`: Model identifier (default: openai/gpt-oss-120b)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Parse environment - required
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let host = env::var("RIS_HOST").unwrap_or_else(|_| defaults::DEV_HOST.to_string());

        let port = env::var("RIS_PORT")
            .unwrap_or_else(|_| defaults::DEV_PORT.to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("RIS_PORT must be a valid port number"))?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DEV_DATABASE_URL.to_string());

        let max_upload_size = env::var("RIS_MAX_UPLOAD_SIZE")
            .unwrap_or_else(|_| defaults::DEV_MAX_UPLOAD_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("RIS_MAX_UPLOAD_SIZE must be a valid number"))?;

        let max_rows = env::var("RIS_MAX_ROWS")
            .unwrap_or_else(|_| defaults::DEV_MAX_ROWS.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("RIS_MAX_ROWS must be a valid number"))?;

        let samples_dir = env::var("RIS_SAMPLES_DIR").ok().map(PathBuf::from);

        let chunk_size = env::var("RIS_CHUNK_SIZE")
            .unwrap_or_else(|_| defaults::DEV_CHUNK_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("RIS_CHUNK_SIZE must be a valid number"))?;

        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue("RIS_CHUNK_SIZE must be nonzero"));
        }

        let top_themes = env::var("RIS_TOP_THEMES")
            .unwrap_or_else(|_| defaults::DEV_TOP_THEMES.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("RIS_TOP_THEMES must be a valid number"))?;

        let trend_window_days = env::var("RIS_TREND_WINDOW_DAYS")
            .unwrap_or_else(|_| defaults::DEV_TREND_WINDOW_DAYS.to_string())
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue("RIS_TREND_WINDOW_DAYS must be a valid number")
            })?;

        let model = ModelConfig {
            base_url: env::var("GROQ_BASE_URL")
                .unwrap_or_else(|_| defaults::DEV_MODEL_BASE_URL.to_string()),
            model: env::var("GROQ_MODEL").unwrap_or_else(|_| defaults::DEV_MODEL_NAME.to_string()),
            api_key: env::var("GROQ_API_KEY").ok(),
        };

        let config = Config {
            environment,
            host,
            port,
            database_url,
            max_upload_size,
            max_rows,
            samples_dir,
            model,
            analysis: AnalysisConfig {
                chunk_size,
                top_themes,
                trend_window_days,
            },
        };

        // Validate production configuration
        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.database_url == defaults::DEV_DATABASE_URL {
            errors.push(format!(
                "DATABASE_URL is using development default '{}'. Set a production SQLite path.",
                defaults::DEV_DATABASE_URL
            ));
        }

        if self.model.api_key.is_none() {
            errors.push(
                "GROQ_API_KEY is not set. Theme extraction and brief generation require it."
                    .to_string(),
            );
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Get the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(environment: Environment) -> Config {
        Config {
            environment,
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "file:/tmp/test-reviews.db".to_string(),
            max_upload_size: 1024,
            max_rows: 100,
            samples_dir: None,
            model: ModelConfig {
                base_url: defaults::DEV_MODEL_BASE_URL.to_string(),
                model: defaults::DEV_MODEL_NAME.to_string(),
                api_key: Some("test-key".to_string()),
            },
            analysis: AnalysisConfig {
                chunk_size: 35,
                top_themes: 3,
                trend_window_days: 60,
            },
        }
    }

    #[test]
    fn test_bind_address() {
        let config = test_config(Environment::Development);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::parse("development"),
            Some(Environment::Development)
        );
        assert_eq!(Environment::parse("dev"), Some(Environment::Development));
        assert_eq!(
            Environment::parse("production"),
            Some(Environment::Production)
        );
        assert_eq!(Environment::parse("prod"), Some(Environment::Production));
        assert_eq!(Environment::parse("invalid"), None);
    }

    #[test]
    fn test_production_validation_fails_with_dev_defaults() {
        let mut config = test_config(Environment::Production);
        config.database_url = defaults::DEV_DATABASE_URL.to_string();
        config.model.api_key = None;

        let result = config.validate_production();
        assert!(result.is_err());

        if let Err(ConfigError::ProductionValidation(errors)) = result {
            assert_eq!(errors.len(), 2);
        }
    }

    #[test]
    fn test_production_validation_passes_with_proper_config() {
        let config = test_config(Environment::Production);
        assert!(config.validate_production().is_ok());
    }
}
