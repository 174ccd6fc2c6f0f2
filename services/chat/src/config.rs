use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Client configuration, read from the environment and overridable by flags.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend_url: String,
    pub session_file: PathBuf,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let backend_url =
            std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        validate_url("BACKEND_URL", &backend_url)?;

        let session_file = std::env::var("SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".streamchat_session"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "WARN".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            backend_url,
            session_file,
            log_level,
        })
    }

    /// Applies command-line overrides on top of the environment.
    pub fn with_overrides(
        mut self,
        backend_url: Option<String>,
        session_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = backend_url {
            validate_url("--backend-url", &url)?;
            self.backend_url = url;
        }
        if let Some(path) = session_file {
            self.session_file = path;
        }
        Ok(self)
    }
}

fn validate_url(source: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(
            source.to_string(),
            format!("'{}' is not an http(s) URL", url),
        ))
    }
}
