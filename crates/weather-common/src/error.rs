//! Error types for the weather tile services.

use thiserror::Error;

/// Result type alias using WeatherError.
pub type WeatherResult<T> = Result<T, WeatherError>;

/// Primary error type shared by the worker and the tile server.
#[derive(Debug, Error)]
pub enum WeatherError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // === Data Errors ===
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    #[error("No published run for model: {0}")]
    NoPublishedRun(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    // === Rendering Errors ===
    #[error("Rendering failed: {0}")]
    RenderError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Request timeout")]
    Timeout,
}

impl WeatherError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            WeatherError::MissingParameter(_)
            | WeatherError::InvalidParameter { .. }
            | WeatherError::UnsupportedFormat(_) => 400,

            WeatherError::Unauthorized(_) => 401,

            WeatherError::LayerNotFound(_) | WeatherError::DataNotAvailable(_) => 404,

            WeatherError::Timeout => 504,

            _ => 500,
        }
    }
}

impl From<std::io::Error> for WeatherError {
    fn from(err: std::io::Error) -> Self {
        WeatherError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        WeatherError::InternalError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for WeatherError {
    fn from(err: serde_yaml::Error) -> Self {
        WeatherError::InvalidConfig(format!("YAML error: {}", err))
    }
}
