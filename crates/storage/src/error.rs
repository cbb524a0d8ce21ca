//! Error type of the storage crate.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("MBTiles database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to promote {failed} of {total} artifacts of {package}")]
    PromotionIncomplete {
        package: String,
        failed: usize,
        total: usize,
    },
}

impl StorageError {
    pub(crate) fn at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StorageError {
        let path = path.into();
        move |source| StorageError::IoAt { path, source }
    }
}

impl From<StorageError> for weather_common::WeatherError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => weather_common::WeatherError::DataNotAvailable(what),
            other => weather_common::WeatherError::StorageError(other.to_string()),
        }
    }
}
