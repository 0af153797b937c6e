//! Data providers for the acquisition engine

pub mod provider;
pub mod sources;

use thiserror::Error;

// Re-exports
pub use provider::{ProgressReporter, SeriesSource, SourceProvider};
pub use sources::CosinusSource;

/// Errors that can occur while producing a data series.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("series construction error: {0}")]
    Series(#[from] ts_core::SeriesError),

    #[error("unsupported product type '{0}'")]
    UnsupportedType(String),

    #[error("invalid metadata value for '{key}': {value}")]
    InvalidMetadata { key: String, value: String },

    #[error("retrieval error: {0}")]
    Retrieval(String),
}
