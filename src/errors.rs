//! Error types for quakescope.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

/// Errors that can occur in quakescope operations.
#[derive(Error, Debug)]
pub enum QuakeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Database query or connection failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API returned an error status
    #[error("Catalog API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Too many overlay catalogs selected
    #[error("Maximum {max} overlay catalogs allowed")]
    OverlayLimit { max: usize },

    /// Export requested before any events were loaded
    #[error("No earthquake data loaded. Apply filters first.")]
    NothingToExport,
}
