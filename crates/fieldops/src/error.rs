//! Error types for fieldops.
//!
//! Not-found conditions are never errors in this crate: lookups return
//! `Option` and queries return empty vectors. The variants below cover the
//! failures that callers actually have to react to.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for fieldops operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The connection lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    StoreLock,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Record Errors ===
    /// A partial update was not a JSON object.
    #[error("invalid patch for {collection}: {message}")]
    InvalidPatch {
        /// Collection the patch was aimed at.
        collection: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// A timestamp string could not be parsed.
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// The offending input.
        value: String,
    },

    /// A record referenced on the command line does not exist.
    #[error("{collection} record '{id}' not found")]
    NotFound {
        /// Collection that was searched.
        collection: &'static str,
        /// The id that was requested.
        id: String,
    },

    // === Geolocation Errors ===
    /// The user denied foreground location access.
    #[error("location permission denied")]
    PermissionDenied,

    /// The location provider could not produce a fix.
    #[error("unable to get current location")]
    LocationUnavailable,

    /// A supplied position is not finite or outside the coordinate range.
    #[error("invalid location ({lat}, {lng})")]
    InvalidLocation {
        /// Latitude as given.
        lat: f64,
        /// Longitude as given.
        lng: f64,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for fieldops operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a not-found error for a CLI lookup.
    #[must_use]
    pub fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// Create an invalid patch error.
    #[must_use]
    pub fn invalid_patch(collection: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            collection,
            message: message.into(),
        }
    }

    /// Check if this error is a location permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }

    /// Check if this error means no location fix could be obtained.
    #[must_use]
    pub fn is_location_unavailable(&self) -> bool {
        matches!(self, Self::LocationUnavailable)
    }
}
