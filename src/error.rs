//! Error taxonomy for the detection core (spec §7).
//!
//! Library APIs return [`CoreError`]; callers that want `anyhow`-flavored
//! propagation (the CLI binary) convert with `?` since `CoreError` implements
//! `std::error::Error`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised anywhere in the detection core.
///
/// Variants map onto the kinds named in spec §7, not onto concrete struct
/// names — each carries enough context (tile path, offending value) for a
/// caller to produce a useful message without re-deriving it.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing/corrupt point file, unreadable AOI file, malformed summary JSON.
    #[error("input error{}: {message}", path.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default())]
    Input {
        path: Option<PathBuf>,
        message: String,
    },

    /// Invalid thresholds, invalid geometry, invalid CRS strings.
    #[error("validation error: {0}")]
    Validation(String),

    /// Grid exceeds the configured memory budget.
    #[error("resource error: {0}")]
    Resource(String),

    /// CRS mismatch between collaborating inputs, or a disallowed geographic CRS.
    #[error("crs error: {0}")]
    Crs(String),

    /// Internal invariant violation. Always fatal; never caught per-tile.
    #[error("internal consistency violation: {0}")]
    Consistency(String),

    /// An optional output writer (GeoJSON/CSV) failed.
    #[error("downstream writer error: {0}")]
    Downstream(String),
}

impl CoreError {
    pub fn input(message: impl Into<String>) -> Self {
        CoreError::Input { path: None, message: message.into() }
    }

    pub fn input_at(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CoreError::Input { path: Some(path.into()), message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        CoreError::Resource(message.into())
    }

    pub fn crs(message: impl Into<String>) -> Self {
        CoreError::Crs(message.into())
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        CoreError::Consistency(message.into())
    }

    pub fn downstream(message: impl Into<String>) -> Self {
        CoreError::Downstream(message.into())
    }

    /// True for the error kinds the per-tile loop is allowed to catch and
    /// record against a single tile's summary entry (§7 propagation policy).
    ///
    /// `Resource` (grid-too-large) is only catchable when the caller has
    /// opted into skip-on-oversized behavior (`Params::skip_oversized_tiles`,
    /// §5/§6); otherwise it aborts the batch like any other policy failure.
    pub fn is_per_tile_catchable(&self, skip_oversized_tiles: bool) -> bool {
        match self {
            CoreError::Input { .. } => true,
            CoreError::Resource(_) => skip_oversized_tiles,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
