//! Error taxonomy for the AKU lifecycle.

use crate::unit::Identity;

/// Result alias used throughout dku-core.
pub type Result<T> = std::result::Result<T, DkuError>;

/// Every failure the core can surface. Nothing is retried or swallowed inside the core;
/// each variant carries the identity or location involved so callers can retry or report.
#[derive(Debug, thiserror::Error)]
pub enum DkuError {
    /// Codec frame or envelope could not be parsed. Not retryable.
    #[error("corrupt data{}: {reason}", fmt_location(.location))]
    CorruptData {
        location: Option<String>,
        reason: String,
    },

    /// Backend could not be reached (connection refused, timeout). Safe to retry upstream.
    #[error("backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Backend accepted the call but reported a failed write.
    #[error("backend '{backend}' rejected write: {reason}")]
    BackendWrite { backend: String, reason: String },

    /// Backend was reachable but refused the read. Not retryable as-is.
    #[error("backend '{backend}' refused read of {location}: {reason}")]
    BackendRead {
        backend: String,
        location: String,
        reason: String,
    },

    #[error("no data stored at location {location}")]
    NotFound { location: String },

    /// `previous` is not the head of its lineage; re-read the latest version and retry.
    #[error(
        "version conflict on lineage {lineage}: expected head {}, found {}",
        fmt_head(.expected),
        fmt_head(.current)
    )]
    VersionConflict {
        lineage: Identity,
        expected: Option<Identity>,
        current: Option<Identity>,
    },

    /// Identity recomputed on fetch differs from the one embedded in the envelope.
    #[error("integrity check failed at {location}: stored={stored}, computed={computed}")]
    Integrity {
        location: String,
        stored: Identity,
        computed: Identity,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl DkuError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptData {
            location: None,
            reason: reason.into(),
        }
    }

    /// Attaches a location to `CorruptData`; other variants pass through unchanged.
    pub(crate) fn at_location(self, loc: &str) -> Self {
        match self {
            Self::CorruptData { location: None, reason } => Self::CorruptData {
                location: Some(loc.to_string()),
                reason,
            },
            other => other,
        }
    }

    /// True for failures an orchestration layer may retry as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

fn fmt_location(location: &Option<String>) -> String {
    location
        .as_ref()
        .map(|l| format!(" at {}", l))
        .unwrap_or_default()
}

fn fmt_head(head: &Option<Identity>) -> String {
    head.map(|h| h.to_string())
        .unwrap_or_else(|| "none".to_string())
}
