//! Why a settings load was refused.

use std::path::PathBuf;

use thiserror::Error;

/// A settings layer that could not be applied.
///
/// File problems name the file; value problems name the camelCase field as
/// it appears in `settings.json`.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// The settings file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The settings file is not JSON, or a field has the wrong JSON type.
    #[error("malformed settings in {}: {source}", path.display())]
    Malformed {
        /// The settings file, or `<defaults>` for the compiled layer.
        path: PathBuf,
        /// Underlying parse failure, with line and column when known.
        source: serde_json::Error,
    },
    /// The merged settings cannot run a relay.
    #[error("{field} {reason}")]
    Rejected {
        /// Offending field, e.g. `relay.queueCapacity`.
        field: &'static str,
        /// What it must satisfy.
        reason: &'static str,
    },
}

impl SettingsError {
    /// Shorthand for a rejected field.
    pub(crate) fn rejected(field: &'static str, reason: &'static str) -> Self {
        Self::Rejected { field, reason }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
