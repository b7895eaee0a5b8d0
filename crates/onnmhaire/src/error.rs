//! Export Errors
//!
//! Unified error type for registration, resolution and installation, with a
//! stable kind code per variant.

use thiserror::Error;

/// Result alias used across the crate
pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// A symbol was registered twice with the same provider
    #[error("symbol already registered: {0}")]
    DuplicateSymbol(String),

    /// Requested name is neither registered nor a pass-through symbol
    #[error("unknown or non-exportable symbol: {0}")]
    UnknownSymbol(String),

    #[error("invalid option for '{item}': {reason}")]
    InvalidOption { item: String, reason: String },

    #[error("invalid target identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Two distinct symbols resolved to the same target within one plan
    #[error("target name '{target}' claimed by both '{first}' and '{second}'")]
    TargetNameCollision {
        target: String,
        first: String,
        second: String,
    },

    /// Target already bound in the namespace and the clash policy is `bail`
    #[error("name clash: '{0}' is already bound")]
    NameClash(String),

    /// Wrap service failure, surfaced verbatim
    #[error("wrap failed for '{symbol}': {message}")]
    WrapFailure { symbol: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("manifest error: {0}")]
    Manifest(String),
}

impl ExportError {
    /// Stable machine-readable code for logs and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateSymbol(_) => "duplicate_symbol",
            Self::UnknownSymbol(_) => "unknown_symbol",
            Self::InvalidOption { .. } => "invalid_option",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::TargetNameCollision { .. } => "target_name_collision",
            Self::NameClash(_) => "name_clash",
            Self::WrapFailure { .. } => "wrap_failure",
            Self::Config(_) => "config",
            Self::Manifest(_) => "manifest",
        }
    }

    pub fn invalid_option(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            item: item.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised before any namespace access
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSymbol(_)
                | Self::InvalidOption { .. }
                | Self::InvalidIdentifier(_)
                | Self::TargetNameCollision { .. }
        )
    }
}
