//! Wrap Service boundary
//!
//! The engine never transforms callables itself. Timeouts, retries, currying
//! and argument-style conversion are produced by a [`WrapService`].

use thiserror::Error;

use crate::types::{Callable, SymbolMetadata, WrapSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WrapServiceError(pub String);

impl From<String> for WrapServiceError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for WrapServiceError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// The callable being wrapped, with its provider-declared metadata
#[derive(Clone, Copy)]
pub struct WrapTarget<'a> {
    pub provider: &'a str,
    pub symbol: &'a str,
    /// `None` for pass-through symbols
    pub metadata: Option<&'a SymbolMetadata>,
    pub callable: &'a Callable,
}

/// Produces wrapped callable variants. Must be deterministic for a given
/// `(target, spec)` pair; default-spec results are cached and shared.
pub trait WrapService: Send + Sync {
    fn wrap(&self, target: &WrapTarget<'_>, spec: &WrapSpec) -> Result<Callable, WrapServiceError>;
}

impl<F> WrapService for F
where
    F: Fn(&WrapTarget<'_>, &WrapSpec) -> Result<Callable, WrapServiceError> + Send + Sync,
{
    fn wrap(&self, target: &WrapTarget<'_>, spec: &WrapSpec) -> Result<Callable, WrapServiceError> {
        self(target, spec)
    }
}

/// Returns the callable unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityWrapService;

impl WrapService for IdentityWrapService {
    fn wrap(&self, target: &WrapTarget<'_>, _spec: &WrapSpec) -> Result<Callable, WrapServiceError> {
        Ok(std::sync::Arc::clone(target.callable))
    }
}
