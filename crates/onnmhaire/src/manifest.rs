//! Provider Manifests
//!
//! JSON declaration of a provider's symbols, turned into a frozen
//! [`Registry`]. Callables are supplied by the caller, since a
//! manifest only describes metadata.
//!
//! ```json
//! {
//!   "provider": "text-utils",
//!   "symbols": [
//!     {"name": "trim", "tags": ["default", "strings"], "args": {"input": 0}}
//!   ],
//!   "pass_through": ["raw_trim"],
//!   "defaults": ["trim"]
//! }
//! ```

use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::config::IdentifierGrammar;
use crate::error::{ExportError, ExportResult};
use crate::registry::{Registry, RegistryBuilder};
use crate::types::{Callable, SymbolMetadata};

pub const MAX_MANIFEST_BYTES: u64 = 1_000_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderManifest {
    pub provider: String,
    #[serde(default)]
    pub symbols: Vec<SymbolMetadata>,
    /// Callables exposed without metadata
    #[serde(default)]
    pub pass_through: Vec<String>,
    /// Explicit default export list, used instead of the default tag
    #[serde(default)]
    pub defaults: Option<Vec<String>>,
}

impl ProviderManifest {
    pub fn from_json(content: &str) -> ExportResult<Self> {
        let manifest: ProviderManifest = serde_json::from_str(content)
            .map_err(|e| ExportError::Manifest(format!("failed to parse JSON: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> ExportResult<()> {
        if self.provider.is_empty() {
            return Err(ExportError::Manifest("provider cannot be empty".to_string()));
        }

        let grammar = IdentifierGrammar::default();
        let names = self
            .symbols
            .iter()
            .map(|s| s.name.as_str())
            .chain(self.pass_through.iter().map(String::as_str));
        for name in names {
            if !grammar.is_valid(name) {
                return Err(ExportError::Manifest(format!(
                    "invalid symbol name in {}: '{}'",
                    self.provider, name
                )));
            }
        }

        for symbol in &self.symbols {
            if symbol.tags.iter().any(String::is_empty) {
                return Err(ExportError::Manifest(format!(
                    "empty tag on symbol {}",
                    symbol.name
                )));
            }
        }

        Ok(())
    }

    /// Register every declared symbol, using `factory` for the callables
    pub fn build_registry<F>(&self, never_tag: &str, mut factory: F) -> ExportResult<Registry>
    where
        F: FnMut(&str, Option<&SymbolMetadata>) -> Callable,
    {
        let mut builder = RegistryBuilder::new(&self.provider).with_never_tag(never_tag);

        for symbol in &self.symbols {
            let callable = factory(&symbol.name, Some(symbol));
            builder.register(symbol.clone(), callable)?;
        }
        for name in &self.pass_through {
            let callable = factory(name, None);
            builder.expose(name, callable)?;
        }
        if let Some(defaults) = &self.defaults {
            builder.declare_defaults(defaults.iter().cloned());
        }

        info!(
            "Building registry from manifest {} ({} symbols)",
            self.provider,
            self.symbols.len()
        );
        builder.freeze()
    }
}

/// Reject manifests over [`MAX_MANIFEST_BYTES`] before they are read
pub fn ensure_manifest_size(path: &Path, len: u64) -> ExportResult<()> {
    if len > MAX_MANIFEST_BYTES {
        return Err(ExportError::Manifest(format!(
            "manifest {:?} too large ({} bytes, max 1MB)",
            path, len
        )));
    }
    Ok(())
}
