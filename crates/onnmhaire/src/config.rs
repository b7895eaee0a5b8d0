//! Exporter configuration
//!
//! Install-time defaults for clash handling, export options and the target
//! identifier grammar. Read from `~/.onnmhaire/config.json` when present.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ExportError, ExportResult};
use crate::registry::{DEFAULT_TAG, NEVER_TAG};
use crate::types::{ClashPolicy, ExportOptions};

/// Identifier grammar accepted for target names unless configured otherwise
pub const DEFAULT_IDENTIFIER_PATTERN: &str = "[A-Za-z_][A-Za-z0-9_]*";

static DEFAULT_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&anchored(DEFAULT_IDENTIFIER_PATTERN)).expect("default identifier pattern is valid")
});

fn anchored(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

/// Compiled host identifier grammar
#[derive(Debug, Clone)]
pub struct IdentifierGrammar {
    pattern: Regex,
}

impl IdentifierGrammar {
    /// Compile a pattern; it must match the whole name
    pub fn compile(pattern: &str) -> ExportResult<Self> {
        let pattern = Regex::new(&anchored(pattern)).map_err(|e| {
            ExportError::Config(format!("invalid identifier pattern '{}': {}", pattern, e))
        })?;
        Ok(Self { pattern })
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

impl Default for IdentifierGrammar {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_IDENTIFIER.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// Clash policy when neither the item nor the request sets one
    pub clash_policy: ClashPolicy,
    /// Default export options every item is merged onto
    pub defaults: ExportOptions,
    pub identifier_pattern: String,
    /// Tag expanded for an empty request
    pub default_tag: String,
    /// Tag marking symbols that can never be exported
    pub never_tag: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            clash_policy: ClashPolicy::Bail,
            defaults: ExportOptions::default(),
            identifier_pattern: DEFAULT_IDENTIFIER_PATTERN.to_string(),
            default_tag: DEFAULT_TAG.to_string(),
            never_tag: NEVER_TAG.to_string(),
        }
    }
}

impl ExporterConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> ExportResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ExportError::Config(format!("failed to read {:?}: {}", path, e)))?;
        let config: ExporterConfig = serde_json::from_str(&content)
            .map_err(|e| ExportError::Config(format!("failed to parse {:?}: {}", path, e)))?;
        config.validate()?;

        info!("Loaded exporter config from {:?}", path);
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> ExportResult<Self> {
        if !path.exists() {
            debug!("No exporter config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> ExportResult<()> {
        IdentifierGrammar::compile(&self.identifier_pattern)?;

        if self.defaults.as_name.is_some() {
            return Err(ExportError::invalid_option(
                "defaults",
                "'as' cannot be set as a default",
            ));
        }
        if self.default_tag.is_empty() {
            return Err(ExportError::Config("default_tag cannot be empty".to_string()));
        }
        if self.never_tag.is_empty() {
            return Err(ExportError::Config("never_tag cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn identifier_grammar(&self) -> ExportResult<IdentifierGrammar> {
        if self.identifier_pattern == DEFAULT_IDENTIFIER_PATTERN {
            return Ok(IdentifierGrammar::default());
        }
        IdentifierGrammar::compile(&self.identifier_pattern)
    }
}

/// `~/.onnmhaire/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".onnmhaire").join("config.json"))
}
