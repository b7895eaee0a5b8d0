//! Metadata Registry
//!
//! Per-provider table of exportable symbols with a reverse tag index. Built
//! through [`RegistryBuilder`], then frozen into an immutable [`Registry`]
//! that is shared across resolutions without locking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ExportError, ExportResult};
use crate::types::{Callable, SymbolMetadata};

/// Reserved tag expanded for an empty request
pub const DEFAULT_TAG: &str = "default";

/// Reserved tag marking a symbol as never exportable
pub const NEVER_TAG: &str = "never";

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
struct SymbolEntry {
    /// `None` for pass-through symbols
    metadata: Option<Arc<SymbolMetadata>>,
    callable: Callable,
}

/// Registration phase of a provider's symbol table
pub struct RegistryBuilder {
    provider: String,
    symbols: HashMap<String, SymbolEntry>,
    order: Vec<String>,
    default_names: Option<Vec<String>>,
    never_tag: String,
}

impl RegistryBuilder {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            symbols: HashMap::new(),
            order: Vec::new(),
            default_names: None,
            never_tag: NEVER_TAG.to_string(),
        }
    }

    /// Override the tag that marks symbols as never exportable
    pub fn with_never_tag(mut self, tag: impl Into<String>) -> Self {
        self.never_tag = tag.into();
        self
    }

    /// Register a symbol with metadata
    pub fn register(&mut self, metadata: SymbolMetadata, callable: Callable) -> ExportResult<()> {
        let name = metadata.name.clone();
        self.insert(
            name,
            SymbolEntry {
                metadata: Some(Arc::new(metadata)),
                callable,
            },
        )
    }

    /// Expose a callable without metadata (exportable by explicit name only)
    pub fn expose(&mut self, name: impl Into<String>, callable: Callable) -> ExportResult<()> {
        self.insert(
            name.into(),
            SymbolEntry {
                metadata: None,
                callable,
            },
        )
    }

    /// Declare an explicit default export list, used instead of the default tag
    pub fn declare_defaults<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_names = Some(names.into_iter().map(Into::into).collect());
    }

    fn insert(&mut self, name: String, entry: SymbolEntry) -> ExportResult<()> {
        if name.is_empty() {
            return Err(ExportError::Manifest(format!(
                "provider {} registered a symbol with an empty name",
                self.provider
            )));
        }
        if self.symbols.contains_key(&name) {
            return Err(ExportError::DuplicateSymbol(name));
        }
        debug!("Registered symbol {}::{}", self.provider, name);
        self.order.push(name.clone());
        self.symbols.insert(name, entry);
        Ok(())
    }

    /// End the registration phase and build the tag index
    pub fn freeze(self) -> ExportResult<Registry> {
        if let Some(defaults) = &self.default_names {
            for name in defaults {
                if !self.symbols.contains_key(name) {
                    return Err(ExportError::UnknownSymbol(name.clone()));
                }
            }
        }

        let mut tag_index: HashMap<String, Vec<String>> = HashMap::new();
        let mut tag_order = Vec::new();

        for name in &self.order {
            let Some(meta) = self.symbols.get(name).and_then(|e| e.metadata.as_ref()) else {
                continue;
            };
            if meta.has_tag(&self.never_tag) {
                continue;
            }
            for tag in &meta.tags {
                let members = tag_index.entry(tag.clone()).or_insert_with(|| {
                    tag_order.push(tag.clone());
                    Vec::new()
                });
                members.push(name.clone());
            }
        }

        info!(
            "Registry for {} frozen: {} symbols, {} tags",
            self.provider,
            self.order.len(),
            tag_order.len()
        );

        Ok(Registry {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            provider: self.provider,
            symbols: self.symbols,
            order: self.order,
            tag_index,
            tag_order,
            default_names: self.default_names,
            never_tag: self.never_tag,
        })
    }
}

/// Frozen, read-only symbol table for one provider
pub struct Registry {
    /// Unique per frozen registry, even across providers sharing a name
    id: u64,
    provider: String,
    symbols: HashMap<String, SymbolEntry>,
    /// Registration order
    order: Vec<String>,
    /// Tag → symbols in registration order, never-exportable symbols excluded
    tag_index: HashMap<String, Vec<String>>,
    tag_order: Vec<String>,
    default_names: Option<Vec<String>>,
    never_tag: String,
}

impl Registry {
    pub fn builder(provider: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(provider)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn never_tag(&self) -> &str {
        &self.never_tag
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&SymbolMetadata> {
        self.symbols.get(name)?.metadata.as_deref()
    }

    /// Symbols carrying `tag`, in registration order. Unknown tags expand to nothing.
    pub fn lookup_by_tag(&self, tag: &str) -> &[String] {
        self.tag_index.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_index.contains_key(tag)
    }

    pub fn is_pass_through(&self, name: &str) -> bool {
        self.symbols
            .get(name)
            .is_some_and(|entry| entry.metadata.is_none())
    }

    pub fn is_never_exportable(&self, name: &str) -> bool {
        self.lookup_by_name(name)
            .is_some_and(|meta| meta.has_tag(&self.never_tag))
    }

    /// Known to the provider and reachable by an export request
    pub fn is_exportable(&self, name: &str) -> bool {
        self.symbols.contains_key(name) && !self.is_never_exportable(name)
    }

    /// The unwrapped callable for a symbol
    pub fn callable(&self, name: &str) -> Option<Callable> {
        self.symbols.get(name).map(|entry| Arc::clone(&entry.callable))
    }

    pub fn default_names(&self) -> Option<&[String]> {
        self.default_names.as_deref()
    }

    /// All tags in first-seen order
    pub fn tags(&self) -> &[String] {
        &self.tag_order
    }

    /// All symbol names in registration order
    pub fn symbols(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("symbols", &self.order)
            .field("tags", &self.tag_order)
            .field("default_names", &self.default_names)
            .finish()
    }
}

/// Registry used by tests across the crate:
/// `f1{a,b,default} f2{b,default} f3{a,default} f4{default} f5{a,b}
/// f6{a} f7{b} f8{} f9{a,b,never}` plus pass-through `raw`.
#[cfg(test)]
pub(crate) fn fixture_registry() -> Registry {
    use crate::types::callable;
    use serde_json::json;

    let table: [(&str, &[&str]); 9] = [
        ("f1", &["a", "b", "default"]),
        ("f2", &["b", "default"]),
        ("f3", &["a", "default"]),
        ("f4", &["default"]),
        ("f5", &["a", "b"]),
        ("f6", &["a"]),
        ("f7", &["b"]),
        ("f8", &[]),
        ("f9", &["a", "b", "never"]),
    ];

    let mut builder = RegistryBuilder::new("fixture");
    for (name, tags) in table {
        let label = name.to_string();
        builder
            .register(
                SymbolMetadata::new(name).with_tags(tags.iter().copied()),
                callable(move |_| Ok(json!(label))),
            )
            .expect("fixture symbols are unique");
    }
    builder
        .expose("raw", callable(|_| Ok(json!("raw"))))
        .expect("fixture symbols are unique");
    builder.freeze().expect("fixture registry is valid")
}
