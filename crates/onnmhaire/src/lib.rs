//! onnmhaire
//!
//! Declarative export resolution. Providers register callables with tags and
//! metadata; consumers request a subset by name, by tag or implicitly, and the
//! engine installs the resolved bindings into their namespace atomically.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod namespace;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod types;
pub mod wrap;

pub use cache::{WrapCache, WrapCacheKey};
pub use config::{default_config_path, ExporterConfig, IdentifierGrammar};
pub use engine::Exporter;
pub use error::{ExportError, ExportResult};
pub use installer::{InstallReport, Installer};
pub use manifest::{ensure_manifest_size, ProviderManifest, MAX_MANIFEST_BYTES};
pub use namespace::{BindingTable, Namespace};
pub use registry::{Registry, RegistryBuilder, DEFAULT_TAG, NEVER_TAG};
pub use request::{ExportItem, ExportRequest, ItemKind};
pub use resolver::Resolver;
pub use types::{
    callable, BindingPlan, Callable, ClashPolicy, ExportOptions, ResolvedExport, SymbolMetadata,
    WrapSpec,
};
pub use wrap::{IdentityWrapService, WrapService, WrapServiceError, WrapTarget};
