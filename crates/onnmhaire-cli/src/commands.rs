use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use onnmhaire::{
    callable, default_config_path, ensure_manifest_size, BindingTable, Callable, ExportRequest, Exporter,
    ExporterConfig, IdentityWrapService, ProviderManifest, Registry, SymbolMetadata, WrapCache,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::output::{failure, success, CommandResponse};

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ExporterConfig> {
    let config = match path {
        Some(path) => ExporterConfig::load(path)?,
        None => match default_config_path() {
            Some(path) => ExporterConfig::load_or_default(&path)?,
            None => ExporterConfig::default(),
        },
    };
    Ok(config)
}

async fn load_registry(path: &Path, config: &ExporterConfig) -> anyhow::Result<Registry> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("failed to stat manifest {}", path.display()))?;
    ensure_manifest_size(path, metadata.len())?;

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest = ProviderManifest::from_json(&content)?;
    let registry = manifest.build_registry(&config.never_tag, stub_callable)?;
    debug!("Loaded {} symbols from {}", registry.len(), path.display());
    Ok(registry)
}

/// Manifests carry no code; bound symbols echo their name and arguments
fn stub_callable(name: &str, _meta: Option<&SymbolMetadata>) -> Callable {
    let name = name.to_string();
    callable(move |args| Ok(json!({"symbol": name, "args": args})))
}

fn parse_request(raw: Option<&str>) -> anyhow::Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("request must be a JSON array of tokens"),
        None => Ok(Value::Null),
    }
}

fn build_exporter(registry: Registry, config: ExporterConfig) -> anyhow::Result<Exporter> {
    let cache = Arc::new(WrapCache::new(Arc::new(IdentityWrapService)));
    Ok(Exporter::with_config(Arc::new(registry), cache, config)?)
}

pub async fn tags(manifest: &Path, config: &ExporterConfig) -> anyhow::Result<CommandResponse> {
    let registry = load_registry(manifest, config).await?;

    let mut index = serde_json::Map::new();
    for tag in registry.tags() {
        index.insert(tag.clone(), json!(registry.lookup_by_tag(tag)));
    }

    Ok(success(json!({
        "provider": registry.provider(),
        "tags": index,
        "defaults": registry.default_names(),
    })))
}

pub async fn plan(
    manifest: &Path,
    request: Option<&str>,
    config: ExporterConfig,
) -> anyhow::Result<CommandResponse> {
    let registry = load_registry(manifest, &config).await?;
    let exporter = build_exporter(registry, config)?;

    let response = match ExportRequest::from_json(&parse_request(request)?)
        .and_then(|req| exporter.plan(&req))
    {
        Ok(plan) => success(serde_json::to_value(&plan)?),
        Err(e) => failure(&e),
    };
    Ok(response)
}

pub async fn install(
    manifest: &Path,
    existing: &[String],
    request: Option<&str>,
    config: ExporterConfig,
) -> anyhow::Result<CommandResponse> {
    let registry = load_registry(manifest, &config).await?;
    let exporter = build_exporter(registry, config)?;

    let mut namespace = BindingTable::with_bindings(
        existing
            .iter()
            .map(|name| (name.clone(), callable(|_| Ok(Value::Null)))),
    );

    let response = match ExportRequest::from_json(&parse_request(request)?)
        .and_then(|req| exporter.import(&req, &mut namespace))
    {
        Ok(report) => success(json!({
            "report": report,
            "namespace": namespace.names(),
        })),
        Err(e) => failure(&e),
    };
    Ok(response)
}
