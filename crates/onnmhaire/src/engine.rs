//! Exporter
//!
//! Ties a provider's frozen registry, a shared wrap cache and install-time
//! configuration together. One `import` call is one resolution batch:
//! resolve, validate, materialize, commit.

use std::sync::Arc;
use tracing::debug;

use crate::cache::WrapCache;
use crate::config::{ExporterConfig, IdentifierGrammar};
use crate::error::{ExportError, ExportResult};
use crate::installer::{InstallReport, Installer};
use crate::namespace::Namespace;
use crate::registry::Registry;
use crate::request::ExportRequest;
use crate::resolver::Resolver;
use crate::types::BindingPlan;
use crate::wrap::WrapService;

pub struct Exporter {
    registry: Arc<Registry>,
    cache: Arc<WrapCache>,
    config: ExporterConfig,
    grammar: IdentifierGrammar,
}

impl Exporter {
    /// Exporter with default configuration and a private cache
    pub fn new(registry: Arc<Registry>, service: Arc<dyn WrapService>) -> Self {
        Self {
            registry,
            cache: Arc::new(WrapCache::new(service)),
            config: ExporterConfig::default(),
            grammar: IdentifierGrammar::default(),
        }
    }

    /// Exporter sharing `cache` with other exporters
    pub fn with_config(
        registry: Arc<Registry>,
        cache: Arc<WrapCache>,
        config: ExporterConfig,
    ) -> ExportResult<Self> {
        config.validate()?;
        if config.never_tag != registry.never_tag() {
            return Err(ExportError::Config(format!(
                "never tag '{}' does not match registry {} (built with '{}')",
                config.never_tag,
                registry.provider(),
                registry.never_tag()
            )));
        }
        let grammar = config.identifier_grammar()?;
        Ok(Self {
            registry,
            cache,
            config,
            grammar,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<WrapCache> {
        &self.cache
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Resolve without touching any namespace
    pub fn plan(&self, request: &ExportRequest) -> ExportResult<BindingPlan> {
        Resolver::new(&self.registry, &self.config.defaults, &self.grammar)
            .with_default_tag(&self.config.default_tag)
            .resolve(request)
    }

    /// Resolve `request` and install it into `namespace`, all or nothing
    pub fn import<N>(&self, request: &ExportRequest, namespace: &mut N) -> ExportResult<InstallReport>
    where
        N: Namespace + ?Sized,
    {
        let plan = self.plan(request)?;
        debug!(
            "Installing {} bindings from {}",
            plan.len(),
            self.registry.provider()
        );
        // Item, then request (explicit flag over its -defaults), then config
        let request_policy = request.clash_policy.or(request.defaults.clash);
        let default_policy = self
            .config
            .defaults
            .clash
            .unwrap_or(self.config.clash_policy);
        Installer::new(&self.registry, &self.cache, default_policy).install(
            &plan,
            request_policy,
            namespace,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::CountingWrapService;
    use crate::namespace::BindingTable;
    use crate::registry::fixture_registry;
    use crate::types::{callable, ClashPolicy, ExportOptions, WrapSpec};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn exporter() -> (Exporter, Arc<CountingWrapService>) {
        let service = Arc::new(CountingWrapService::default());
        let exporter = Exporter::new(Arc::new(fixture_registry()), service.clone());
        (exporter, service)
    }

    fn request(tokens: serde_json::Value) -> ExportRequest {
        ExportRequest::from_json(&tokens).unwrap()
    }

    #[test]
    fn test_empty_request_installs_defaults() {
        let (exporter, _) = exporter();
        let mut ns = BindingTable::new();
        let report = exporter.import(&ExportRequest::new(), &mut ns).unwrap();
        assert_eq!(report.bound, vec!["f1", "f2", "f3", "f4"]);
        assert_eq!(ns.names(), ["f1", "f2", "f3", "f4"]);
    }

    #[test]
    fn test_named_request_leaves_others_untouched() {
        let (exporter, _) = exporter();
        let mut ns = BindingTable::new();
        exporter.import(&request(json!(["f5", "f6"])), &mut ns).unwrap();
        assert_eq!(ns.names(), ["f5", "f6"]);
        for name in ["f7", "f8", "f9"] {
            assert!(!ns.has_binding(name));
        }
    }

    #[test]
    fn test_clash_scenario() {
        let (exporter, service) = exporter();
        let mut ns = BindingTable::with_bindings([("f1", callable(|_| Ok(json!("mine"))))]);
        let before = ns.snapshot();

        let err = exporter.import(&request(json!(["f1"])), &mut ns).unwrap_err();
        assert_eq!(err, ExportError::NameClash("f1".into()));
        assert_eq!(ns.snapshot(), before);
        assert_eq!(service.calls(), 0);
    }

    #[test]
    fn test_resolution_error_never_touches_namespace() {
        let (exporter, service) = exporter();
        let mut ns = BindingTable::new();
        let err = exporter
            .import(&request(json!(["f1", "f9"])), &mut ns)
            .unwrap_err();
        assert_eq!(err, ExportError::UnknownSymbol("f9".into()));
        assert!(ns.is_empty());
        assert_eq!(service.calls(), 0);
    }

    #[test]
    fn test_default_spec_shared_across_consumers() {
        let (exporter, service) = exporter();
        let mut first = BindingTable::new();
        let mut second = BindingTable::new();

        exporter.import(&request(json!(["f1"])), &mut first).unwrap();
        exporter
            .import(&request(json!([["f1", {"as": "one"}]])), &mut second)
            .unwrap();

        assert_eq!(service.calls(), 1);
        assert!(Arc::ptr_eq(
            &first.get("f1").unwrap(),
            &second.get("one").unwrap()
        ));
    }

    #[test]
    fn test_custom_specs_wrap_independently() {
        let (exporter, service) = exporter();
        let mut first = BindingTable::new();
        let mut second = BindingTable::new();

        exporter
            .import(&request(json!([["f1", {"wrap": {"timeout": 5}}]])), &mut first)
            .unwrap();
        exporter
            .import(&request(json!([["f1", {"wrap": {"retry": 3}}]])), &mut second)
            .unwrap();

        assert_eq!(service.calls(), 2);
        assert!(exporter.cache().is_empty());
    }

    #[test]
    fn test_concurrent_consumers_share_wrapping() {
        let (exporter, service) = exporter();

        let namespaces: Vec<BindingTable> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..6)
                .map(|_| {
                    s.spawn(|| {
                        let mut ns = BindingTable::new();
                        exporter.import(&ExportRequest::new(), &mut ns).unwrap();
                        ns
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // One wrap per default symbol, regardless of consumer count
        assert_eq!(service.calls(), 4);
        assert!(namespaces.iter().all(|ns| ns.len() == 4));
    }

    #[test]
    fn test_config_defaults_and_policy() {
        let registry = Arc::new(fixture_registry());
        let cache = Arc::new(WrapCache::new(Arc::new(CountingWrapService::default())));
        let config = ExporterConfig {
            clash_policy: ClashPolicy::Force,
            defaults: ExportOptions {
                prefix: Some("lib_".into()),
                wrap: Some(WrapSpec::disabled()),
                ..Default::default()
            },
            ..Default::default()
        };
        let exporter = Exporter::with_config(registry, cache, config).unwrap();

        let mut ns = BindingTable::with_bindings([("lib_f6", callable(|_| Ok(json!("old"))))]);
        let report = exporter.import(&request(json!(["f6"])), &mut ns).unwrap();
        assert_eq!(report.forced, vec!["lib_f6"]);
        assert_eq!(ns.get("lib_f6").unwrap()(&[]).unwrap(), json!("f6"));
    }

    fn exporter_with_default_clash(clash: ClashPolicy) -> Exporter {
        let registry = Arc::new(fixture_registry());
        let cache = Arc::new(WrapCache::new(Arc::new(CountingWrapService::default())));
        let config = ExporterConfig {
            defaults: ExportOptions {
                clash: Some(clash),
                ..Default::default()
            },
            ..Default::default()
        };
        Exporter::with_config(registry, cache, config).unwrap()
    }

    #[test]
    fn test_request_force_beats_configured_default_clash() {
        let exporter = exporter_with_default_clash(ClashPolicy::Bail);
        let mut ns = BindingTable::with_bindings([("f1", callable(|_| Ok(json!("old"))))]);

        let report = exporter
            .import(&request(json!(["-force", "f1"])), &mut ns)
            .unwrap();
        assert_eq!(report.forced, vec!["f1"]);
        assert_eq!(ns.get("f1").unwrap()(&[]).unwrap(), json!({"wrapped": "f1"}));
    }

    #[test]
    fn test_request_bail_beats_configured_default_clash() {
        let exporter = exporter_with_default_clash(ClashPolicy::Force);
        let mut ns = BindingTable::with_bindings([("f1", callable(|_| Ok(json!("old"))))]);
        let before = ns.snapshot();

        let err = exporter
            .import(&request(json!(["-bail", "f1"])), &mut ns)
            .unwrap_err();
        assert_eq!(err, ExportError::NameClash("f1".into()));
        assert_eq!(ns.snapshot(), before);
    }

    #[test]
    fn test_configured_default_clash_applies_without_request_policy() {
        let exporter = exporter_with_default_clash(ClashPolicy::Force);
        let mut ns = BindingTable::with_bindings([("f1", callable(|_| Ok(json!("old"))))]);

        let report = exporter.import(&request(json!(["f1"])), &mut ns).unwrap();
        assert_eq!(report.forced, vec!["f1"]);
    }

    #[test]
    fn test_request_defaults_clash_beats_config() {
        let exporter = exporter_with_default_clash(ClashPolicy::Bail);
        let mut ns = BindingTable::with_bindings([("f1", callable(|_| Ok(json!("old"))))]);

        let report = exporter
            .import(&request(json!([["-defaults", {"clash": "force"}], "f1"])), &mut ns)
            .unwrap();
        assert_eq!(report.forced, vec!["f1"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let registry = Arc::new(fixture_registry());
        let cache = Arc::new(WrapCache::new(Arc::new(CountingWrapService::default())));
        let config = ExporterConfig {
            identifier_pattern: "(".into(),
            ..Default::default()
        };
        let err = Exporter::with_config(registry, cache, config).err().unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_never_tag_must_match_registry() {
        let cache = Arc::new(WrapCache::new(Arc::new(CountingWrapService::default())));
        let config = ExporterConfig {
            never_tag: "hidden".into(),
            ..Default::default()
        };
        let err = Exporter::with_config(Arc::new(fixture_registry()), cache.clone(), config.clone())
            .err()
            .unwrap();
        assert_eq!(err.kind(), "config");

        let mut builder = crate::registry::RegistryBuilder::new("fixture").with_never_tag("hidden");
        builder
            .register(
                crate::types::SymbolMetadata::new("secret").with_tags(["default", "hidden"]),
                callable(|_| Ok(json!("secret"))),
            )
            .unwrap();
        let exporter = Exporter::with_config(Arc::new(builder.freeze().unwrap()), cache, config).unwrap();
        let err = exporter
            .import(&request(json!(["secret"])), &mut BindingTable::new())
            .unwrap_err();
        assert_eq!(err, ExportError::UnknownSymbol("secret".into()));
    }

    #[test]
    fn test_shared_cache_across_exporters() {
        let registry = Arc::new(fixture_registry());
        let service = Arc::new(CountingWrapService::default());
        let cache = Arc::new(WrapCache::new(service.clone()));
        let a = Exporter::with_config(registry.clone(), cache.clone(), ExporterConfig::default())
            .unwrap();
        let b = Exporter::with_config(registry, cache, ExporterConfig::default()).unwrap();

        a.import(&request(json!(["f2"])), &mut BindingTable::new()).unwrap();
        b.import(&request(json!(["f2"])), &mut BindingTable::new()).unwrap();
        assert_eq!(service.calls(), 1);
    }

    #[test]
    fn test_plan_with_conversion_spec() {
        let (exporter, _) = exporter();
        let plan = exporter
            .plan(&request(json!([["f1", {"wrap": {"style": "named"}}]])))
            .unwrap();
        let mut expected = BTreeMap::new();
        expected.insert("style".to_string(), json!("named"));
        assert_eq!(plan.by_source("f1").unwrap().wrap, WrapSpec::with_conversion(expected));
    }
}
