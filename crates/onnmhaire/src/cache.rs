//! Wrap Variant Cache
//!
//! Memoizes default-spec wrapped variants per `(registry, symbol)`. Each key
//! owns a single-initialization cell, so concurrent requesters of one key
//! wait for a single Wrap Service call while unrelated keys proceed
//! independently. Non-default specs bypass the cache entirely.

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ExportError, ExportResult};
use crate::registry::Registry;
use crate::types::{Callable, WrapSpec};
use crate::wrap::{WrapService, WrapTarget};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WrapCacheKey {
    /// [`Registry::id`], so same-named providers never share variants
    registry: u64,
    symbol: String,
    spec: String,
}

impl WrapCacheKey {
    pub fn new(registry: u64, symbol: &str, spec: &WrapSpec) -> Self {
        Self {
            registry,
            symbol: symbol.to_string(),
            spec: spec.canonical_form(),
        }
    }
}

pub struct WrapCache {
    service: Arc<dyn WrapService>,
    cells: DashMap<WrapCacheKey, Arc<OnceCell<Callable>>>,
}

impl WrapCache {
    pub fn new(service: Arc<dyn WrapService>) -> Self {
        Self {
            service,
            cells: DashMap::new(),
        }
    }

    /// Produce the callable to bind for `symbol` under `spec`
    pub fn materialize(
        &self,
        registry: &Registry,
        symbol: &str,
        spec: &WrapSpec,
    ) -> ExportResult<Callable> {
        let raw = registry
            .callable(symbol)
            .ok_or_else(|| ExportError::UnknownSymbol(symbol.to_string()))?;

        if !spec.enabled {
            debug!("Wrapping disabled for {}, binding raw callable", symbol);
            return Ok(raw);
        }

        let target = WrapTarget {
            provider: registry.provider(),
            symbol,
            metadata: registry.lookup_by_name(symbol),
            callable: &raw,
        };

        if !spec.is_default() {
            debug!("Custom wrap spec for {}, materializing fresh variant", symbol);
            return self.call_service(&target, spec);
        }

        let key = WrapCacheKey::new(registry.id(), symbol, spec);
        // Clone the cell out so the shard lock is released before wrapping
        let cell = Arc::clone(self.cells.entry(key).or_default().value());

        if let Some(wrapped) = cell.get() {
            debug!("Wrap cache hit for {}::{}", registry.provider(), symbol);
            return Ok(Arc::clone(wrapped));
        }

        let wrapped = cell.get_or_try_init(|| {
            debug!("Wrap cache miss for {}::{}", registry.provider(), symbol);
            self.call_service(&target, spec)
        })?;
        Ok(Arc::clone(wrapped))
    }

    fn call_service(&self, target: &WrapTarget<'_>, spec: &WrapSpec) -> ExportResult<Callable> {
        self.service
            .wrap(target, spec)
            .map_err(|e| ExportError::WrapFailure {
                symbol: target.symbol.to_string(),
                message: e.0,
            })
    }

    /// Whether a default-spec variant of `symbol` from `registry` is cached
    pub fn contains(&self, registry: &Registry, symbol: &str) -> bool {
        let key = WrapCacheKey::new(registry.id(), symbol, &WrapSpec::default());
        self.cells
            .get(&key)
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Number of cached variants
    pub fn len(&self) -> usize {
        self.cells
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cells.clear();
    }
}
