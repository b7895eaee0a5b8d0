//! Clash Resolver & Installer
//!
//! Validates a binding plan against a namespace, materializes every callable,
//! then commits. All checks run before the first `bind`, so a failed install
//! leaves the namespace exactly as it was.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::WrapCache;
use crate::error::{ExportError, ExportResult};
use crate::namespace::Namespace;
use crate::registry::Registry;
use crate::types::{BindingPlan, Callable, ClashPolicy};

/// Outcome of a committed install
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Target names bound, in plan order
    pub bound: Vec<String>,
    /// Targets that replaced an existing binding under `force`
    pub forced: Vec<String>,
}

pub struct Installer<'a> {
    registry: &'a Registry,
    cache: &'a WrapCache,
    default_policy: ClashPolicy,
}

impl<'a> Installer<'a> {
    pub fn new(registry: &'a Registry, cache: &'a WrapCache, default_policy: ClashPolicy) -> Self {
        Self {
            registry,
            cache,
            default_policy,
        }
    }

    /// Item policy, else request policy, else the install-time default
    pub fn effective_policy(
        &self,
        item: Option<ClashPolicy>,
        request: Option<ClashPolicy>,
    ) -> ClashPolicy {
        item.or(request).unwrap_or(self.default_policy)
    }

    /// Check every target against the namespace without mutating it
    pub fn validate<N>(
        &self,
        plan: &BindingPlan,
        request_policy: Option<ClashPolicy>,
        namespace: &N,
    ) -> ExportResult<Vec<String>>
    where
        N: Namespace + ?Sized,
    {
        let mut forced = Vec::new();

        for entry in plan {
            if !namespace.has_binding(&entry.target) {
                continue;
            }
            match self.effective_policy(entry.clash, request_policy) {
                ClashPolicy::Bail => return Err(ExportError::NameClash(entry.target.clone())),
                ClashPolicy::Force => forced.push(entry.target.clone()),
            }
        }

        Ok(forced)
    }

    pub fn install<N>(
        &self,
        plan: &BindingPlan,
        request_policy: Option<ClashPolicy>,
        namespace: &mut N,
    ) -> ExportResult<InstallReport>
    where
        N: Namespace + ?Sized,
    {
        let forced = self.validate(plan, request_policy, namespace)?;

        let callables = plan
            .iter()
            .map(|entry| {
                let callable = self
                    .cache
                    .materialize(self.registry, &entry.source, &entry.wrap)?;
                Ok((entry.target.as_str(), callable))
            })
            .collect::<ExportResult<Vec<(&str, Callable)>>>()?;

        let mut bound = Vec::with_capacity(callables.len());
        for (target, callable) in callables {
            debug!("Binding {}", target);
            namespace.bind(target, callable);
            bound.push(target.to_string());
        }

        for target in &forced {
            warn!("Replaced existing binding {}", target);
        }
        info!(
            "Installed {} exports from {} ({} forced)",
            bound.len(),
            self.registry.provider(),
            forced.len()
        );

        Ok(InstallReport { bound, forced })
    }
}
