//! Export Spec Resolver
//!
//! Expands an [`ExportRequest`] against a frozen [`Registry`] into a
//! [`BindingPlan`]. Resolution never touches a namespace or the wrap cache,
//! so a failed resolution has no side effects.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::IdentifierGrammar;
use crate::error::{ExportError, ExportResult};
use crate::registry::{Registry, DEFAULT_TAG};
use crate::request::{ExportItem, ExportRequest, ItemKind};
use crate::types::{BindingPlan, ExportOptions, ResolvedExport};

pub struct Resolver<'a> {
    registry: &'a Registry,
    defaults: &'a ExportOptions,
    grammar: &'a IdentifierGrammar,
    default_tag: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a Registry,
        defaults: &'a ExportOptions,
        grammar: &'a IdentifierGrammar,
    ) -> Self {
        Self {
            registry,
            defaults,
            grammar,
            default_tag: DEFAULT_TAG,
        }
    }

    /// Tag expanded for an empty request
    pub fn with_default_tag(mut self, tag: &'a str) -> Self {
        self.default_tag = tag;
        self
    }

    pub fn resolve(&self, request: &ExportRequest) -> ExportResult<BindingPlan> {
        let base = request.defaults.merged_onto(self.defaults);
        if base.as_name.is_some() {
            return Err(ExportError::invalid_option(
                "-defaults",
                "'as' cannot be set as a default",
            ));
        }

        let implicit;
        let items: &[ExportItem] = if request.is_empty() {
            implicit = self.implicit_items();
            &implicit
        } else {
            &request.items
        };

        // First-appearance order of each symbol, with its last-specified options
        let mut order: Vec<&str> = Vec::new();
        let mut selected: HashMap<&str, ExportOptions> = HashMap::new();

        for item in items {
            let mut options = item.options.merged_onto(&base);
            // Default-level clash policies rank below the request's; the
            // installer applies them as fallbacks
            options.clash = item.options.clash;

            match item.kind {
                ItemKind::Name => {
                    let name = item.identifier.as_str();
                    if !self.registry.is_exportable(name) {
                        return Err(ExportError::UnknownSymbol(name.to_string()));
                    }
                    select(&mut order, &mut selected, name, options);
                }
                ItemKind::Tag => {
                    if item.options.as_name.is_some() {
                        return Err(ExportError::invalid_option(
                            item.label(),
                            "'as' is only valid on name items",
                        ));
                    }
                    let members = self.registry.lookup_by_tag(&item.identifier);
                    if members.is_empty() {
                        if request.is_empty() {
                            info!(
                                "Provider {} declares no default exports",
                                self.registry.provider()
                            );
                        } else {
                            warn!(
                                "Tag {} matches no exportable symbols in {}",
                                item.label(),
                                self.registry.provider()
                            );
                        }
                    }
                    debug!("Expanded {} to {} symbols", item.label(), members.len());
                    for name in members {
                        select(&mut order, &mut selected, name, options.clone());
                    }
                }
            }
        }

        let mut claimed: HashMap<String, &str> = HashMap::new();
        let mut entries = Vec::with_capacity(order.len());

        for source in order {
            let options = &selected[source];
            let target = options.target_name(source);

            match claimed.entry(target.clone()) {
                Entry::Occupied(existing) => {
                    return Err(ExportError::TargetNameCollision {
                        target,
                        first: existing.get().to_string(),
                        second: source.to_string(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(source);
                }
            }

            if !self.grammar.is_valid(&target) {
                return Err(ExportError::InvalidIdentifier(target));
            }

            entries.push(ResolvedExport {
                source: source.to_string(),
                target,
                wrap: options.effective_wrap(),
                clash: options.clash,
            });
        }

        debug!(
            "Resolved {} items into {} bindings for {}",
            items.len(),
            entries.len(),
            self.registry.provider()
        );
        Ok(BindingPlan::new(entries))
    }

    fn implicit_items(&self) -> Vec<ExportItem> {
        match self.registry.default_names() {
            Some(names) => names.iter().map(ExportItem::name).collect(),
            None => vec![ExportItem::tag(self.default_tag)],
        }
    }
}

fn select<'n>(
    order: &mut Vec<&'n str>,
    selected: &mut HashMap<&'n str, ExportOptions>,
    name: &'n str,
    options: ExportOptions,
) {
    if selected.insert(name, options).is_none() {
        order.push(name);
    }
}
