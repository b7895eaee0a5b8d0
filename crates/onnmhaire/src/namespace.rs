//! Consumer namespaces
//!
//! The engine only asks whether a name is bound and binds names. The
//! namespace's lifecycle belongs to the consumer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::Callable;

pub trait Namespace {
    fn has_binding(&self, name: &str) -> bool;

    fn bind(&mut self, name: &str, callable: Callable);
}

/// In-memory namespace keyed by binding name
#[derive(Clone, Default)]
pub struct BindingTable {
    bindings: HashMap<String, Callable>,
    /// Names in first-bound order
    order: Vec<String>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with existing bindings
    pub fn with_bindings<I, S>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (S, Callable)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, callable) in bindings {
            let name = name.into();
            table.bind(&name, callable);
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<Callable> {
        self.bindings.get(name).map(Arc::clone)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Name → callable identity, for before/after comparisons
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        self.order
            .iter()
            .map(|name| {
                let ptr = Arc::as_ptr(&self.bindings[name]) as *const () as usize;
                (name.clone(), ptr)
            })
            .collect()
    }
}

impl Namespace for BindingTable {
    fn has_binding(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    fn bind(&mut self, name: &str, callable: Callable) {
        if self.bindings.insert(name.to_string(), callable).is_none() {
            self.order.push(name.to_string());
        }
    }
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTable")
            .field("names", &self.order)
            .finish()
    }
}
