//! Export Types
//!
//! Symbol metadata, export options, wrap specifications and the binding plan.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// An exported capability. Arguments and results travel as JSON values.
pub type Callable = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Wrap a plain closure as a [`Callable`]
pub fn callable<F>(f: F) -> Callable
where
    F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Provider-declared metadata for one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Parameter name → position
    #[serde(default, rename = "args", skip_serializing_if = "Option::is_none")]
    pub arg_spec: Option<BTreeMap<String, usize>>,
}

impl SymbolMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            arg_spec: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_arg_spec<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        self.arg_spec = Some(params.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Parameter names ordered by declared position
    pub fn ordered_params(&self) -> Vec<&str> {
        let Some(spec) = &self.arg_spec else {
            return Vec::new();
        };
        let mut params: Vec<(&str, usize)> = spec.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        params.sort_by_key(|(_, pos)| *pos);
        params.into_iter().map(|(name, _)| name).collect()
    }
}

/// Behavioural transformation requested for an exported callable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapSpec {
    pub enabled: bool,
    #[serde(default)]
    pub conversion: BTreeMap<String, Value>,
}

impl Default for WrapSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            conversion: BTreeMap::new(),
        }
    }
}

impl WrapSpec {
    /// Unwrapped: the raw callable is exported as-is
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            conversion: BTreeMap::new(),
        }
    }

    pub fn with_conversion(conversion: BTreeMap<String, Value>) -> Self {
        Self {
            enabled: true,
            conversion,
        }
    }

    pub fn is_default(&self) -> bool {
        self.enabled && self.conversion.is_empty()
    }

    /// Deterministic textual form, used as the cache key component
    pub fn canonical_form(&self) -> String {
        // BTreeMap keys serialize sorted, so equal specs produce equal strings
        let conversion = serde_json::to_string(&self.conversion).unwrap_or_default();
        format!("{}:{}", self.enabled, conversion)
    }

    /// Parse the request-grammar form: `true`, `false`, or a conversion object
    pub fn from_setting(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(true) => Ok(Self::default()),
            Value::Bool(false) => Ok(Self::disabled()),
            Value::Object(map) => Ok(Self::with_conversion(
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
            other => Err(format!(
                "wrap must be a boolean or an object, got {}",
                other
            )),
        }
    }
}

fn deserialize_wrap_setting<'de, D>(deserializer: D) -> Result<Option<WrapSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => WrapSpec::from_setting(&v)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// What to do when a target name is already bound in the namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClashPolicy {
    Force,
    #[default]
    Bail,
}

impl FromStr for ClashPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "force" => Ok(Self::Force),
            "bail" => Ok(Self::Bail),
            other => Err(format!("unknown clash policy: {}", other)),
        }
    }
}

impl fmt::Display for ClashPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Force => f.write_str("force"),
            Self::Bail => f.write_str("bail"),
        }
    }
}

/// Per-item (or default-level) export customization. Unset fields inherit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportOptions {
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub as_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_wrap_setting",
        skip_serializing_if = "Option::is_none"
    )]
    pub wrap: Option<WrapSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clash: Option<ClashPolicy>,
}

impl ExportOptions {
    /// Overlay `self` onto `base`, field by field
    pub fn merged_onto(&self, base: &ExportOptions) -> ExportOptions {
        ExportOptions {
            as_name: self.as_name.clone().or_else(|| base.as_name.clone()),
            prefix: self.prefix.clone().or_else(|| base.prefix.clone()),
            suffix: self.suffix.clone().or_else(|| base.suffix.clone()),
            wrap: self.wrap.clone().or_else(|| base.wrap.clone()),
            clash: self.clash.or(base.clash),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ExportOptions::default()
    }

    /// `as` wins outright, else `prefix + symbol + suffix`
    pub fn target_name(&self, symbol: &str) -> String {
        if let Some(name) = &self.as_name {
            return name.clone();
        }
        format!(
            "{}{}{}",
            self.prefix.as_deref().unwrap_or(""),
            symbol,
            self.suffix.as_deref().unwrap_or("")
        )
    }

    pub fn effective_wrap(&self) -> WrapSpec {
        self.wrap.clone().unwrap_or_default()
    }
}

/// One binding to be made
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedExport {
    pub source: String,
    pub target: String,
    pub wrap: WrapSpec,
    /// Item-level clash policy, if the request set one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clash: Option<ClashPolicy>,
}

/// Ordered, collision-free set of bindings produced by one resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BindingPlan {
    entries: Vec<ResolvedExport>,
}

impl BindingPlan {
    pub(crate) fn new(entries: Vec<ResolvedExport>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ResolvedExport] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedExport> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_target(&self, target: &str) -> Option<&ResolvedExport> {
        self.entries.iter().find(|e| e.target == target)
    }

    pub fn by_source(&self, source: &str) -> Option<&ResolvedExport> {
        self.entries.iter().find(|e| e.source == source)
    }

    /// `(source, target)` pairs in plan order
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a BindingPlan {
    type Item = &'a ResolvedExport;
    type IntoIter = std::slice::Iter<'a, ResolvedExport>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_wrap_spec() {
        let spec = WrapSpec::default();
        assert!(spec.is_default());
        assert!(!WrapSpec::disabled().is_default());
    }

    #[test]
    fn test_wrap_spec_structural_equality() {
        let a = WrapSpec::from_setting(&json!({"timeout": 5, "retry": {"max": 2}})).unwrap();
        let b = WrapSpec::from_setting(&json!({"retry": {"max": 2}, "timeout": 5})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical_form(), b.canonical_form());
        assert_ne!(a.canonical_form(), WrapSpec::default().canonical_form());
    }

    #[test]
    fn test_wrap_setting_rejects_strings() {
        assert!(WrapSpec::from_setting(&json!("yes")).is_err());
    }

    #[test]
    fn test_options_merge_field_by_field() {
        let defaults = ExportOptions {
            prefix: Some("p_".into()),
            suffix: Some("_s".into()),
            ..Default::default()
        };
        let item = ExportOptions {
            prefix: Some("x_".into()),
            ..Default::default()
        };
        let merged = item.merged_onto(&defaults);
        assert_eq!(merged.prefix.as_deref(), Some("x_"));
        assert_eq!(merged.suffix.as_deref(), Some("_s"));
        assert_eq!(merged.target_name("f1"), "x_f1_s");
    }

    #[test]
    fn test_as_wins_over_affixes() {
        let opts = ExportOptions {
            as_name: Some("renamed".into()),
            prefix: Some("x_".into()),
            ..Default::default()
        };
        assert_eq!(opts.target_name("f1"), "renamed");
    }

    #[test]
    fn test_options_deserialize_wrap_forms() {
        let opts: ExportOptions = serde_json::from_value(json!({"wrap": false})).unwrap();
        assert_eq!(opts.wrap, Some(WrapSpec::disabled()));

        let opts: ExportOptions =
            serde_json::from_value(json!({"wrap": {"style": "named"}, "clash": "force"})).unwrap();
        assert!(opts.wrap.as_ref().is_some_and(|w| w.enabled));
        assert_eq!(opts.clash, Some(ClashPolicy::Force));

        assert!(serde_json::from_value::<ExportOptions>(json!({"alias": "x"})).is_err());
    }

    #[test]
    fn test_ordered_params() {
        let meta = SymbolMetadata::new("f").with_arg_spec([("b", 1), ("a", 0)]);
        assert_eq!(meta.ordered_params(), vec!["a", "b"]);
    }

    #[test]
    fn test_clash_policy_parse() {
        assert_eq!("force".parse::<ClashPolicy>(), Ok(ClashPolicy::Force));
        assert!("maybe".parse::<ClashPolicy>().is_err());
        assert_eq!(ClashPolicy::default(), ClashPolicy::Bail);
    }
}
