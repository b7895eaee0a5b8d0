//! Export Requests
//!
//! The consumer side of an export: an ordered list of name/tag items plus
//! request-wide options. Requests can be assembled with the builder methods
//! or parsed from the token grammar:
//!
//! - `"name"`: export a symbol by name
//! - `":tag"`: export every symbol carrying `tag`
//! - `["name-or-:tag", {options}]`: item with options
//! - `"-force"` / `"-bail"`: request-level clash policy
//! - `["-defaults", {options}]`: request-level default options

use serde_json::{Map, Value};

use crate::error::{ExportError, ExportResult};
use crate::types::{ClashPolicy, ExportOptions, WrapSpec};

/// Leading marker of a tag reference
pub const TAG_MARKER: char = ':';

/// Leading marker of a global option
pub const OPTION_MARKER: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Name,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportItem {
    pub kind: ItemKind,
    pub identifier: String,
    pub options: ExportOptions,
}

impl ExportItem {
    pub fn name(identifier: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Name,
            identifier: identifier.into(),
            options: ExportOptions::default(),
        }
    }

    pub fn tag(identifier: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Tag,
            identifier: identifier.into(),
            options: ExportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Display form used in errors and logs (`:tag` or `name`)
    pub fn label(&self) -> String {
        match self.kind {
            ItemKind::Name => self.identifier.clone(),
            ItemKind::Tag => format!("{}{}", TAG_MARKER, self.identifier),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRequest {
    pub items: Vec<ExportItem>,
    /// Request-level clash policy override
    pub clash_policy: Option<ClashPolicy>,
    /// Request-level defaults, overlaid on the configured defaults
    pub defaults: ExportOptions,
}

impl ExportRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(mut self, item: ExportItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.item(ExportItem::name(name))
    }

    pub fn name_with(self, name: impl Into<String>, options: ExportOptions) -> Self {
        self.item(ExportItem::name(name).with_options(options))
    }

    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.item(ExportItem::tag(tag))
    }

    pub fn tag_with(self, tag: impl Into<String>, options: ExportOptions) -> Self {
        self.item(ExportItem::tag(tag).with_options(options))
    }

    pub fn clash_policy(mut self, policy: ClashPolicy) -> Self {
        self.clash_policy = Some(policy);
        self
    }

    pub fn defaults(mut self, defaults: ExportOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Parse a JSON token array (see module docs)
    pub fn from_json(value: &Value) -> ExportResult<Self> {
        match value {
            Value::Array(tokens) => Self::parse(tokens),
            Value::Null => Ok(Self::default()),
            other => Err(ExportError::invalid_option(
                other.to_string(),
                "request must be an array of tokens",
            )),
        }
    }

    /// Parse request tokens in order
    pub fn parse(tokens: &[Value]) -> ExportResult<Self> {
        let mut request = Self::default();

        for token in tokens {
            match token {
                Value::String(s) => request.push_token(s, None)?,
                Value::Array(pair) => match pair.as_slice() {
                    [Value::String(s), Value::Object(opts)] => request.push_token(s, Some(opts))?,
                    [Value::String(s)] => request.push_token(s, None)?,
                    _ => {
                        return Err(ExportError::invalid_option(
                            token.to_string(),
                            "expected [identifier, {options}]",
                        ))
                    }
                },
                other => {
                    return Err(ExportError::invalid_option(
                        other.to_string(),
                        "token must be a string or an [identifier, {options}] pair",
                    ))
                }
            }
        }

        Ok(request)
    }

    fn push_token(&mut self, token: &str, options: Option<&Map<String, Value>>) -> ExportResult<()> {
        if let Some(option) = token.strip_prefix(OPTION_MARKER) {
            return self.apply_global_option(token, option, options);
        }

        let item = match token.strip_prefix(TAG_MARKER) {
            Some(tag) => ExportItem::tag(tag),
            None => ExportItem::name(token),
        };
        if item.identifier.is_empty() {
            return Err(ExportError::invalid_option(token, "empty identifier"));
        }

        let item = match options {
            Some(map) => {
                let opts = parse_options(token, map)?;
                item.with_options(opts)
            }
            None => item,
        };
        self.items.push(item);
        Ok(())
    }

    fn apply_global_option(
        &mut self,
        token: &str,
        option: &str,
        options: Option<&Map<String, Value>>,
    ) -> ExportResult<()> {
        match (option, options) {
            ("force", None) => self.clash_policy = Some(ClashPolicy::Force),
            ("bail", None) => self.clash_policy = Some(ClashPolicy::Bail),
            ("defaults", Some(map)) => {
                let opts = parse_options(token, map)?;
                self.defaults = opts.merged_onto(&self.defaults);
            }
            ("defaults", None) => {
                return Err(ExportError::invalid_option(token, "requires an options map"))
            }
            _ => return Err(ExportError::invalid_option(token, "unknown global option")),
        }
        Ok(())
    }
}

/// Parse an options map, rejecting unknown keys and ill-typed values
pub fn parse_options(item: &str, map: &Map<String, Value>) -> ExportResult<ExportOptions> {
    let mut opts = ExportOptions::default();

    for (key, value) in map {
        match key.as_str() {
            "as" => opts.as_name = Some(expect_string(item, key, value)?),
            "prefix" => opts.prefix = Some(expect_string(item, key, value)?),
            "suffix" => opts.suffix = Some(expect_string(item, key, value)?),
            "wrap" => {
                let spec = WrapSpec::from_setting(value)
                    .map_err(|reason| ExportError::invalid_option(item, reason))?;
                opts.wrap = Some(spec);
            }
            "clash" => {
                let raw = expect_string(item, key, value)?;
                let policy = raw
                    .parse::<ClashPolicy>()
                    .map_err(|reason| ExportError::invalid_option(item, reason))?;
                opts.clash = Some(policy);
            }
            other => {
                return Err(ExportError::invalid_option(
                    item,
                    format!("unknown option '{}'", other),
                ))
            }
        }
    }

    Ok(opts)
}

fn expect_string(item: &str, key: &str, value: &Value) -> ExportResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ExportError::invalid_option(item, format!("'{}' must be a string", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_names_and_tags() {
        let request = ExportRequest::from_json(&json!(["f5", ":b", "f6"])).unwrap();
        assert_eq!(
            request.items,
            vec![ExportItem::name("f5"), ExportItem::tag("b"), ExportItem::name("f6")]
        );
        assert_eq!(request.clash_policy, None);
    }

    #[test]
    fn test_parse_item_with_options() {
        let request =
            ExportRequest::from_json(&json!([[":b", {"prefix": "x_", "wrap": false}]])).unwrap();
        let item = &request.items[0];
        assert_eq!(item.kind, ItemKind::Tag);
        assert_eq!(item.options.prefix.as_deref(), Some("x_"));
        assert_eq!(item.options.wrap, Some(WrapSpec::disabled()));
    }

    #[test]
    fn test_parse_global_options() {
        let request = ExportRequest::from_json(&json!([
            "-force",
            ["-defaults", {"suffix": "_v1"}],
            "f1"
        ]))
        .unwrap();
        assert_eq!(request.clash_policy, Some(ClashPolicy::Force));
        assert_eq!(request.defaults.suffix.as_deref(), Some("_v1"));
        assert_eq!(request.items.len(), 1);
    }

    #[test]
    fn test_last_policy_token_wins() {
        let request = ExportRequest::from_json(&json!(["-force", "-bail"])).unwrap();
        assert_eq!(request.clash_policy, Some(ClashPolicy::Bail));
        assert!(request.is_empty());
    }

    #[test]
    fn test_unknown_option_key_rejected() {
        let err = ExportRequest::from_json(&json!([["f1", {"alias": "g"}]])).unwrap_err();
        assert_eq!(err.kind(), "invalid_option");
    }

    #[test]
    fn test_unknown_global_option_rejected() {
        let err = ExportRequest::from_json(&json!(["-sideways"])).unwrap_err();
        assert_eq!(err.kind(), "invalid_option");
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        assert!(ExportRequest::from_json(&json!([42])).is_err());
        assert!(ExportRequest::from_json(&json!([["f1", "x"]])).is_err());
        assert!(ExportRequest::from_json(&json!([":"])).is_err());
        assert!(ExportRequest::from_json(&json!({"f1": {}})).is_err());
        assert!(ExportRequest::from_json(&json!([["f1", {"clash": "maybe"}]])).is_err());
    }

    #[test]
    fn test_null_request_is_empty() {
        assert!(ExportRequest::from_json(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_builder_matches_parser() {
        let built = ExportRequest::new()
            .name("f1")
            .tag_with(
                "a",
                ExportOptions {
                    suffix: Some("_a".into()),
                    ..Default::default()
                },
            )
            .clash_policy(ClashPolicy::Force);
        let parsed =
            ExportRequest::from_json(&json!(["f1", [":a", {"suffix": "_a"}], "-force"])).unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_item_label() {
        assert_eq!(ExportItem::tag("b").label(), ":b");
        assert_eq!(ExportItem::name("f1").label(), "f1");
    }
}
