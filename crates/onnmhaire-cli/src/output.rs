use onnmhaire::ExportError;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
    pub kind: String,
    pub message: String,
}

pub fn success(result: Value) -> CommandResponse {
    CommandResponse {
        ok: true,
        result: Some(result),
        error: None,
    }
}

/// Engine errors are reported as data, not as a process failure
pub fn failure(err: &ExportError) -> CommandResponse {
    CommandResponse {
        ok: false,
        result: None,
        error: Some(CommandError {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_kind() {
        let resp = failure(&ExportError::NameClash("f1".into()));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "name_clash");
        assert!(json.get("result").is_none());
    }
}
