//! The opaque profile document moved between upstream, store and clients

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One user's profile statistics as returned by the upstream API
///
/// The document is treated as an opaque JSON value. Nested fields such as
/// `game_stats` and `cs_fields` are carried through untouched for the widget
/// that renders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Value);

impl Snapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_as_bare_document() {
        let snapshot = Snapshot::new(json!({ "game_stats": { "elo": 1550 } }));
        let text = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(text, r#"{"game_stats":{"elo":1550}}"#);
    }

    #[test]
    fn test_nested_fields_survive_untouched() {
        let raw = r#"{"cs_fields":{"kills":100,"deaths":50},"extra":[1,null,"x"]}"#;
        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.as_value()["cs_fields"]["kills"], 100);
        assert_eq!(snapshot.as_value()["extra"][2], "x");
    }
}
