//! Redaction of sensitive values before a parameter snapshot is logged.
//!
//! Paths are the descriptor log paths (`form.password`), optionally extended
//! into structured values (`body.user.card.number`). Arrays are walked element
//! by element.

use crate::snapshot::ParsedParameterSnapshot;
use serde_json::Value;

/// Replacement written over redacted values.
pub const REDACTED: &str = "******";

/// Dotted paths masked in a snapshot, e.g. `form.password` or `body.card.number`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    paths: Vec<Vec<String>>,
}

impl LogFilter {
    /// Paths with fewer than two segments, or an empty one, are ignored.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = paths
            .into_iter()
            .map(|path| path.as_ref().split('.').map(str::to_owned).collect::<Vec<_>>())
            .filter(|segments| segments.len() >= 2 && segments.iter().all(|s| !s.is_empty()))
            .collect();
        Self { paths }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Overwrites every value matched by a path with [`REDACTED`].
    pub fn apply(&self, snapshot: &mut ParsedParameterSnapshot) {
        for path in &self.paths {
            let [category, wire_name, nested @ ..] = path.as_slice() else {
                continue;
            };
            if let Some(value) = snapshot.get_mut(category, wire_name) {
                redact(value, nested);
            }
        }
    }
}

fn redact(value: &mut Value, path: &[String]) {
    let Some((head, rest)) = path.split_first() else {
        *value = Value::String(REDACTED.to_owned());
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(child) = map.get_mut(head) {
                redact(child, rest);
            }
        }
        Value::Array(items) => {
            for item in items {
                redact(item, path);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> ParsedParameterSnapshot {
        let mut snapshot = ParsedParameterSnapshot::new();
        snapshot.insert("form", "password", json!("secret"));
        snapshot.insert("form", "user", json!("joe"));
        snapshot.insert(
            "body",
            "order",
            json!({ "card": { "number": "4242", "exp": "12/30" }, "items": [{ "sku": "a" }] }),
        );
        snapshot
    }

    #[test]
    fn redacts_top_level_values() {
        let mut snapshot = snapshot();
        LogFilter::new(["form.password"]).apply(&mut snapshot);
        assert_eq!(snapshot.get("form", "password"), Some(&json!(REDACTED)));
        assert_eq!(snapshot.get("form", "user"), Some(&json!("joe")));
    }

    #[test]
    fn redacts_nested_values() {
        let mut snapshot = snapshot();
        LogFilter::new(["body.order.card.number", "body.order.items.sku", "body.order.missing.x"]).apply(&mut snapshot);
        assert_eq!(
            snapshot.get("body", "order"),
            Some(&json!({ "card": { "number": REDACTED, "exp": "12/30" }, "items": [{ "sku": REDACTED }] }))
        );
    }

    #[test]
    fn ignores_incomplete_paths() {
        let filter = LogFilter::new(["password", "form.", ""]);
        assert!(filter.is_empty());

        let mut snapshot = snapshot();
        filter.apply(&mut snapshot);
        assert_eq!(snapshot, self::snapshot());
    }
}
