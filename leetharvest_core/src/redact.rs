use std::collections::HashSet;

use serde_json::Value;

/// Fields stripped from every fetched document before it is persisted.
const EXCLUDED_FIELDS: &[&str] = &[
    // Judge / execution noise
    "testBodies",
    "testDescriptions",
    "testInfo",
    "fullCodeOutput",
    "stdOutput",
    "codeOutput",
    "lastTestcase",
    "expectedOutput",
    "totalCorrect",
    "totalTestcases",
    "runtimeDistribution",
    "memoryDistribution",
    // Frontend / tracking
    "userAvatar",
    "avatar",
    "profileUrl",
    // Other
    "codeSnippets",
];

/// Removes forbidden field names at every depth of a JSON document.
///
/// Matching is by exact key name. Scalars pass through untouched, so the
/// scrub is total and idempotent.
#[derive(Debug, Clone)]
pub struct FieldRedactor {
    excluded: HashSet<String>,
}

impl Default for FieldRedactor {
    fn default() -> Self {
        Self::new(EXCLUDED_FIELDS.iter().copied())
    }
}

impl FieldRedactor {
    pub fn new(excluded: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    pub fn redact(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(k, _)| !self.excluded.contains(k.as_str()))
                    .map(|(k, v)| (k, self.redact(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.redact(v)).collect())
            }
            scalar => scalar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_forbidden_keys_at_every_depth() {
        let doc = json!({
            "code": "fn main() {}",
            "lastTestcase": "[2,7,11,15]",
            "user": {
                "username": "alice",
                "profile": {"realName": "Alice", "userAvatar": "https://cdn/a.png"}
            },
            "topicTags": [
                {"name": "Array", "codeSnippets": [{"lang": "rust"}]}
            ]
        });

        let redactor = FieldRedactor::default();
        let out = redactor.redact(doc);

        assert_eq!(out["code"], json!("fn main() {}"));
        assert!(out.get("lastTestcase").is_none());
        assert_eq!(out["user"]["profile"]["realName"], json!("Alice"));
        assert!(out["user"]["profile"].get("userAvatar").is_none());
        assert!(out["topicTags"][0].get("codeSnippets").is_none());
        assert_eq!(out["topicTags"][0]["name"], json!("Array"));
    }

    #[test]
    fn scalars_and_clean_documents_pass_through() {
        let redactor = FieldRedactor::default();
        assert_eq!(redactor.redact(json!(42)), json!(42));
        assert_eq!(redactor.redact(json!(null)), json!(null));
        assert_eq!(
            redactor.redact(json!({"runtime": "4 ms"})),
            json!({"runtime": "4 ms"})
        );
    }

    #[test]
    fn redaction_is_idempotent() {
        let doc = json!({
            "runtime": "4 ms",
            "stdOutput": "noise",
            "nested": [{"expectedOutput": "x", "kept": true}]
        });
        let redactor = FieldRedactor::default();
        let once = redactor.redact(doc);
        let twice = redactor.redact(once.clone());
        assert_eq!(once, twice);
        assert!(once["nested"][0].get("expectedOutput").is_none());
        assert_eq!(once["nested"][0]["kept"], json!(true));
    }

    #[test]
    fn custom_sets_replace_the_default() {
        let redactor = FieldRedactor::new(["noise"]);
        let out = redactor.redact(json!({"noise": 1, "stdOutput": "kept"}));
        assert!(out.get("noise").is_none());
        assert_eq!(out["stdOutput"], json!("kept"));
    }
}
