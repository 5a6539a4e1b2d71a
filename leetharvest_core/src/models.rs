use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the submission-history listing, as the service sends it.
///
/// Only `id` and `titleSlug` drive the engine; every other field rides along
/// so the persisted record keeps the full listing row. Unknown fields land in
/// `extra` and survive serialization unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    /// Submission id. A string on the wire; numbers are tolerated.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_slug: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SubmissionSummary {
    /// The detail query takes the id as an integer variable.
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// All submissions for one problem, the unit handed to the fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub slug: String,
    pub submissions: Vec<SubmissionSummary>,
}

/// The per-problem file written by a successful item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestOutput {
    pub problem_slug: String,
    pub problem_metadata: Value,
    pub submissions: Vec<Value>,
}

/// Intended scope of a full harvest, written before the fan-out starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub problems: Vec<String>,
    pub count: usize,
}

impl Manifest {
    pub fn new(problems: Vec<String>) -> Self {
        let count = problems.len();
        Self { problems, count }
    }
}

/// A failed item with everything a retry needs to redo it without
/// re-walking the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub slug: String,
    pub error: String,
    pub submissions: Vec<SubmissionSummary>,
}

impl DeadLetterEntry {
    pub fn new(
        slug: impl Into<String>,
        error: impl Into<String>,
        submissions: Vec<SubmissionSummary>,
    ) -> Self {
        Self {
            slug: slug.into(),
            error: error.into(),
            submissions,
        }
    }
}

/// Outcome of one processed item.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ItemReport {
    pub submissions: usize,
    /// Records persisted without detail data because the detail fetch failed.
    pub degraded: usize,
}

/// Outcome of a harvest or retry pass.
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    pub discovered: usize,
    pub unique_problems: usize,
    pub completed: usize,
    pub skipped: usize,
    /// Total records across all items that went out without detail data.
    pub degraded: usize,
    pub failed: Vec<DeadLetterEntry>,
}
