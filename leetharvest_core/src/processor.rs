use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::checkpoint::CheckpointStore;
use crate::models::{HarvestOutput, ItemReport, SubmissionSummary, WorkItem};
use crate::queries::{
    OP_SELECT_PROBLEM, OP_SUBMISSION_DETAILS, QUERY_PROBLEM_DETAILS, QUERY_SUBMISSION_DETAILS,
};
use crate::redact::FieldRedactor;
use crate::transport::{GraphqlTransport, execute_logged};
use crate::{Error, Result};

/// Marker injected into a record whose detail fetch failed, so consumers can
/// tell a degraded record from a genuinely sparse one.
pub const DETAIL_FETCH_FAILED_KEY: &str = "detailFetchFailed";

/// Fetches, scrubs, merges, and persists one problem's submissions.
///
/// Problem metadata is mandatory: without it the item fails and goes to the
/// dead letters. Missing detail data only degrades the affected record to
/// its bare summary, marked with [`DETAIL_FETCH_FAILED_KEY`].
pub struct ItemProcessor {
    transport: Arc<dyn GraphqlTransport>,
    store: CheckpointStore,
    redactor: FieldRedactor,
    detail_delay_ms: u64,
}

impl ItemProcessor {
    pub fn new(
        transport: Arc<dyn GraphqlTransport>,
        store: CheckpointStore,
        redactor: FieldRedactor,
        detail_delay_ms: u64,
    ) -> Self {
        Self {
            transport,
            store,
            redactor,
            detail_delay_ms,
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(slug = %item.slug))]
    pub async fn process(&self, item: &WorkItem) -> Result<ItemReport> {
        let metadata = self.fetch_metadata(&item.slug).await?;

        let mut records = Vec::with_capacity(item.submissions.len());
        let mut degraded = 0usize;
        for summary in &item.submissions {
            let record = match self.fetch_detail(summary).await {
                Some(detail) => merge_record(summary, detail)?,
                None => {
                    degraded += 1;
                    degraded_record(summary)?
                }
            };
            records.push(record);

            if self.detail_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.detail_delay_ms)).await;
            }
        }

        let output = HarvestOutput {
            problem_slug: item.slug.clone(),
            problem_metadata: metadata,
            submissions: records,
        };
        self.store.write_output(&output).await?;

        info!(
            slug = %item.slug,
            submissions = output.submissions.len(),
            degraded,
            "problem harvested"
        );
        Ok(ItemReport {
            submissions: output.submissions.len(),
            degraded,
        })
    }

    async fn fetch_metadata(&self, slug: &str) -> Result<Value> {
        let body = execute_logged(
            self.transport.as_ref(),
            QUERY_PROBLEM_DETAILS,
            json!({"titleSlug": slug}),
            OP_SELECT_PROBLEM,
        )
        .await
        .ok_or_else(|| Error::Protocol(format!("metadata fetch failed for {slug}")))?;

        let question = body
            .pointer("/data/question")
            .filter(|q| !q.is_null())
            .cloned()
            .ok_or_else(|| Error::Protocol(format!("no question data for {slug}")))?;

        Ok(self.redactor.redact(question))
    }

    async fn fetch_detail(&self, summary: &SubmissionSummary) -> Option<Value> {
        let Some(id) = summary.numeric_id() else {
            warn!(submission = %summary.id, "submission id is not numeric; keeping bare summary");
            return None;
        };

        let body = execute_logged(
            self.transport.as_ref(),
            QUERY_SUBMISSION_DETAILS,
            json!({"submissionId": id}),
            OP_SUBMISSION_DETAILS,
        )
        .await?;

        let detail = body
            .pointer("/data/submissionDetails")
            .filter(|d| !d.is_null())
            .cloned()?;

        Some(self.redactor.redact(detail))
    }
}

fn summary_object(summary: &SubmissionSummary) -> Result<serde_json::Map<String, Value>> {
    match serde_json::to_value(summary) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::InvalidInput(format!(
            "summary {} serialized to {other}",
            summary.id
        ))),
        Err(e) => Err(Error::InvalidInput(format!(
            "summary {} does not serialize: {e}",
            summary.id
        ))),
    }
}

/// Record for a summary whose detail arrived: detail fields win on collision.
fn merge_record(summary: &SubmissionSummary, detail: Value) -> Result<Value> {
    let mut record = summary_object(summary)?;
    if let Value::Object(fields) = detail {
        for (key, value) in fields {
            record.insert(key, value);
        }
    }
    Ok(Value::Object(record))
}

/// Record for a summary whose detail never arrived.
fn degraded_record(summary: &SubmissionSummary) -> Result<Value> {
    let mut record = summary_object(summary)?;
    record.insert(DETAIL_FETCH_FAILED_KEY.to_string(), Value::Bool(true));
    Ok(Value::Object(record))
}
