use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::models::SubmissionSummary;
use crate::queries::{OP_SUBMISSION_LIST, QUERY_SUBMISSION_LIST};
use crate::transport::{GraphqlTransport, execute_logged};

/// Walks the account's submission history page by page.
///
/// Listing is sequential because each offset depends on the page before it.
/// The walk is best effort: a failed page ends it with the prefix fetched so
/// far and a warning, never an error.
pub struct HistoryWalker {
    transport: Arc<dyn GraphqlTransport>,
    page_size: usize,
    page_delay_ms: u64,
}

impl HistoryWalker {
    pub fn new(transport: Arc<dyn GraphqlTransport>, page_size: usize, page_delay_ms: u64) -> Self {
        Self {
            transport,
            page_size,
            page_delay_ms,
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn walk(&self) -> Vec<SubmissionSummary> {
        let mut offset = 0usize;
        let mut all: Vec<SubmissionSummary> = Vec::new();

        loop {
            let variables = json!({"offset": offset, "limit": self.page_size});
            let Some(body) = execute_logged(
                self.transport.as_ref(),
                QUERY_SUBMISSION_LIST,
                variables,
                OP_SUBMISSION_LIST,
            )
            .await
            else {
                warn!(
                    offset,
                    fetched = all.len(),
                    "history page failed; continuing with partial history"
                );
                break;
            };

            let Some(page) = body
                .pointer("/data/submissionList")
                .filter(|p| !p.is_null())
            else {
                warn!(
                    offset,
                    fetched = all.len(),
                    "history page carried no listing; continuing with partial history"
                );
                break;
            };

            let has_next = page
                .get("hasNext")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let rows = page
                .get("submissions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let page_is_empty = rows.is_empty();

            for row in rows {
                match serde_json::from_value::<SubmissionSummary>(row) {
                    Ok(summary) => all.push(summary),
                    Err(e) => warn!(offset, error = %e, "skipping unparseable history row"),
                }
            }

            debug!(offset, fetched = all.len(), has_next, "history page fetched");

            // An empty page ends the walk even when the service claims more.
            if page_is_empty || !has_next {
                break;
            }

            offset += self.page_size;
            if self.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.page_delay_ms)).await;
            }
        }

        all
    }
}
