use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::HarvestConfig;
use crate::group::group_by_problem;
use crate::history::HistoryWalker;
use crate::models::{DeadLetterEntry, HarvestReport, ItemReport, Manifest, WorkItem};
use crate::processor::ItemProcessor;
use crate::redact::FieldRedactor;
use crate::transport::GraphqlTransport;
use crate::{Error, Result};

enum TaskOutcome {
    Completed(ItemReport),
    Skipped,
    Failed,
}

/// Drives harvest and retry passes for one account.
///
/// A pass fans out one task per problem under a permit pool; a failing task
/// becomes a dead letter and never disturbs its siblings. The dead-letter
/// file always reflects the latest settle: written when the pass left
/// failures behind, removed when it was clean.
pub struct HarvestOrchestrator {
    transport: Arc<dyn GraphqlTransport>,
    store: CheckpointStore,
    config: HarvestConfig,
}

impl HarvestOrchestrator {
    pub fn new(
        transport: Arc<dyn GraphqlTransport>,
        store: CheckpointStore,
        config: HarvestConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            store,
            config,
        })
    }

    /// Full pass: walk the history, write the manifest, process everything.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn harvest_all(&self) -> Result<HarvestReport> {
        let walker = HistoryWalker::new(
            self.transport.clone(),
            self.config.page_size,
            self.config.page_delay_ms,
        );
        let summaries = walker.walk().await;
        let discovered = summaries.len();
        info!(discovered, "submission history walked");

        let items = group_by_problem(summaries);
        let unique_problems = items.len();

        // The manifest records the intended scope before any item runs, so a
        // crashed pass still leaves its plan on disk.
        let manifest = Manifest::new(items.iter().map(|item| item.slug.clone()).collect());
        self.store.write_manifest(&manifest).await?;
        info!(problems = manifest.count, "manifest written");

        let mut report = self.fan_out(items, self.config.resume).await?;
        report.discovered = discovered;
        report.unique_problems = unique_problems;

        self.store.write_dead_letters(&report.failed).await?;
        if report.failed.is_empty() {
            info!(completed = report.completed, "harvest settled clean");
        } else {
            warn!(
                completed = report.completed,
                failed = report.failed.len(),
                "harvest settled with dead letters"
            );
        }
        Ok(report)
    }

    /// Retry pass over previously captured dead letters.
    ///
    /// Work items are rebuilt from the entries' captured summaries, so no
    /// history walk happens and no manifest is rewritten. Entries are never
    /// skipped: a retry is an explicit instruction to redo them.
    #[tracing::instrument(level = "debug", skip_all, fields(entries = entries.len()))]
    pub async fn retry_failed(&self, entries: Vec<DeadLetterEntry>) -> Result<HarvestReport> {
        if entries.is_empty() {
            return Ok(HarvestReport::default());
        }

        let items: Vec<WorkItem> = entries
            .into_iter()
            .map(|entry| WorkItem {
                slug: entry.slug,
                submissions: entry.submissions,
            })
            .collect();
        let discovered = items.iter().map(|item| item.submissions.len()).sum();
        let unique_problems = items.len();
        info!(items = unique_problems, "retrying dead letters");

        let mut report = self.fan_out(items, false).await?;
        report.discovered = discovered;
        report.unique_problems = unique_problems;

        self.store.write_dead_letters(&report.failed).await?;
        if report.failed.is_empty() {
            info!(completed = report.completed, "retry settled clean");
        } else {
            warn!(failed = report.failed.len(), "retry left dead letters");
        }
        Ok(report)
    }

    async fn fan_out(&self, items: Vec<WorkItem>, skip_existing: bool) -> Result<HarvestReport> {
        let mut report = HarvestReport::default();
        if items.is_empty() {
            return Ok(report);
        }

        let processor = Arc::new(ItemProcessor::new(
            self.transport.clone(),
            self.store.clone(),
            FieldRedactor::default(),
            self.config.detail_delay_ms,
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let dead_letters: Arc<Mutex<Vec<DeadLetterEntry>>> = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = FuturesUnordered::new();

        for item in items {
            let permit = semaphore.clone();
            let processor = processor.clone();
            let store = self.store.clone();
            let dead_letters = dead_letters.clone();
            let item_delay_ms = self.config.item_delay_ms;

            tasks.push(async move {
                let _permit = permit
                    .acquire()
                    .await
                    .map_err(|_| Error::Internal("fan-out semaphore closed".to_string()))?;

                if skip_existing {
                    match store.output_exists(&item.slug).await {
                        Ok(true) => {
                            debug!(slug = %item.slug, "output already present; skipping");
                            return Ok::<TaskOutcome, Error>(TaskOutcome::Skipped);
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(slug = %item.slug, error = %e, "skip probe failed; processing anyway");
                        }
                    }
                }

                let outcome = match processor.process(&item).await {
                    Ok(item_report) => TaskOutcome::Completed(item_report),
                    Err(e) => {
                        warn!(slug = %item.slug, error = %e, "problem failed; dead-lettered");
                        dead_letters.lock().await.push(DeadLetterEntry::new(
                            item.slug.clone(),
                            format!("{e}"),
                            item.submissions,
                        ));
                        TaskOutcome::Failed
                    }
                };

                // Post-item cooldown happens under the permit so the pool
                // also paces the request rate.
                if item_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(item_delay_ms)).await;
                }
                Ok(outcome)
            });
        }

        while let Some(result) = tasks.next().await {
            match result? {
                TaskOutcome::Completed(item_report) => {
                    report.completed += 1;
                    report.degraded += item_report.degraded;
                }
                TaskOutcome::Skipped => report.skipped += 1,
                TaskOutcome::Failed => {}
            }
        }

        report.failed = dead_letters.lock().await.clone();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubmissionSummary;
    use crate::queries::{OP_SELECT_PROBLEM, OP_SUBMISSION_LIST};
    use crate::test_support::{
        ScriptedTransport, detail_body, page_body, question_body, summary_row,
    };
    use serde_json::json;

    fn quiet_config() -> HarvestConfig {
        HarvestConfig {
            page_delay_ms: 0,
            detail_delay_ms: 0,
            item_delay_ms: 0,
            ..Default::default()
        }
    }

    async fn orchestrator(
        transport: Arc<ScriptedTransport>,
        root: &std::path::Path,
        config: HarvestConfig,
    ) -> HarvestOrchestrator {
        let store = CheckpointStore::open(root, "alice").await.unwrap();
        HarvestOrchestrator::new(transport, store, config).unwrap()
    }

    fn summary(id: &str, slug: &str) -> SubmissionSummary {
        serde_json::from_value(summary_row(id, slug)).unwrap()
    }

    /// Scripts a ten-problem account: one listing page, metadata and one
    /// detail per problem.
    fn script_ten_problems(transport: &ScriptedTransport) {
        let rows: Vec<_> = (1..=10)
            .map(|i| summary_row(&i.to_string(), &format!("p{i}")))
            .collect();
        transport.respond("submissionList:0", page_body(false, json!(rows)));
        for i in 1..=10 {
            transport.respond(&format!("selectProblem:p{i}"), question_body(&format!("p{i}")));
            transport.respond(&format!("submissionDetails:{i}"), detail_body("code"));
        }
    }

    #[tokio::test]
    async fn fan_out_respects_the_concurrency_bound() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new().with_latency_ms(5));
        script_ten_problems(&transport);

        let config = HarvestConfig {
            max_in_flight: 2,
            ..quiet_config()
        };
        let report = orchestrator(transport.clone(), root.path(), config)
            .await
            .harvest_all()
            .await
            .unwrap();

        assert_eq!(report.completed, 10);
        assert!(report.failed.is_empty());
        // Ten items behind two permits: overlap happens, the cap holds.
        assert!(transport.observed_max_in_flight() <= 2);
        assert!(transport.observed_max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn one_poisoned_item_never_disturbs_the_rest() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        script_ten_problems(&transport);
        transport.fail("selectProblem:p3");

        let orch = orchestrator(transport, root.path(), quiet_config()).await;
        let report = orch.harvest_all().await.unwrap();

        assert_eq!(report.discovered, 10);
        assert_eq!(report.unique_problems, 10);
        assert_eq!(report.completed, 9);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].slug, "p3");
        assert_eq!(report.failed[0].submissions, vec![summary("3", "p3")]);

        // Nine outputs, the manifest still names all ten, the dead letters
        // are on disk for a later retry.
        let store = CheckpointStore::open(root.path(), "alice").await.unwrap();
        assert_eq!(store.output_slugs().await.unwrap().len(), 9);
        assert!(!store.output_exists("p3").await.unwrap());
        assert_eq!(store.read_manifest().await.unwrap().unwrap().count, 10);
        let dead = store.read_dead_letters().await.unwrap().unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].slug, "p3");
    }

    #[tokio::test]
    async fn retry_reuses_captured_summaries_without_relisting() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("selectProblem:two-sum", question_body("two-sum"));
        for i in 1..=3 {
            transport.respond(&format!("submissionDetails:{i}"), detail_body("code"));
        }

        let orch = orchestrator(transport.clone(), root.path(), quiet_config()).await;
        let entry = DeadLetterEntry::new(
            "two-sum",
            "metadata fetch failed",
            vec![
                summary("1", "two-sum"),
                summary("2", "two-sum"),
                summary("3", "two-sum"),
            ],
        );
        let report = orch.retry_failed(vec![entry]).await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.discovered, 3);
        assert!(report.failed.is_empty());
        assert_eq!(transport.calls_for(OP_SUBMISSION_LIST), 0);

        let store = CheckpointStore::open(root.path(), "alice").await.unwrap();
        // No fresh manifest and no dead letters after a clean retry.
        assert!(store.read_manifest().await.unwrap().is_none());
        assert!(store.read_dead_letters().await.unwrap().is_none());

        let raw = std::fs::read(root.path().join("alice/two-sum.json")).unwrap();
        let output: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(output["submissions"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn clean_pass_clears_stale_dead_letters() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        script_ten_problems(&transport);

        let store = CheckpointStore::open(root.path(), "alice").await.unwrap();
        store
            .write_dead_letters(&[DeadLetterEntry::new("p3", "stale failure", Vec::new())])
            .await
            .unwrap();

        let orch = orchestrator(transport, root.path(), quiet_config()).await;
        let report = orch.harvest_all().await.unwrap();

        assert!(report.failed.is_empty());
        assert!(store.read_dead_letters().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resume_skips_problems_already_on_disk() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "submissionList:0",
            page_body(
                false,
                json!([summary_row("1", "p1"), summary_row("2", "p2")]),
            ),
        );
        // Only p2 is scripted; p1 must never be fetched.
        transport.respond("selectProblem:p2", question_body("p2"));
        transport.respond("submissionDetails:2", detail_body("code"));

        let store = CheckpointStore::open(root.path(), "alice").await.unwrap();
        store
            .write_output(&crate::models::HarvestOutput {
                problem_slug: "p1".to_string(),
                problem_metadata: json!({"marker": "previous-pass"}),
                submissions: Vec::new(),
            })
            .await
            .unwrap();

        let config = HarvestConfig {
            resume: true,
            ..quiet_config()
        };
        let report = orchestrator(transport.clone(), root.path(), config)
            .await
            .harvest_all()
            .await
            .unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.failed.is_empty());
        assert_eq!(transport.calls_for(OP_SELECT_PROBLEM), 1);

        let raw = std::fs::read(root.path().join("alice/p1.json")).unwrap();
        let kept: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(kept["problem_metadata"]["marker"], json!("previous-pass"));
    }

    #[tokio::test]
    async fn retry_redoes_items_even_with_resume_on() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("selectProblem:p1", question_body("p1"));
        transport.respond("submissionDetails:1", detail_body("fresh"));

        let store = CheckpointStore::open(root.path(), "alice").await.unwrap();
        store
            .write_output(&crate::models::HarvestOutput {
                problem_slug: "p1".to_string(),
                problem_metadata: json!({"marker": "previous-pass"}),
                submissions: Vec::new(),
            })
            .await
            .unwrap();

        let config = HarvestConfig {
            resume: true,
            ..quiet_config()
        };
        let orch = orchestrator(transport, root.path(), config).await;
        let entry = DeadLetterEntry::new("p1", "stale failure", vec![summary("1", "p1")]);
        let report = orch.retry_failed(vec![entry]).await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped, 0);

        let raw = std::fs::read(root.path().join("alice/p1.json")).unwrap();
        let rewritten: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(rewritten["problem_metadata"].get("marker").is_none());
        assert_eq!(rewritten["submissions"][0]["code"], json!("fresh"));
    }

    #[tokio::test]
    async fn empty_history_settles_with_an_empty_manifest() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("submissionList:0", page_body(false, json!([])));

        let orch = orchestrator(transport, root.path(), quiet_config()).await;
        let report = orch.harvest_all().await.unwrap();

        assert_eq!(report.discovered, 0);
        assert_eq!(report.completed, 0);
        assert!(report.failed.is_empty());

        let store = CheckpointStore::open(root.path(), "alice").await.unwrap();
        assert_eq!(store.read_manifest().await.unwrap().unwrap().count, 0);
        assert!(store.read_dead_letters().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retrying_nothing_is_a_clean_no_op() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let orch = orchestrator(transport.clone(), root.path(), quiet_config()).await;

        let report = orch.retry_failed(Vec::new()).await.unwrap();

        assert_eq!(report.completed, 0);
        assert!(report.failed.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn degraded_records_are_counted_in_the_report() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "submissionList:0",
            page_body(false, json!([summary_row("1", "p1"), summary_row("2", "p1")])),
        );
        transport.respond("selectProblem:p1", question_body("p1"));
        transport.respond("submissionDetails:1", detail_body("code"));
        transport.fail("submissionDetails:2");

        let orch = orchestrator(transport, root.path(), quiet_config()).await;
        let report = orch.harvest_all().await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.degraded, 1);
        assert!(report.failed.is_empty());
    }
}
