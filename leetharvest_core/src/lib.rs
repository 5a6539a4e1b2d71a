//! leetharvest core: submission-history harvest engine for LeetCode accounts.
//!
//! A harvest walks the account's submission history, groups it into one work
//! item per problem, and fans the items out under a bounded permit pool.
//! Each item fetches its problem metadata and per-submission details, scrubs
//! judge noise out of every document, and persists one JSON checkpoint per
//! problem. A failing item becomes a dead letter that carries its captured
//! submissions, so a retry pass redoes exactly the failed problems without
//! walking the history again.

#![forbid(unsafe_code)]

pub mod auth;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod group;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod processor;
pub mod queries;
pub mod redact;
pub mod transport;

mod test_support;

pub use auth::{Authenticator, Credentials};
pub use checkpoint::{CheckpointStore, DEAD_LETTER_FILE, MANIFEST_FILE};
pub use config::HarvestConfig;
pub use error::{Error, Result};
pub use group::group_by_problem;
pub use history::HistoryWalker;
pub use models::{
    DeadLetterEntry, HarvestOutput, HarvestReport, ItemReport, Manifest, SubmissionSummary,
    WorkItem,
};
pub use orchestrator::HarvestOrchestrator;
pub use processor::{DETAIL_FETCH_FAILED_KEY, ItemProcessor};
pub use redact::FieldRedactor;
pub use transport::{GRAPHQL_URL, GraphqlTransport, HttpGraphqlTransport};
