#![cfg(test)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::queries::{OP_SELECT_PROBLEM, OP_SUBMISSION_DETAILS, OP_SUBMISSION_LIST};
use crate::transport::GraphqlTransport;
use crate::{Error, Result};

/// Scripted stand-in for the live endpoint.
///
/// Responses are queued per route, where a route is the operation name plus
/// the variable that distinguishes calls of that operation (`offset` for the
/// listing, `titleSlug` for metadata, `submissionId` for details). Routes in
/// the failure set return a transport error instead. Every call is recorded,
/// and an in-flight gauge captures the high-water concurrency mark.
pub(crate) struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Value>>>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
    latency_ms: u64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency_ms: 0,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Adds a pause inside every call so concurrent callers overlap.
    pub(crate) fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Queues one response body for a route. Repeated calls queue in order.
    pub(crate) fn respond(&self, route: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(body);
    }

    /// Makes every call on the route fail with a transport error.
    pub(crate) fn fail(&self, route: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(route.to_string(), u32::MAX);
    }

    /// Makes the next `times` calls on the route fail, then recover.
    pub(crate) fn fail_times(&self, route: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(route.to_string(), times);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_for(&self, operation_name: &str) -> usize {
        let prefix = format!("{operation_name}:");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|route| *route == operation_name || route.starts_with(&prefix))
            .count()
    }

    pub(crate) fn observed_max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn route(operation_name: &str, variables: &Value) -> String {
        let discriminator = match operation_name {
            OP_SUBMISSION_LIST => variables.get("offset").map(|v| v.to_string()),
            OP_SELECT_PROBLEM => variables
                .get("titleSlug")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            OP_SUBMISSION_DETAILS => variables.get("submissionId").map(|v| v.to_string()),
            _ => None,
        };
        match discriminator {
            Some(d) => format!("{operation_name}:{d}"),
            None => operation_name.to_string(),
        }
    }
}

#[async_trait]
impl GraphqlTransport for ScriptedTransport {
    async fn execute(
        &self,
        _query: &str,
        variables: Value,
        operation_name: &str,
    ) -> Result<Value> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }

        let route = Self::route(operation_name, &variables);
        self.calls.lock().unwrap().push(route.clone());

        let should_fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&route) {
                Some(0) | None => false,
                Some(remaining) => {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    true
                }
            }
        };

        let result = if should_fail {
            Err(Error::transport(
                format!("scripted failure for {route}"),
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "injected"),
            ))
        } else {
            match self
                .responses
                .lock()
                .unwrap()
                .get_mut(&route)
                .and_then(VecDeque::pop_front)
            {
                Some(body) => Ok(body),
                None => Err(Error::Protocol(format!("no scripted response for {route}"))),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Listing page body in the service's shape.
pub(crate) fn page_body(has_next: bool, submissions: Value) -> Value {
    serde_json::json!({
        "data": {
            "submissionList": {
                "hasNext": has_next,
                "submissions": submissions,
            }
        }
    })
}

/// Summary row as the listing sends it.
pub(crate) fn summary_row(id: &str, slug: &str) -> Value {
    serde_json::json!({
        "id": id,
        "statusDisplay": "Accepted",
        "lang": "rust",
        "runtime": "4 ms",
        "memory": "2.1 MB",
        "timestamp": "1700000000",
        "title": slug,
        "titleSlug": slug,
    })
}

/// Problem metadata body for `selectProblem`.
pub(crate) fn question_body(slug: &str) -> Value {
    serde_json::json!({
        "data": {
            "question": {
                "questionId": "1",
                "title": slug,
                "titleSlug": slug,
                "difficulty": "Easy",
                "codeSnippets": [{"lang": "Rust", "langSlug": "rust", "code": "stub"}],
            }
        }
    })
}

/// Submission detail body for `submissionDetails`.
pub(crate) fn detail_body(code: &str) -> Value {
    serde_json::json!({
        "data": {
            "submissionDetails": {
                "code": code,
                "runtimeDisplay": "4 ms",
                "runtimePercentile": 91.2,
                "lastTestcase": "[2,7,11,15]",
                "totalCorrect": 57,
            }
        }
    })
}
