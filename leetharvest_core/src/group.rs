use indexmap::IndexMap;
use tracing::debug;

use crate::models::{SubmissionSummary, WorkItem};

/// Groups history rows into one work item per problem.
///
/// Slugs keep first-seen order and each slug keeps its rows in listing
/// order, so a given history always produces the same work list. Rows
/// without a slug cannot be fetched or filed and are dropped.
pub fn group_by_problem(summaries: Vec<SubmissionSummary>) -> Vec<WorkItem> {
    let mut grouped: IndexMap<String, Vec<SubmissionSummary>> = IndexMap::new();
    let mut dropped = 0usize;

    for summary in summaries {
        match summary.title_slug.clone() {
            Some(slug) if !slug.trim().is_empty() => {
                grouped.entry(slug).or_default().push(summary);
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, "dropped history rows with no problem slug");
    }

    grouped
        .into_iter()
        .map(|(slug, submissions)| WorkItem { slug, submissions })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, slug: Option<&str>) -> SubmissionSummary {
        let mut row = serde_json::json!({"id": id});
        if let Some(slug) = slug {
            row["titleSlug"] = serde_json::json!(slug);
        }
        serde_json::from_value(row).unwrap()
    }

    #[test]
    fn groups_in_first_seen_order() {
        let items = group_by_problem(vec![
            summary("1", Some("two-sum")),
            summary("2", Some("add-two-numbers")),
            summary("3", Some("two-sum")),
            summary("4", Some("median-of-two-sorted-arrays")),
        ]);

        let slugs: Vec<&str> = items.iter().map(|w| w.slug.as_str()).collect();
        assert_eq!(
            slugs,
            vec!["two-sum", "add-two-numbers", "median-of-two-sorted-arrays"]
        );

        let two_sum_ids: Vec<&str> = items[0].submissions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(two_sum_ids, vec!["1", "3"]);
    }

    #[test]
    fn slugless_rows_are_dropped() {
        let items = group_by_problem(vec![
            summary("1", None),
            summary("2", Some("two-sum")),
            summary("3", Some("")),
        ]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "two-sum");
        assert_eq!(items[0].submissions.len(), 1);
    }

    #[test]
    fn grouping_is_deterministic() {
        let history = vec![
            summary("1", Some("b")),
            summary("2", Some("a")),
            summary("3", Some("b")),
        ];
        let first = group_by_problem(history.clone());
        let second = group_by_problem(history);
        assert_eq!(first, second);
    }
}
