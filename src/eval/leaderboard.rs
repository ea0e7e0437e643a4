//! Leaderboard aggregation
//!
//! Per application label, the mean of each feedback score across all
//! recorded traces. A trace missing one score is excluded only from that
//! field's average, not from the others.

use crate::eval::feedback::FeedbackKind;
use crate::eval::TraceStore;
use std::collections::{BTreeMap, HashMap};

/// Aggregated row for one application/strategy
#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub app_id: String,
    pub traces: usize,
    /// Mean per feedback kind; `None` when no trace carried that score
    pub means: HashMap<FeedbackKind, Option<f32>>,
}

/// Aggregate all recorded traces into per-application rows, sorted by label
pub fn leaderboard(store: &TraceStore) -> Vec<LeaderboardRow> {
    let mut by_app: BTreeMap<String, Vec<HashMap<FeedbackKind, Option<f32>>>> = BTreeMap::new();
    for record in store.records() {
        by_app
            .entry(record.app_id.clone())
            .or_default()
            .push(record.scores.clone());
    }

    by_app
        .into_iter()
        .map(|(app_id, score_maps)| {
            let mut means = HashMap::new();
            for kind in FeedbackKind::ALL {
                let present: Vec<f32> = score_maps
                    .iter()
                    .filter_map(|scores| scores.get(&kind).copied().flatten())
                    .collect();
                let mean = if present.is_empty() {
                    None
                } else {
                    Some(present.iter().sum::<f32>() / present.len() as f32)
                };
                means.insert(kind, mean);
            }
            LeaderboardRow {
                app_id,
                traces: score_maps.len(),
                means,
            }
        })
        .collect()
}

/// Render rows as a plain text table
pub fn format_rows(rows: &[LeaderboardRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<36} {:>7} {:>17} {:>18} {:>13}\n",
        "app", "traces", "answer_relevance", "context_relevance", "groundedness"
    ));
    for row in rows {
        let cell = |kind: FeedbackKind| {
            row.means
                .get(&kind)
                .copied()
                .flatten()
                .map(|v| format!("{v:.3}"))
                .unwrap_or_else(|| "-".to_string())
        };
        out.push_str(&format!(
            "{:<36} {:>7} {:>17} {:>18} {:>13}\n",
            row.app_id,
            row.traces,
            cell(FeedbackKind::AnswerRelevance),
            cell(FeedbackKind::ContextRelevance),
            cell(FeedbackKind::Groundedness),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::TraceRecord;
    use crate::store::NodeId;
    use std::collections::HashMap;

    fn trace(app: &str, scores: &[(FeedbackKind, Option<f32>)]) -> TraceRecord {
        TraceRecord::new(
            app.to_string(),
            "q".to_string(),
            "r".to_string(),
            vec![NodeId(0)],
            scores.iter().cloned().collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn mean_per_application() {
        let store = TraceStore::new();
        store.append(trace(
            "app-a",
            &[(FeedbackKind::AnswerRelevance, Some(0.8))],
        ));
        store.append(trace(
            "app-a",
            &[(FeedbackKind::AnswerRelevance, Some(0.6))],
        ));

        let rows = leaderboard(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].traces, 2);
        let mean = rows[0].means[&FeedbackKind::AnswerRelevance].unwrap();
        assert!((mean - 0.7).abs() < 1e-6);
    }

    #[test]
    fn missing_score_excluded_from_its_field_only() {
        let store = TraceStore::new();
        store.append(trace(
            "app-a",
            &[
                (FeedbackKind::AnswerRelevance, Some(0.8)),
                (FeedbackKind::Groundedness, Some(0.4)),
            ],
        ));
        store.append(trace(
            "app-a",
            &[
                (FeedbackKind::AnswerRelevance, Some(0.6)),
                (FeedbackKind::Groundedness, None), // scorer failed here
            ],
        ));

        let rows = leaderboard(&store);
        let answer = rows[0].means[&FeedbackKind::AnswerRelevance].unwrap();
        let grounded = rows[0].means[&FeedbackKind::Groundedness].unwrap();
        // the failed groundedness score does not drag the mean to zero,
        // and the trace still counts for answer relevance
        assert!((answer - 0.7).abs() < 1e-6);
        assert!((grounded - 0.4).abs() < 1e-6);
        assert_eq!(rows[0].traces, 2);
    }

    #[test]
    fn applications_stay_separate() {
        let store = TraceStore::new();
        store.append(trace(
            "app-a",
            &[(FeedbackKind::AnswerRelevance, Some(1.0))],
        ));
        store.append(trace(
            "app-b",
            &[(FeedbackKind::AnswerRelevance, Some(0.0))],
        ));

        let rows = leaderboard(&store);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].app_id, "app-a");
        assert_eq!(rows[1].app_id, "app-b");
    }

    #[test]
    fn missing_kind_renders_as_dash() {
        let store = TraceStore::new();
        store.append(trace(
            "app-a",
            &[(FeedbackKind::AnswerRelevance, Some(0.5))],
        ));
        let rows = leaderboard(&store);
        let table = format_rows(&rows);
        assert!(table.contains("app-a"));
        assert!(table.contains('-'));
    }
}
