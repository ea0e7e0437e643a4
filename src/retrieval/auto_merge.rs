//! Auto-merging retrieval
//!
//! Retrieves top-k leaves, then promotes fine-grained hits to their parent
//! whenever enough siblings were retrieved together. Merging runs bottom-up
//! and recursively: freshly merged parents may themselves merge into the
//! next level under the same threshold rule, until no merge qualifies or the
//! root is reached. A merged parent keeps the maximum similarity score among
//! its absorbed children, so a merge never demotes the best fragment.

use crate::embedding::EmbeddingEngine;
use crate::index::SearchIndex;
use crate::retrieval::{RetrievalError, RetrievalResult, Retriever, ScoredNode};
use crate::store::{IntegrityError, NodeId, NodeStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct AutoMergingRetriever {
    index: Arc<SearchIndex>,
    embedder: Arc<EmbeddingEngine>,
    merge_threshold: f32,
}

impl AutoMergingRetriever {
    pub fn new(
        index: Arc<SearchIndex>,
        embedder: Arc<EmbeddingEngine>,
        merge_threshold: f32,
    ) -> Self {
        Self {
            index,
            embedder,
            merge_threshold,
        }
    }

    /// Retrieve with a precomputed query embedding
    pub fn retrieve_with_embedding(
        &self,
        q_emb: &[f32],
        k: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        let hits = self.index.vectors.query_with_embedding(q_emb, k);
        merge_hits(&self.index.store, hits, self.merge_threshold)
    }
}

#[async_trait]
impl Retriever for AutoMergingRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        let q_emb = self.embedder.embed_text(query).await?;
        self.retrieve_with_embedding(&q_emb, k)
    }

    fn context_text(&self, id: NodeId) -> Option<String> {
        self.index.store.get(id).map(|n| n.text.clone())
    }
}

/// Bottom-up sibling merge over retrieved hits. Pure over the store: no
/// embedding calls happen past this point.
///
/// Each round groups the current result set by parent and computes, per
/// parent, the fraction of its children present. Strictly above the
/// threshold, the children are replaced by the parent carrying their maximum
/// score. Rounds repeat until a fixpoint.
pub fn merge_hits(
    store: &NodeStore,
    hits: Vec<(NodeId, f32)>,
    threshold: f32,
) -> Result<RetrievalResult, RetrievalError> {
    // BTreeMap keeps grouping order deterministic
    let mut current: BTreeMap<NodeId, f32> = BTreeMap::new();
    for (id, score) in hits {
        let entry = current.entry(id).or_insert(score);
        *entry = entry.max(score);
    }

    loop {
        let mut by_parent: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (&id, _) in current.iter() {
            let node = store
                .get(id)
                .ok_or(IntegrityError::DanglingChild(id, id))?;
            if let Some(pid) = node.parent_id {
                by_parent.entry(pid).or_default().push(id);
            }
        }

        let mut merged_any = false;
        for (pid, retrieved_children) in by_parent {
            let parent = store
                .get(pid)
                .ok_or(IntegrityError::DanglingParent(retrieved_children[0], pid))?;
            let total = parent.child_ids.len();
            if total == 0 {
                continue;
            }

            let ratio = retrieved_children.len() as f32 / total as f32;
            if ratio > threshold {
                let mut best = f32::MIN;
                for child in &retrieved_children {
                    if let Some(score) = current.remove(child) {
                        best = best.max(score);
                    }
                }
                let entry = current.entry(pid).or_insert(f32::MIN);
                *entry = entry.max(best);
                merged_any = true;

                tracing::debug!(
                    parent = %pid,
                    absorbed = retrieved_children.len(),
                    total,
                    "merged siblings into parent"
                );
            }
        }

        if !merged_any {
            break;
        }
    }

    let mut result: Vec<ScoredNode> = current
        .into_iter()
        .map(|(id, score)| ScoredNode { id, score })
        .collect();
    result.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parent with four leaves; returns (store, parent, leaves)
    fn four_leaf_family() -> (NodeStore, NodeId, Vec<NodeId>) {
        let mut store = NodeStore::new();
        let root = store.insert("whole paragraph of text", 1, None);
        let leaves: Vec<NodeId> = (0..4)
            .map(|i| store.insert(format!("fragment {i}"), 0, Some(root)))
            .collect();
        (store, root, leaves)
    }

    #[test]
    fn three_of_four_children_merge_into_parent() {
        let (store, parent, leaves) = four_leaf_family();
        let hits = vec![(leaves[0], 0.9), (leaves[1], 0.4), (leaves[2], 0.6)];

        let result = merge_hits(&store, hits, 0.5).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, parent);
    }

    #[test]
    fn merged_parent_keeps_maximum_child_score() {
        let (store, parent, leaves) = four_leaf_family();
        let hits = vec![(leaves[0], 0.9), (leaves[1], 0.4), (leaves[2], 0.6)];

        let result = merge_hits(&store, hits, 0.5).unwrap();
        assert_eq!(result[0].id, parent);
        assert!((result[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn one_of_four_children_stays_a_leaf() {
        let (store, _, leaves) = four_leaf_family();
        let hits = vec![(leaves[3], 0.8)];

        let result = merge_hits(&store, hits, 0.5).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, leaves[3]);
        assert!((result[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn exactly_at_threshold_does_not_merge() {
        let (store, _, leaves) = four_leaf_family();
        // 2 of 4 = 0.5, not strictly above 0.5
        let hits = vec![(leaves[0], 0.7), (leaves[1], 0.6)];

        let result = merge_hits(&store, hits, 0.5).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, leaves[0]);
    }

    #[test]
    fn merge_recurses_to_upper_levels() {
        // grandparent -> two parents -> two leaves each
        let mut store = NodeStore::new();
        let grandparent = store.insert("document", 2, None);
        let parent_a = store.insert("first half", 1, Some(grandparent));
        let parent_b = store.insert("second half", 1, Some(grandparent));
        let a1 = store.insert("a1", 0, Some(parent_a));
        let a2 = store.insert("a2", 0, Some(parent_a));
        let b1 = store.insert("b1", 0, Some(parent_b));
        let b2 = store.insert("b2", 0, Some(parent_b));

        // all four leaves retrieved: both parents merge, then the parents
        // (2 of 2 children of the grandparent) merge again
        let hits = vec![(a1, 0.9), (a2, 0.5), (b1, 0.7), (b2, 0.6)];
        let result = merge_hits(&store, hits, 0.5).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, grandparent);
        assert!((result[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn unrelated_leaf_survives_next_to_merge() {
        let mut store = NodeStore::new();
        let root = store.insert("doc", 2, None);
        let parent = store.insert("par", 1, Some(root));
        let lonely_parent = store.insert("other", 1, Some(root));
        let c1 = store.insert("c1", 0, Some(parent));
        let c2 = store.insert("c2", 0, Some(parent));
        let c3 = store.insert("c3", 0, Some(parent));
        let stray = store.insert("stray", 0, Some(lonely_parent));
        let _unretrieved = store.insert("quiet", 0, Some(lonely_parent));

        let hits = vec![(c1, 0.9), (c2, 0.8), (c3, 0.2), (stray, 0.85)];
        let result = merge_hits(&store, hits, 0.5).unwrap();

        // parent absorbed its three children with score 0.9; stray (1 of 2
        // siblings) stays a leaf. At the next level each of parent and
        // stray's parent has only 1 of 2 children present, so no further
        // merge fires and the root stays out of the result.
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, parent);
        assert!((result[0].score - 0.9).abs() < 1e-6);
        assert_eq!(result[1].id, stray);
    }

    #[test]
    fn results_ordered_by_score_then_id() {
        let mut store = NodeStore::new();
        let ids: Vec<NodeId> = (0..3).map(|i| store.insert(format!("n{i}"), 0, None)).collect();
        let hits = vec![(ids[2], 0.5), (ids[0], 0.5), (ids[1], 0.9)];

        let result = merge_hits(&store, hits, 0.5).unwrap();
        assert_eq!(
            result.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![ids[1], ids[0], ids[2]]
        );
    }

    #[test]
    fn hit_missing_from_store_is_fatal() {
        let (store, _, _) = four_leaf_family();

        let result = merge_hits(&store, vec![(NodeId(404), 0.9)], 0.5);
        assert!(matches!(result, Err(RetrievalError::Integrity(_))));
    }
}
