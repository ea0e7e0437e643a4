//! Hierarchical chunker
//!
//! Builds a multi-level node tree from raw text: the root holds the whole
//! document, each tier splits its parents into smaller chunks, and the
//! finest tier becomes the leaves (level 0). Every leaf's ancestor chain
//! reaches the root in exactly `tiers.len()` steps.

use crate::chunking::text::chunk_text;
use crate::config::ChunkingConfig;
use crate::store::{NodeId, NodeStore};

/// Build the tree and return the root id. Empty input produces a single
/// empty root with no children, not an error.
pub fn build_hierarchy(store: &mut NodeStore, text: &str, config: &ChunkingConfig) -> NodeId {
    let levels = config.tiers.len() as u32;
    let root = store.insert(text, levels, None);

    if text.trim().is_empty() {
        return root;
    }

    let mut frontier = vec![root];
    for (depth, &tier) in config.tiers.iter().enumerate() {
        let level = levels - 1 - depth as u32;
        let mut next = Vec::with_capacity(frontier.len());

        for parent in frontier {
            let parent_text = store
                .get(parent)
                .map(|n| n.text.clone())
                .unwrap_or_default();

            for piece in chunk_text(&parent_text, tier, config.overlap) {
                next.push(store.insert(piece, level, Some(parent)));
            }
        }

        frontier = next;
    }

    tracing::debug!(
        nodes = store.len(),
        levels = config.tiers.len(),
        "built hierarchical index"
    );

    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tiers: Vec<usize>, overlap: usize) -> ChunkingConfig {
        ChunkingConfig { tiers, overlap }
    }

    fn sample_text() -> String {
        "Getting started with a personal project is the fastest way to learn. \
         Pick something small, scope it tightly, and ship a first version. \
         Then iterate: add evaluation, gather feedback, and grow the scope. \
         A portfolio of finished projects beats one unfinished moonshot."
            .repeat(3)
    }

    #[test]
    fn ancestor_chain_reaches_root_in_levels_steps() {
        let mut store = NodeStore::new();
        let cfg = config(vec![256, 64], 8);
        let root = build_hierarchy(&mut store, &sample_text(), &cfg);

        assert!(store.validate().is_ok());
        for leaf in store.leaf_ids() {
            let mut steps = 0;
            let mut current = leaf;
            while let Some(parent) = store.get(current).and_then(|n| n.parent_id) {
                current = parent;
                steps += 1;
            }
            assert_eq!(current, root);
            assert_eq!(steps, cfg.tiers.len());
        }
    }

    #[test]
    fn levels_decrease_towards_leaves() {
        let mut store = NodeStore::new();
        let cfg = config(vec![256, 64], 8);
        let root = build_hierarchy(&mut store, &sample_text(), &cfg);

        assert_eq!(store.get(root).unwrap().level, 2);
        for node in store.nodes() {
            if let Some(pid) = node.parent_id {
                assert_eq!(store.get(pid).unwrap().level, node.level + 1);
            }
        }
        assert!(store.leaf_ids().len() > 1);
    }

    #[test]
    fn empty_text_yields_lone_root() {
        let mut store = NodeStore::new();
        let root = build_hierarchy(&mut store, "", &config(vec![128, 32], 4));

        assert_eq!(store.len(), 1);
        let node = store.get(root).unwrap();
        assert!(node.child_ids.is_empty());
        assert!(node.text.is_empty());
    }

    #[test]
    fn children_cover_parent_text() {
        let mut store = NodeStore::new();
        let cfg = config(vec![128, 32], 4);
        build_hierarchy(&mut store, &sample_text(), &cfg);

        // every chunk's text occurs inside its parent's text
        for node in store.nodes() {
            if let Some(pid) = node.parent_id {
                let parent = store.get(pid).unwrap();
                assert!(
                    parent.text.contains(node.text.as_str()),
                    "child text not found in parent"
                );
            }
        }
    }
}
