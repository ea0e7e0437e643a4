//! Node store
//!
//! Arena of indexed text nodes with parent/child relations. Built once per
//! document version, then read-only during querying, so concurrent queries
//! can share it behind an `Arc` without locking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Node identifier, assigned sequentially by the store at insert time.
/// Sequential ids make score tie-breaks deterministic (lower id wins).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Precomputed sentence window carried as metadata on sentence nodes.
/// Only the single sentence text is ever embedded; the window is substituted
/// at synthesis time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowMeta {
    /// Contiguous join of the surrounding sentences, in original order
    pub text: String,
    /// First sentence node in the span
    pub start_id: NodeId,
    /// Last sentence node in the span
    pub end_id: NodeId,
}

/// A unit of indexed text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub text: String,
    /// Depth in the hierarchy, 0 = leaf. Sentence nodes are always 0.
    pub level: u32,
    pub parent_id: Option<NodeId>,
    /// Ordered, complete set of immediate children
    pub child_ids: Vec<NodeId>,
    #[serde(default)]
    pub window: Option<WindowMeta>,
}

impl Node {
    /// Text synthesis should see for this node: the precomputed window when
    /// present, otherwise the node's own text
    pub fn context_text(&self) -> &str {
        self.window
            .as_ref()
            .map(|w| w.text.as_str())
            .unwrap_or(&self.text)
    }
}

/// Tree invariant violations. These indicate a build-time bug and are never
/// recoverable at query time.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("{0} references missing parent {1}")]
    DanglingParent(NodeId, NodeId),

    #[error("{0} references missing child {1}")]
    DanglingChild(NodeId, NodeId),

    #[error("child {0} does not point back to parent {1}")]
    ParentMismatch(NodeId, NodeId),

    #[error("leaf {0} has children")]
    LeafWithChildren(NodeId),
}

/// Id-keyed node arena. Upward traversal (child -> parent) is a map lookup,
/// no embedded back-pointers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStore {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node and link it under `parent_id` if given. The child is
    /// appended to the parent's `child_ids`, preserving insertion order.
    pub fn insert(
        &mut self,
        text: impl Into<String>,
        level: u32,
        parent_id: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        self.nodes.insert(
            id,
            Node {
                id,
                text: text.into(),
                level,
                parent_id,
                child_ids: Vec::new(),
                window: None,
            },
        );

        if let Some(pid) = parent_id {
            if let Some(parent) = self.nodes.get_mut(&pid) {
                parent.child_ids.push(id);
            }
        }

        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Attach window metadata to a sentence node
    pub fn set_window(&mut self, id: NodeId, window: WindowMeta) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.window = Some(window);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Ids of all leaf nodes (level 0), ascending
    pub fn leaf_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.level == 0)
            .map(|n| n.id)
            .collect();
        ids.sort();
        ids
    }

    /// Verify tree invariants: no dangling references, parent/child links
    /// agree, leaves have no children.
    pub fn validate(&self) -> Result<(), IntegrityError> {
        for node in self.nodes.values() {
            if let Some(pid) = node.parent_id {
                let parent = self
                    .nodes
                    .get(&pid)
                    .ok_or(IntegrityError::DanglingParent(node.id, pid))?;
                if !parent.child_ids.contains(&node.id) {
                    return Err(IntegrityError::ParentMismatch(node.id, pid));
                }
            }
            if node.level == 0 && !node.child_ids.is_empty() {
                return Err(IntegrityError::LeafWithChildren(node.id));
            }
            for &cid in &node.child_ids {
                let child = self
                    .nodes
                    .get(&cid)
                    .ok_or(IntegrityError::DanglingChild(node.id, cid))?;
                if child.parent_id != Some(node.id) {
                    return Err(IntegrityError::ParentMismatch(cid, node.id));
                }
            }
        }
        Ok(())
    }
}
