//! Call-tree node model and the per-depth level arena it is built from.
//!
//! Node ids are dotted sibling-ordinal paths from the forest root, so a frame
//! keeps its id across rebuilds of the same data even under recursion.

use serde::{Deserialize, Serialize};

/// Node of a constructed call tree.
///
/// Nodes are owned by the tree they belong to and are rebuilt rather than
/// mutated whenever the underlying data or the active view changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTreeNode {
    /// Dotted chain of sibling ordinals from the forest root (e.g. "0.2.1")
    pub id: String,

    /// Frame name
    pub label: String,

    /// `None` only for forest roots
    pub parent_id: Option<String>,

    /// Callees, in source order
    pub children: Vec<CallTreeNode>,

    pub depth: usize,

    /// Weight of this frame alone
    #[serde(rename = "self")]
    pub self_value: f64,

    /// Weight of this frame including its callees
    pub total: f64,

    pub self_percent: f64,
    pub total_percent: f64,

    /// Comparison-side self weight (diff profiles only)
    pub self_right: Option<f64>,

    /// Comparison-side total weight (diff profiles only)
    pub total_right: Option<f64>,

    pub total_percent_right: Option<f64>,

    /// Relative change between baseline and comparison share, see
    /// [`crate::weight::diff_percent`]
    pub diff_percent: Option<f64>,

    /// `1 + Σ children.subtree_size`
    pub subtree_size: usize,

    /// Rows of the source frame contributing to this node
    pub item_indexes: Vec<usize>,
}

impl CallTreeNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_diff(&self) -> bool {
        self.total_right.is_some()
    }

    /// Pre-order walk over this node and its descendants
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            stack: vec![self],
        }
    }

    /// Find a descendant (or self) by id, following the dotted path
    pub fn find(&self, id: &str) -> Option<&CallTreeNode> {
        if self.id == id {
            return Some(self);
        }
        let rest = id.strip_prefix(self.id.as_str())?.strip_prefix('.')?;
        let ordinal: usize = rest.split('.').next()?.parse().ok()?;
        self.children.get(ordinal)?.find(id)
    }

    /// Shallow clone carrying only the given children
    pub fn with_children(&self, children: Vec<CallTreeNode>) -> CallTreeNode {
        CallTreeNode {
            id: self.id.clone(),
            label: self.label.clone(),
            parent_id: self.parent_id.clone(),
            children,
            depth: self.depth,
            self_value: self.self_value,
            total: self.total,
            self_percent: self.self_percent,
            total_percent: self.total_percent,
            self_right: self.self_right,
            total_right: self.total_right,
            total_percent_right: self.total_percent_right,
            diff_percent: self.diff_percent,
            subtree_size: self.subtree_size,
            item_indexes: self.item_indexes.clone(),
        }
    }
}

/// Pre-order iterator over a forest
pub struct PreOrder<'a> {
    stack: Vec<&'a CallTreeNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a CallTreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

pub fn pre_order(forest: &[CallTreeNode]) -> PreOrder<'_> {
    PreOrder {
        stack: forest.iter().rev().collect(),
    }
}

/// Find a node anywhere in a forest by its path id
pub fn find_node<'a>(forest: &'a [CallTreeNode], id: &str) -> Option<&'a CallTreeNode> {
    let root_ordinal: usize = id.split('.').next()?.parse().ok()?;
    forest
        .get(root_ordinal)
        .and_then(|root| root.find(id))
        // Derived views (focus, sandwich) may not keep ordinals aligned with
        // forest positions.
        .or_else(|| pre_order(forest).find(|node| node.id == id))
}

/// Item of one depth level of the data container.
///
/// Levels form an arena addressed by `(level, index)`: `parent` points into
/// level `level - 1`, `children` into level `level + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelItem {
    /// Horizontal offset in value units from the left edge of the graph
    pub start: f64,
    pub value: f64,
    pub value_right: Option<f64>,
    /// Source frame rows merged into this item
    pub item_indexes: Vec<usize>,
    pub level: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

pub type Levels = Vec<Vec<LevelItem>>;
