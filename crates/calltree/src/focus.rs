use crate::types::{find_node, pre_order, CallTreeNode};
use crate::weight::PercentBase;
use serde::{Deserialize, Serialize};

/// What to zoom into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum FocusTarget {
    /// Path id of one node
    Id(String),
    /// First node carrying the label, in pre-order
    Label(String),
}

/// Result of zooming into one node's callees
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusedView {
    pub nodes: Vec<CallTreeNode>,

    /// `None` when the target was not found and `nodes` is the full forest
    pub focused_node: Option<CallTreeNode>,

    /// Original depth of the focused node; subtract it to indent from zero
    pub depth_offset: usize,
}

/// Zoom into the callees of `target`.
///
/// Percentages inside the view are recomputed against the focused node's
/// total. With `with_parent_context` the focused node's parent is kept above
/// it as a one-child clone whose self weight absorbs the hidden siblings, so
/// total and subtree-size invariants still hold. A target that cannot be found
/// (e.g. an id left over from previous data) yields the unchanged forest.
pub fn focus(
    forest: &[CallTreeNode],
    target: &FocusTarget,
    with_parent_context: bool,
) -> FocusedView {
    let found = match target {
        FocusTarget::Id(id) => find_node(forest, id),
        FocusTarget::Label(label) => pre_order(forest).find(|node| &node.label == label),
    };

    let Some(found) = found else {
        log::debug!("Focus target {target:?} not found, showing the full tree");
        return FocusedView {
            nodes: forest.to_vec(),
            focused_node: None,
            depth_offset: 0,
        };
    };

    let base = PercentBase::of_node(found);
    let mut focused = found.clone();
    base.apply(&mut focused);

    let parent = found
        .parent_id
        .as_deref()
        .and_then(|parent_id| find_node(forest, parent_id))
        .filter(|_| with_parent_context);

    let nodes = match parent {
        Some(parent) => vec![parent_context(parent, &focused, &base)],
        None => vec![focused.clone()],
    };

    log::debug!(
        "Focused on {} ({}) at depth {}",
        focused.id,
        focused.label,
        focused.depth
    );

    FocusedView {
        nodes,
        depth_offset: focused.depth,
        focused_node: Some(focused),
    }
}

fn parent_context(
    parent: &CallTreeNode,
    focused: &CallTreeNode,
    base: &PercentBase,
) -> CallTreeNode {
    let mut context = parent.with_children(vec![focused.clone()]);
    context.self_value = parent.total - focused.total;
    context.self_right = parent
        .total_right
        .zip(focused.total_right)
        .map(|(parent_right, focused_right)| parent_right - focused_right);
    context.subtree_size = 1 + focused.subtree_size;
    base.apply_node(&mut context);
    context
}
