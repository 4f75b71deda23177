use crate::builder::{build_tree_from_levels, derived_self};
use crate::data::FlameGraphData;
use crate::types::{CallTreeNode, LevelItem, Levels};
use crate::weight::PercentBase;
use serde::Serialize;
use std::collections::HashMap;

/// Both sides of a label: who calls it, and what it calls
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SandwichView {
    pub label: String,
    /// Inverted tree: outermost callers at the roots, occurrences at the leaves
    pub callers: Vec<CallTreeNode>,
    /// All occurrences merged into one root, callees merged by label below it
    pub callees: Vec<CallTreeNode>,
    /// The merged target node; `None` when the label does not occur
    pub callers_node: Option<CallTreeNode>,
}

pub fn sandwich(data: &FlameGraphData, label: &str) -> SandwichView {
    let levels = data.sandwich_levels(label);
    let callers = build_callers_tree(&levels.callers, data);
    let callees = build_callees_tree(&levels.callees, data);

    log::debug!(
        "Sandwich for {label:?}: {} caller roots, {} callee nodes",
        callers.len(),
        callees.iter().map(|n| n.subtree_size).sum::<usize>()
    );

    SandwichView {
        label: label.to_string(),
        callers_node: callees.first().cloned(),
        callers,
        callees,
    }
}

pub fn build_callees_tree(callee_levels: &Levels, data: &FlameGraphData) -> Vec<CallTreeNode> {
    build_tree_from_levels(callee_levels, data)
}

/// Merged caller-path node, before ids are assigned
struct MergeNode {
    label: String,
    value: f64,
    value_right: Option<f64>,
    item_indexes: Vec<usize>,
    children: Vec<usize>,
}

/// Build the inverted callers tree from per-occurrence caller levels.
///
/// Each occurrence contributes one path from its outermost caller down to the
/// occurrence. Path frames merge when they share label, distance from the
/// target and (merged) parent, so a caller reached through several paths
/// shows up once with the summed weight.
pub fn build_callers_tree(caller_levels: &Levels, data: &FlameGraphData) -> Vec<CallTreeNode> {
    let Some(occurrences) = caller_levels.first() else {
        return Vec::new();
    };

    let mut arena: Vec<MergeNode> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut index: HashMap<(Option<usize>, String, usize), usize> = HashMap::new();

    for occurrence in 0..occurrences.len() {
        let path = caller_path(caller_levels, occurrence);

        let mut parent: Option<usize> = None;
        for (distance, item) in path {
            let label = item
                .item_indexes
                .first()
                .map(|&row| data.label(row))
                .unwrap_or_default();

            let key = (parent, label.to_string(), distance);
            let node = match index.get(&key) {
                Some(&node) => node,
                None => {
                    let node = arena.len();
                    arena.push(MergeNode {
                        label: label.to_string(),
                        value: 0.0,
                        value_right: item.value_right.map(|_| 0.0),
                        item_indexes: Vec::new(),
                        children: Vec::new(),
                    });
                    match parent {
                        Some(parent) => arena[parent].children.push(node),
                        None => roots.push(node),
                    }
                    index.insert(key, node);
                    node
                }
            };

            let merged = &mut arena[node];
            merged.value += item.value;
            merged.value_right = merged
                .value_right
                .zip(item.value_right)
                .map(|(acc, right)| acc + right);
            merged.item_indexes.extend(item.item_indexes.iter().copied());

            parent = Some(node);
        }
    }

    let mut forest: Vec<CallTreeNode> = roots
        .iter()
        .enumerate()
        .map(|(ordinal, &root)| materialize(&arena, root, ordinal.to_string(), None, 0))
        .collect();

    let base = PercentBase::of_forest(&forest);
    for root in &mut forest {
        base.apply(root);
    }

    forest
}

/// Frames from the outermost caller down to occurrence `occurrence`, each
/// with its distance from the target
fn caller_path(levels: &Levels, occurrence: usize) -> Vec<(usize, &LevelItem)> {
    let mut path = Vec::new();
    let mut current = levels.first().and_then(|level| level.get(occurrence));
    let mut distance = 0;

    while let Some(item) = current {
        path.push((distance, item));
        current = item
            .parent
            .and_then(|parent| levels.get(distance + 1)?.get(parent));
        distance += 1;
    }

    path.reverse();
    path
}

fn materialize(
    arena: &[MergeNode],
    idx: usize,
    id: String,
    parent_id: Option<String>,
    depth: usize,
) -> CallTreeNode {
    let merged = &arena[idx];
    let children: Vec<CallTreeNode> = merged
        .children
        .iter()
        .enumerate()
        .map(|(ordinal, &child)| {
            materialize(
                arena,
                child,
                format!("{id}.{ordinal}"),
                Some(id.clone()),
                depth + 1,
            )
        })
        .collect();

    let (self_value, self_right) = derived_self(merged.value, merged.value_right, &children);

    CallTreeNode {
        id,
        label: merged.label.clone(),
        parent_id,
        subtree_size: 1 + children.iter().map(|c| c.subtree_size).sum::<usize>(),
        children,
        depth,
        self_value,
        total: merged.value,
        self_percent: 0.0,
        total_percent: 0.0,
        self_right,
        total_right: merged.value_right,
        total_percent_right: None,
        diff_percent: None,
        item_indexes: merged.item_indexes.clone(),
    }
}
