use crate::data::FlameGraphData;
use crate::types::{CallTreeNode, LevelItem, Levels};
use crate::weight::PercentBase;

/// Build the full call-tree forest of a data container
pub fn build_all_call_tree_nodes(data: &FlameGraphData) -> Vec<CallTreeNode> {
    build_tree_from_levels(data.levels(), data)
}

/// Build a forest from any top-down level set (the container's own levels or
/// merged callee levels).
///
/// Every item of level 0 becomes a root; children are resolved through the
/// level arena. Dangling child indexes are skipped, so malformed levels
/// produce a partial or empty forest rather than an error.
pub fn build_tree_from_levels(levels: &Levels, data: &FlameGraphData) -> Vec<CallTreeNode> {
    let Some(roots) = levels.first() else {
        return Vec::new();
    };

    let mut forest: Vec<CallTreeNode> = roots
        .iter()
        .enumerate()
        .map(|(ordinal, item)| build_node(levels, data, item, ordinal.to_string(), None, 0))
        .collect();

    let base = PercentBase::of_forest(&forest);
    for root in &mut forest {
        base.apply(root);
    }

    log::debug!(
        "Built call tree: {} roots, {} nodes",
        forest.len(),
        forest.iter().map(|root| root.subtree_size).sum::<usize>()
    );

    forest
}

/// Self weights of a node: its totals minus the totals of the children it
/// kept. Shared by the level builder and the callers tree, so
/// `total == self + Σ children.total` holds by construction.
pub(crate) fn derived_self(
    total: f64,
    total_right: Option<f64>,
    children: &[CallTreeNode],
) -> (f64, Option<f64>) {
    let self_value = total - children.iter().map(|c| c.total).sum::<f64>();
    let self_right =
        total_right.map(|right| right - children.iter().filter_map(|c| c.total_right).sum::<f64>());
    (self_value, self_right)
}

fn build_node(
    levels: &Levels,
    data: &FlameGraphData,
    item: &LevelItem,
    id: String,
    parent_id: Option<String>,
    depth: usize,
) -> CallTreeNode {
    let child_items = item.children.iter().filter_map(|&child| {
        let found = levels.get(item.level + 1).and_then(|level| level.get(child));
        if found.is_none() {
            log::warn!(
                "Dropping dangling child {child} of level {} item",
                item.level
            );
        }
        found
    });

    let children: Vec<CallTreeNode> = child_items
        .enumerate()
        .map(|(ordinal, child)| {
            build_node(
                levels,
                data,
                child,
                format!("{id}.{ordinal}"),
                Some(id.clone()),
                depth + 1,
            )
        })
        .collect();

    let total = item.value;
    let total_right = item.value_right;
    let (self_value, self_right) = derived_self(total, total_right, &children);

    let label = item
        .item_indexes
        .first()
        .map(|&row| data.label(row).to_string())
        .unwrap_or_default();

    CallTreeNode {
        id,
        label,
        parent_id,
        subtree_size: 1 + children.iter().map(|c| c.subtree_size).sum::<usize>(),
        children,
        depth,
        self_value,
        total,
        self_percent: 0.0,
        total_percent: 0.0,
        self_right,
        total_right,
        total_percent_right: None,
        diff_percent: None,
        item_indexes: item.item_indexes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ProfileFrame;
    use pretty_assertions::assert_eq;

    fn build(frame: ProfileFrame) -> Vec<CallTreeNode> {
        build_all_call_tree_nodes(&FlameGraphData::from_frame(frame).unwrap())
    }

    #[test]
    fn recursive_frames_get_distinct_ids() {
        let forest = build(
            ProfileFrame::default()
                .row(0, "f", 3.0)
                .row(1, "f", 2.0)
                .row(2, "f", 1.0),
        );

        let ids: Vec<(&str, usize)> = crate::types::pre_order(&forest)
            .map(|n| (n.id.as_str(), n.depth))
            .collect();
        assert_eq!(ids, vec![("0", 0), ("0.0", 1), ("0.0.0", 2)]);
        assert_eq!(forest[0].children[0].parent_id.as_deref(), Some("0"));
    }

    #[test]
    fn self_is_derived_when_frame_has_no_self_column() {
        let forest = build(
            ProfileFrame::default()
                .row(0, "main", 10.0)
                .row(1, "a", 4.0)
                .row(1, "b", 3.0),
        );

        let root = &forest[0];
        assert_eq!(root.self_value, 3.0);
        assert_eq!(root.subtree_size, 3);
        assert_eq!(root.total_percent, 100.0);
        assert_eq!(root.children[0].total_percent, 40.0);
        assert_eq!(root.children[1].self_percent, 30.0);
    }

    #[test]
    fn self_column_matches_derived_self() {
        let raw = r#"{"rows":[
            {"level":0,"label":"main","value":10,"self":3},
            {"level":1,"label":"a","value":7,"self":7}
        ]}"#;
        let forest = build(ProfileFrame::from_json(raw).unwrap());
        assert_eq!(forest[0].self_value, 3.0);
        assert_eq!(forest[0].children[0].self_value, 7.0);
    }

    #[test]
    fn inconsistent_self_column_is_rejected_before_building() {
        let raw = r#"{"rows":[
            {"level":0,"label":"main","value":10,"self":9},
            {"level":1,"label":"a","value":7}
        ]}"#;
        let frame = ProfileFrame::from_json(raw).unwrap();
        assert!(FlameGraphData::from_frame(frame).is_err());
    }

    #[test]
    fn skipped_children_fold_into_self() {
        let data = FlameGraphData::from_frame(
            ProfileFrame::default()
                .row(0, "main", 10.0)
                .row(1, "a", 4.0),
        )
        .unwrap();
        let mut levels = data.levels().clone();
        levels[0][0].children = vec![9];

        let forest = build_tree_from_levels(&levels, &data);
        assert_eq!(forest[0].total, 10.0);
        assert_eq!(forest[0].self_value, 10.0);
    }

    #[test]
    fn multiple_roots_share_one_percent_base() {
        let forest = build(
            ProfileFrame::default()
                .row(0, "a", 3.0)
                .row(0, "b", 1.0),
        );
        let ids: Vec<&str> = forest.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1"]);
        assert_eq!(forest[0].total_percent, 75.0);
        assert_eq!(forest[1].total_percent, 25.0);
    }

    #[test]
    fn empty_data_builds_empty_forest() {
        assert!(build(ProfileFrame::default()).is_empty());
    }

    #[test]
    fn dangling_children_are_skipped() {
        let data = FlameGraphData::from_frame(ProfileFrame::default().row(0, "main", 1.0)).unwrap();
        let mut levels = data.levels().clone();
        levels[0][0].children.push(7);

        let forest = build_tree_from_levels(&levels, &data);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn diff_profiles_carry_right_side_metrics() {
        let forest = build(
            ProfileFrame::default()
                .diff_row(0, "main", 10.0, 4.0)
                .diff_row(1, "grown", 4.0, 3.0)
                .diff_row(1, "gone", 2.0, 0.0),
        );

        let root = &forest[0];
        assert_eq!(root.self_right, Some(1.0));
        assert_eq!(root.diff_percent, Some(0.0));
        let grown = &root.children[0];
        assert_eq!(grown.total_percent_right, Some(75.0));
        assert!(grown.diff_percent.unwrap() > 0.0);
        assert_eq!(root.children[1].diff_percent, Some(-100.0));
    }
}
