use std::collections::HashSet;

use flame_calltree::{
    build_all_call_tree_nodes, focus, pre_order, sandwich, search, CallTreeNode, FlameGraphData,
    FocusTarget, ProfileFrame, MAX_MATCHES,
};
use proptest::prelude::*;

const LABELS: &[&str] = &["main", "f", "g", "parse", "alloc"];

/// Turn `(level hint, label, self)` triples into a valid nested-set frame:
/// levels never jump by more than one and every value covers its children.
fn frame_from_shape(shape: &[(usize, usize, u8)]) -> ProfileFrame {
    let mut levels = Vec::with_capacity(shape.len());
    for (i, &(hint, _, _)) in shape.iter().enumerate() {
        let level = if i == 0 { 0 } else { hint.min(levels[i - 1] + 1) };
        levels.push(level);
    }

    let mut values = vec![0.0; shape.len()];
    for i in (0..shape.len()).rev() {
        let mut value = f64::from(shape[i].2);
        let mut j = i + 1;
        while j < shape.len() && levels[j] > levels[i] {
            if levels[j] == levels[i] + 1 {
                value += values[j];
            }
            j += 1;
        }
        values[i] = value;
    }

    shape
        .iter()
        .enumerate()
        .fold(ProfileFrame::default(), |frame, (i, &(_, label, _))| {
            frame.row(levels[i], LABELS[label % LABELS.len()], values[i])
        })
}

fn shape_strategy() -> impl Strategy<Value = Vec<(usize, usize, u8)>> {
    prop::collection::vec((0usize..6, 0usize..LABELS.len(), 0u8..20), 0..40)
}

fn assert_node_invariants(node: &CallTreeNode) {
    let children_total: f64 = node.children.iter().map(|c| c.total).sum();
    assert!(
        (node.total - (node.self_value + children_total)).abs() < 1e-6,
        "total of {} is {} but self {} + children {}",
        node.id,
        node.total,
        node.self_value,
        children_total
    );
    assert_eq!(
        node.subtree_size,
        1 + node.children.iter().map(|c| c.subtree_size).sum::<usize>()
    );
    for child in &node.children {
        assert_eq!(child.depth, node.depth + 1);
        assert_eq!(child.parent_id.as_deref(), Some(node.id.as_str()));
        assert_node_invariants(child);
    }
}

fn assert_forest_invariants(forest: &[CallTreeNode]) {
    let mut ids = HashSet::new();
    for node in pre_order(forest) {
        assert!(ids.insert(node.id.clone()), "duplicate id {}", node.id);
    }
    for root in forest {
        assert_node_invariants(root);
    }
}

proptest! {
    #[test]
    fn built_forest_keeps_tree_invariants(shape in shape_strategy()) {
        let data = FlameGraphData::from_frame(frame_from_shape(&shape)).unwrap();
        let forest = build_all_call_tree_nodes(&data);

        prop_assert_eq!(forest.iter().map(|r| r.subtree_size).sum::<usize>(), shape.len());
        assert_forest_invariants(&forest);
        prop_assert_eq!(&forest, &build_all_call_tree_nodes(&data));
    }

    #[test]
    fn focused_views_keep_tree_invariants(shape in shape_strategy(), pick in any::<prop::sample::Index>()) {
        let data = FlameGraphData::from_frame(frame_from_shape(&shape)).unwrap();
        let forest = build_all_call_tree_nodes(&data);
        let ids: Vec<String> = pre_order(&forest).map(|n| n.id.clone()).collect();
        prop_assume!(!ids.is_empty());

        let id = ids[pick.index(ids.len())].clone();
        for with_parent in [true, false] {
            let view = focus(&forest, &FocusTarget::Id(id.clone()), with_parent);
            let focused = view.focused_node.as_ref().unwrap();
            prop_assert_eq!(&focused.id, &id);
            prop_assert!(focused.total_percent == 100.0 || focused.total == 0.0);
            assert_forest_invariants(&view.nodes);
        }
    }

    #[test]
    fn sandwich_halves_keep_tree_invariants(shape in shape_strategy(), label in 0usize..LABELS.len()) {
        let data = FlameGraphData::from_frame(frame_from_shape(&shape)).unwrap();
        let view = sandwich(&data, LABELS[label]);

        assert_forest_invariants(&view.callers);
        assert_forest_invariants(&view.callees);
        prop_assert!(view.callees.len() <= 1);
        if let Some(root) = view.callees.first() {
            prop_assert_eq!(root.label.as_str(), LABELS[label]);
            let callers_weight: f64 = view.callers.iter().map(|r| r.total).sum();
            prop_assert!((callers_weight - root.total).abs() < 1e-6);
        }
    }

    #[test]
    fn search_results_are_bounded_ranked_matches(shape in shape_strategy(), label in 0usize..LABELS.len()) {
        let data = FlameGraphData::from_frame(frame_from_shape(&shape)).unwrap();
        let forest = build_all_call_tree_nodes(&data);
        let outcome = search(&forest, LABELS[label]);

        prop_assert!(outcome.error.is_none());
        prop_assert!(outcome.match_ids.len() <= MAX_MATCHES);
        let totals: Vec<f64> = outcome
            .match_ids
            .iter()
            .map(|id| {
                let node = flame_calltree::find_node(&forest, id).unwrap();
                assert!(node.label.to_lowercase().contains(LABELS[label]));
                node.total
            })
            .collect();
        prop_assert!(totals.windows(2).all(|pair| pair[0] >= pair[1]));
    }
}
