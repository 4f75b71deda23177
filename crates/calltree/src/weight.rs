//! Bar widths, percentages and diff display semantics.

use crate::types::CallTreeNode;
use serde::Serialize;

pub const DIFF_PLACEHOLDER: &str = "–";

/// Weights percentages are computed against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentBase {
    /// Combined total (both sides for diff profiles)
    pub total: f64,
    /// Comparison-side total (diff profiles only)
    pub right: Option<f64>,
}

impl PercentBase {
    /// Sum of the root totals of a forest
    pub fn of_forest(forest: &[CallTreeNode]) -> Self {
        let total = forest.iter().map(|root| root.total).sum();
        let right = forest.iter().map(|root| root.total_right).sum::<Option<f64>>();
        Self {
            total,
            right: if forest.is_empty() { None } else { right },
        }
    }

    pub fn of_node(node: &CallTreeNode) -> Self {
        Self {
            total: node.total,
            right: node.total_right,
        }
    }

    /// Recompute the percentage fields of `node` and all its descendants
    pub fn apply(&self, node: &mut CallTreeNode) {
        self.apply_node(node);
        for child in &mut node.children {
            self.apply(child);
        }
    }

    /// Recompute the percentage fields of `node` only
    pub fn apply_node(&self, node: &mut CallTreeNode) {
        match (self.right, node.total_right) {
            (Some(base_right), Some(right)) => {
                let base_left = self.total - base_right;
                let left = node.total - right;
                let self_left = node.self_value - node.self_right.unwrap_or(0.0);

                node.total_percent = percent(left, base_left);
                node.self_percent = percent(self_left, base_left);
                node.total_percent_right = Some(percent(right, base_right));
                node.diff_percent =
                    diff_percent(ratio(left, base_left), ratio(right, base_right));
            }
            _ => {
                node.total_percent = percent(node.total, self.total);
                node.self_percent = percent(node.self_value, self.total);
                node.total_percent_right = None;
                node.diff_percent = None;
            }
        }
    }
}

fn ratio(value: f64, base: f64) -> f64 {
    if base > 0.0 {
        value / base
    } else {
        0.0
    }
}

fn percent(value: f64, base: f64) -> f64 {
    ratio(value, base) * 100.0
}

/// Relative change between the baseline share and the comparison share.
///
/// A frame absent from the baseline is `+∞` (new), a frame absent from the
/// comparison is `-100` (removed), a frame absent from both has no diff.
pub fn diff_percent(left_share: f64, right_share: f64) -> Option<f64> {
    match (left_share > 0.0, right_share > 0.0) {
        (false, false) => None,
        (false, true) => Some(f64::INFINITY),
        (true, false) => Some(-100.0),
        (true, true) => Some((right_share - left_share) / left_share * 100.0),
    }
}

/// Bar width in percent for a node of the currently shown tree.
///
/// Without focus the width is the node's own `total_percent`. With focus the
/// focused node's parent (shown only as context) gets no bar and every other
/// node is sized against the focused node.
pub fn bar_width(node: &CallTreeNode, focused: Option<&CallTreeNode>) -> f64 {
    match focused {
        None => node.total_percent.min(100.0),
        Some(focus) if focus.parent_id.as_deref() == Some(node.id.as_str()) => 0.0,
        Some(focus) => percent(node.total, focus.total).min(100.0),
    }
}

/// Display text for a diff value. `NaN`, which `diff_percent` never yields
/// but a consumer may pass, renders like a missing value.
pub fn diff_label(diff: Option<f64>) -> String {
    match diff {
        None => DIFF_PLACEHOLDER.to_string(),
        Some(value) if value == f64::INFINITY => "new".to_string(),
        Some(value) if value == -100.0 => "removed".to_string(),
        Some(value) if value.is_nan() => DIFF_PLACEHOLDER.to_string(),
        Some(value) => format!("{value:+.2}%"),
    }
}

/// Color family for a diff value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTone {
    /// Grew in the comparison profile
    Regression,
    /// Shrank in the comparison profile
    Improvement,
    Neutral,
}

pub fn diff_tone(diff: Option<f64>) -> DiffTone {
    match diff {
        Some(value) if value > 0.0 => DiffTone::Regression,
        Some(value) if value < 0.0 => DiffTone::Improvement,
        _ => DiffTone::Neutral,
    }
}
