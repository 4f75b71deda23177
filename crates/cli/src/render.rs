use flame_calltree::{bar_width, diff_label, CallTreeNode, FlameGraphData};

const BAR_CELLS: usize = 20;

/// How forest rows are drawn
pub struct RowStyle<'a> {
    pub data: &'a FlameGraphData,
    pub focused: Option<&'a CallTreeNode>,
    pub matches: &'a [String],
    pub max_depth: Option<usize>,
}

/// One text line per node, indented by distance from the forest root
pub fn forest_lines(nodes: &[CallTreeNode], style: &RowStyle<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    for root in nodes {
        push_lines(root, 0, style, &mut lines);
    }
    lines
}

fn push_lines(node: &CallTreeNode, level: usize, style: &RowStyle<'_>, out: &mut Vec<String>) {
    if style.max_depth.is_some_and(|max| level > max) {
        return;
    }
    out.push(row(node, level, style));
    for child in &node.children {
        push_lines(child, level + 1, style, out);
    }
}

fn row(node: &CallTreeNode, level: usize, style: &RowStyle<'_>) -> String {
    let marker = if style.matches.iter().any(|id| id == &node.id) {
        '*'
    } else {
        ' '
    };
    let width = bar_width(node, style.focused);

    let mut line = format!(
        "{marker} {} {:>7.2}%  {:indent$}{}  {} (self {})",
        bar(width),
        node.total_percent,
        "",
        node.label,
        style.data.value_display(node.total),
        style.data.value_display(node.self_value),
        indent = level * 2
    );
    if node.is_diff() {
        line.push_str("  ");
        line.push_str(&diff_label(node.diff_percent));
    }
    line
}

fn bar(width_percent: f64) -> String {
    let filled = ((width_percent.clamp(0.0, 100.0) / 100.0) * BAR_CELLS as f64).round() as usize;
    let filled = filled.min(BAR_CELLS);
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_CELLS - filled))
}
