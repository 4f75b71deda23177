use crate::display::{DisplayValue, ValueUnit};
use crate::error::Result;
use crate::frame::ProfileFrame;
use crate::types::{LevelItem, Levels};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Address of a [`LevelItem`] inside [`Levels`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ItemRef {
    pub level: usize,
    pub index: usize,
}

/// Both halves of a sandwich view for one label.
///
/// `callers[k]` holds, for every occurrence of the label, the frame `k` steps
/// above it (`callers[0]` are the occurrences themselves). A caller item's
/// single child is the item one step closer to the occurrence; its value is
/// the occurrence weight flowing through it. Occurrences are not merged.
///
/// `callees` is a regular top-down level set rooted at one item that merges
/// every occurrence, with children merged by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SandwichLevels {
    pub callers: Levels,
    pub callees: Levels,
}

/// Profiling data container: the frame plus its per-depth levels
#[derive(Debug, Clone, Default)]
pub struct FlameGraphData {
    frame: ProfileFrame,
    levels: Levels,
    nodes_by_label: HashMap<String, Vec<ItemRef>>,
}

impl FlameGraphData {
    pub fn from_frame(frame: ProfileFrame) -> Result<Self> {
        frame.validate()?;
        let (levels, nodes_by_label) = nested_set_to_levels(&frame);

        log::debug!(
            "Built {} levels from {} rows ({} unique labels)",
            levels.len(),
            frame.rows.len(),
            nodes_by_label.len()
        );

        Ok(Self {
            frame,
            levels,
            nodes_by_label,
        })
    }

    pub fn levels(&self) -> &Levels {
        &self.levels
    }

    pub fn frame(&self) -> &ProfileFrame {
        &self.frame
    }

    pub fn item(&self, item: ItemRef) -> Option<&LevelItem> {
        self.levels.get(item.level)?.get(item.index)
    }

    /// Label of a frame row; empty for out-of-range rows
    pub fn label(&self, index: usize) -> &str {
        self.frame
            .rows
            .get(index)
            .map(|row| row.label.as_str())
            .unwrap_or_default()
    }

    pub fn value(&self, indexes: &[usize]) -> f64 {
        indexes
            .iter()
            .filter_map(|&i| self.frame.rows.get(i))
            .map(|row| row.value)
            .sum()
    }

    pub fn value_right(&self, indexes: &[usize]) -> Option<f64> {
        if !self.is_diff_flamegraph() {
            return None;
        }
        Some(
            indexes
                .iter()
                .filter_map(|&i| self.frame.rows.get(i))
                .filter_map(|row| row.value_right)
                .sum(),
        )
    }

    /// Self weight when the frame carries a self column for every given row
    pub fn self_value(&self, indexes: &[usize]) -> Option<f64> {
        sum_column(&self.frame, indexes, |row| row.self_value)
    }

    pub fn self_right(&self, indexes: &[usize]) -> Option<f64> {
        sum_column(&self.frame, indexes, |row| row.self_right)
    }

    pub fn is_diff_flamegraph(&self) -> bool {
        self.frame.is_diff()
    }

    pub fn unit(&self) -> ValueUnit {
        self.frame.unit
    }

    pub fn value_display(&self, value: f64) -> DisplayValue {
        self.frame.unit.display(value)
    }

    /// Every item carrying the label, in row order
    pub fn nodes_with_label(&self, label: &str) -> &[ItemRef] {
        self.nodes_by_label
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn unique_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.nodes_by_label.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Caller and callee level sets for all occurrences of `label`.
    ///
    /// Only outermost occurrences take part: an occurrence nested below
    /// another occurrence of the same label is already part of that
    /// occurrence's weight.
    pub fn sandwich_levels(&self, label: &str) -> SandwichLevels {
        let occurrences: Vec<ItemRef> = self
            .nodes_with_label(label)
            .iter()
            .copied()
            .filter(|&occurrence| !self.has_ancestor_labelled(occurrence, label))
            .collect();

        if occurrences.is_empty() {
            return SandwichLevels::default();
        }

        SandwichLevels {
            callers: self.caller_levels(&occurrences),
            callees: self.merge_callees(&occurrences),
        }
    }

    fn parent_of(&self, item: ItemRef) -> Option<ItemRef> {
        let parent = self.item(item)?.parent?;
        Some(ItemRef {
            level: item.level.checked_sub(1)?,
            index: parent,
        })
    }

    fn label_of(&self, item: ItemRef) -> &str {
        self.item(item)
            .and_then(|it| it.item_indexes.first())
            .map(|&row| self.label(row))
            .unwrap_or_default()
    }

    fn has_ancestor_labelled(&self, item: ItemRef, label: &str) -> bool {
        let mut current = self.parent_of(item);
        while let Some(ancestor) = current {
            if self.label_of(ancestor) == label {
                return true;
            }
            current = self.parent_of(ancestor);
        }
        false
    }

    fn caller_levels(&self, occurrences: &[ItemRef]) -> Levels {
        let mut levels: Levels = Vec::new();

        for &occurrence in occurrences {
            let Some(target) = self.item(occurrence) else {
                continue;
            };

            let mut distance = 0;
            let mut current = Some(occurrence);
            let mut below: Option<usize> = None;

            while let Some(item_ref) = current {
                let Some(source) = self.item(item_ref) else {
                    break;
                };
                if levels.len() <= distance {
                    levels.push(Vec::new());
                }

                let index = levels[distance].len();
                let start = levels[distance]
                    .last()
                    .map(|prev| prev.start + prev.value)
                    .unwrap_or(0.0);
                levels[distance].push(LevelItem {
                    start,
                    value: target.value,
                    value_right: target.value_right,
                    item_indexes: source.item_indexes.clone(),
                    level: distance,
                    parent: None,
                    children: below.into_iter().collect(),
                });
                if let Some(below) = below {
                    levels[distance - 1][below].parent = Some(index);
                }

                below = Some(index);
                distance += 1;
                current = self.parent_of(item_ref);
            }
        }

        levels
    }

    fn merge_callees(&self, occurrences: &[ItemRef]) -> Levels {
        struct Pending {
            previous: Option<usize>,
            items: Vec<ItemRef>,
            level: usize,
        }

        let mut levels: Levels = Vec::new();
        let mut queue = VecDeque::from([Pending {
            previous: None,
            items: occurrences.to_vec(),
            level: 0,
        }]);

        while let Some(pending) = queue.pop_front() {
            let sources: Vec<(ItemRef, &LevelItem)> = pending
                .items
                .iter()
                .filter_map(|&r| self.item(r).map(|item| (r, item)))
                .collect();

            let item_indexes: Vec<usize> = sources
                .iter()
                .flat_map(|(_, item)| item.item_indexes.iter().copied())
                .collect();
            let value = sources.iter().map(|(_, item)| item.value).sum();
            let value_right = self.value_right(&item_indexes);

            if levels.len() <= pending.level {
                levels.push(Vec::new());
            }
            let index = levels[pending.level].len();

            let start = match pending.previous {
                Some(prev) => {
                    let parent = &levels[pending.level - 1][prev];
                    let siblings: f64 = parent
                        .children
                        .iter()
                        .map(|&c| levels[pending.level][c].value)
                        .sum();
                    parent.start + siblings
                }
                None => 0.0,
            };

            levels[pending.level].push(LevelItem {
                start,
                value,
                value_right,
                item_indexes,
                level: pending.level,
                parent: pending.previous,
                children: Vec::new(),
            });
            if let Some(prev) = pending.previous {
                levels[pending.level - 1][prev].children.push(index);
            }

            // Group the next generation by label, keeping first-seen order.
            let mut groups: Vec<(&str, Vec<ItemRef>)> = Vec::new();
            for (item_ref, item) in &sources {
                for &child in &item.children {
                    let child_ref = ItemRef {
                        level: item_ref.level + 1,
                        index: child,
                    };
                    let label = self.label_of(child_ref);
                    match groups.iter_mut().find(|(l, _)| *l == label) {
                        Some((_, group)) => group.push(child_ref),
                        None => groups.push((label, vec![child_ref])),
                    }
                }
            }

            for (_, items) in groups {
                queue.push_back(Pending {
                    previous: Some(index),
                    items,
                    level: pending.level + 1,
                });
            }
        }

        levels
    }
}

fn sum_column(
    frame: &ProfileFrame,
    indexes: &[usize],
    column: impl Fn(&crate::frame::ProfileRow) -> Option<f64>,
) -> Option<f64> {
    indexes
        .iter()
        .map(|&i| frame.rows.get(i).and_then(&column))
        .sum()
}

/// Nested-set rows to per-level items.
///
/// A row at a level not deeper than the previous row becomes the next sibling
/// of the last item on its level; a deeper row is the first child of the last
/// item one level up.
fn nested_set_to_levels(frame: &ProfileFrame) -> (Levels, HashMap<String, Vec<ItemRef>>) {
    let mut levels: Levels = Vec::new();
    let mut nodes_by_label: HashMap<String, Vec<ItemRef>> = HashMap::new();
    let mut previous_level: Option<usize> = None;

    for (row_idx, row) in frame.rows.iter().enumerate() {
        let level = row.level;
        while levels.len() <= level {
            levels.push(Vec::new());
        }

        let parent = level
            .checked_sub(1)
            .and_then(|p| levels[p].len().checked_sub(1));

        let start = match previous_level {
            Some(prev) if level <= prev => levels[level]
                .last()
                .map(|sibling| sibling.start + sibling.value)
                .unwrap_or(0.0),
            _ => parent
                .map(|p| levels[level - 1][p].start)
                .unwrap_or(0.0),
        };

        let index = levels[level].len();
        if let Some(p) = parent {
            levels[level - 1][p].children.push(index);
        }
        levels[level].push(LevelItem {
            start,
            value: row.value,
            value_right: row.value_right,
            item_indexes: vec![row_idx],
            level,
            parent,
            children: Vec::new(),
        });
        nodes_by_label
            .entry(row.label.clone())
            .or_default()
            .push(ItemRef { level, index });

        previous_level = Some(level);
    }

    (levels, nodes_by_label)
}
