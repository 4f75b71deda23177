use crate::display::ValueUnit;
use crate::error::{CallTreeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a nested-set profile frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Depth of the frame (0 = root)
    pub level: usize,

    pub label: String,

    /// Total weight, including callees. For diff profiles this is the sum of
    /// baseline and comparison weight.
    pub value: f64,

    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_value: Option<f64>,

    /// Comparison-side total weight (diff profiles only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_right: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_right: Option<f64>,
}

/// Profile in nested-set form: rows in depth-first order, each carrying its
/// level. A row's parent is the closest preceding row one level up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileFrame {
    #[serde(default)]
    pub unit: ValueUnit,
    pub rows: Vec<ProfileRow>,
}

impl ProfileFrame {
    pub fn new(unit: ValueUnit) -> Self {
        Self {
            unit,
            rows: Vec::new(),
        }
    }

    /// Builder: append a row without self or diff columns
    #[must_use]
    pub fn row(mut self, level: usize, label: impl Into<String>, value: f64) -> Self {
        self.rows.push(ProfileRow {
            level,
            label: label.into(),
            value,
            self_value: None,
            value_right: None,
            self_right: None,
        });
        self
    }

    /// Builder: append a diff row. `value` is the combined weight of both
    /// sides, `value_right` the comparison side.
    #[must_use]
    pub fn diff_row(
        mut self,
        level: usize,
        label: impl Into<String>,
        value: f64,
        value_right: f64,
    ) -> Self {
        self.rows.push(ProfileRow {
            level,
            label: label.into(),
            value,
            self_value: None,
            value_right: Some(value_right),
            self_right: None,
        });
        self
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Parse collapsed stacks (`main;parse;lex 42` per line).
    ///
    /// Identical stacks are summed, stacks are ordered lexicographically and
    /// common prefixes merge into shared frames. Blank lines and lines without
    /// a numeric trailing count are skipped.
    pub fn from_folded(raw: &str, unit: ValueUnit) -> Result<Self> {
        let mut stacks: BTreeMap<&str, f64> = BTreeMap::new();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((stack, count)) = line.rsplit_once(char::is_whitespace) else {
                log::warn!("Skipping folded line {}: missing count", line_no + 1);
                continue;
            };
            let count: f64 = match count.parse() {
                Ok(count) => count,
                Err(_) => {
                    log::warn!("Skipping folded line {}: bad count {count:?}", line_no + 1);
                    continue;
                }
            };
            if !count.is_finite() || count < 0.0 {
                return Err(CallTreeError::invalid_frame(
                    line_no,
                    format!("count must be a finite non-negative number, got {count}"),
                ));
            }
            *stacks.entry(stack.trim_end()).or_insert(0.0) += count;
        }

        let mut trie = StackTrie::default();
        for (stack, count) in stacks {
            trie.insert(stack.split(';').filter(|frame| !frame.is_empty()), count);
        }

        let mut frame = Self::new(unit);
        trie.emit(&mut frame.rows);
        Ok(frame)
    }

    pub fn is_diff(&self) -> bool {
        self.rows.first().is_some_and(|row| row.value_right.is_some())
    }

    /// Check the nested-set shape and the numeric columns
    pub fn validate(&self) -> Result<()> {
        let diff = self.is_diff();
        let mut previous_level: Option<usize> = None;

        for (idx, row) in self.rows.iter().enumerate() {
            match previous_level {
                None if row.level != 0 => {
                    return Err(CallTreeError::invalid_frame(
                        idx,
                        format!("first row must be at level 0, got {}", row.level),
                    ));
                }
                Some(prev) if row.level > prev + 1 => {
                    return Err(CallTreeError::invalid_frame(
                        idx,
                        format!("level jumps from {prev} to {}", row.level),
                    ));
                }
                _ => {}
            }
            previous_level = Some(row.level);

            let numbers = [Some(row.value), row.self_value, row.value_right, row.self_right];
            if numbers
                .iter()
                .flatten()
                .any(|value| !value.is_finite() || *value < 0.0)
            {
                return Err(CallTreeError::invalid_frame(
                    idx,
                    "values must be finite and non-negative",
                ));
            }

            if row.value_right.is_some() != diff {
                return Err(CallTreeError::invalid_frame(
                    idx,
                    "value_right must be present on all rows or none",
                ));
            }
        }

        self.validate_self_columns()
    }

    /// A given `self` must equal the row's value minus its direct children's
    /// values; the same holds for `self_right` on the comparison side.
    fn validate_self_columns(&self) -> Result<()> {
        let mut children_value = vec![0.0; self.rows.len()];
        let mut children_right = vec![0.0; self.rows.len()];
        let mut ancestors: Vec<usize> = Vec::new();

        for (idx, row) in self.rows.iter().enumerate() {
            ancestors.truncate(row.level);
            if let Some(&parent) = ancestors.last() {
                children_value[parent] += row.value;
                children_right[parent] += row.value_right.unwrap_or(0.0);
            }
            ancestors.push(idx);
        }

        for (idx, row) in self.rows.iter().enumerate() {
            if let Some(self_value) = row.self_value {
                check_self(idx, "self", self_value, row.value - children_value[idx])?;
            }
            if let Some(self_right) = row.self_right {
                let expected = row.value_right.unwrap_or(0.0) - children_right[idx];
                check_self(idx, "self_right", self_right, expected)?;
            }
        }

        Ok(())
    }
}

const SELF_TOLERANCE: f64 = 1e-6;

fn check_self(row: usize, column: &str, given: f64, expected: f64) -> Result<()> {
    let scale = given.abs().max(expected.abs()).max(1.0);
    if (given - expected).abs() > SELF_TOLERANCE * scale {
        return Err(CallTreeError::invalid_frame(
            row,
            format!("{column} is {given} but value minus children is {expected}"),
        ));
    }
    Ok(())
}

#[derive(Default)]
struct StackTrie {
    // Index 0 is a synthetic root that is never emitted.
    nodes: Vec<TrieNode>,
}

struct TrieNode {
    label: String,
    value: f64,
    children: Vec<usize>,
}

impl StackTrie {
    fn insert<'a>(&mut self, frames: impl Iterator<Item = &'a str>, count: f64) {
        if self.nodes.is_empty() {
            self.nodes.push(TrieNode {
                label: String::new(),
                value: 0.0,
                children: Vec::new(),
            });
        }

        let mut current = 0;
        for label in frames {
            let existing = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child].label == label);
            current = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode {
                        label: label.to_string(),
                        value: 0.0,
                        children: Vec::new(),
                    });
                    self.nodes[current].children.push(child);
                    child
                }
            };
            self.nodes[current].value += count;
        }
    }

    fn emit(&self, rows: &mut Vec<ProfileRow>) {
        let Some(root) = self.nodes.first() else {
            return;
        };
        let mut stack: Vec<(usize, usize)> = root.children.iter().rev().map(|&c| (c, 0)).collect();
        while let Some((idx, level)) = stack.pop() {
            let node = &self.nodes[idx];
            let children_value: f64 = node.children.iter().map(|&c| self.nodes[c].value).sum();
            rows.push(ProfileRow {
                level,
                label: node.label.clone(),
                value: node.value,
                self_value: Some(node.value - children_value),
                value_right: None,
                self_right: None,
            });
            stack.extend(node.children.iter().rev().map(|&c| (c, level + 1)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn folded_stacks_merge_common_prefixes() {
        let raw = "main;readFile;parse 10\nmain;readArgs;parse 5\nmain;readFile;parse 2\n";
        let frame = ProfileFrame::from_folded(raw, ValueUnit::Short).unwrap();

        let summary: Vec<(usize, &str, f64, Option<f64>)> = frame
            .rows
            .iter()
            .map(|r| (r.level, r.label.as_str(), r.value, r.self_value))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "main", 17.0, Some(0.0)),
                (1, "readArgs", 5.0, Some(0.0)),
                (2, "parse", 5.0, Some(5.0)),
                (1, "readFile", 12.0, Some(0.0)),
                (2, "parse", 12.0, Some(12.0)),
            ]
        );
        frame.validate().unwrap();
    }

    #[test]
    fn folded_lines_without_count_are_skipped() {
        let frame = ProfileFrame::from_folded("main;a\n\nmain;b 3\n", ValueUnit::Short).unwrap();
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[1].label, "b");
    }

    #[test]
    fn validate_rejects_level_jumps() {
        let frame = ProfileFrame::default().row(0, "main", 1.0).row(2, "deep", 1.0);
        let err = frame.validate().unwrap_err();
        assert!(matches!(err, CallTreeError::InvalidFrame { row: 1, .. }));
    }

    #[test]
    fn validate_rejects_mixed_diff_columns() {
        let frame = ProfileFrame::default()
            .diff_row(0, "main", 4.0, 2.0)
            .row(1, "child", 1.0);
        assert!(frame.validate().is_err());
    }

    #[test]
    fn validate_rejects_self_that_disagrees_with_children() {
        let raw = r#"{"rows":[
            {"level":0,"label":"main","value":10,"self":9},
            {"level":1,"label":"a","value":7}
        ]}"#;
        let frame = ProfileFrame::from_json(raw).unwrap();
        let err = frame.validate().unwrap_err();
        assert!(matches!(err, CallTreeError::InvalidFrame { row: 0, .. }));
        assert!(err.to_string().contains("self is 9"));
    }

    #[test]
    fn validate_accepts_consistent_self_columns() {
        let raw = r#"{"rows":[
            {"level":0,"label":"main","value":10,"self":3,"value_right":4,"self_right":1},
            {"level":1,"label":"a","value":7,"self":2,"value_right":3,"self_right":0},
            {"level":2,"label":"b","value":5,"self":5,"value_right":3,"self_right":3},
            {"level":0,"label":"idle","value":1,"self":1,"value_right":0,"self_right":0}
        ]}"#;
        ProfileFrame::from_json(raw).unwrap().validate().unwrap();
    }

    #[test]
    fn validate_rejects_inconsistent_self_right() {
        let frame = ProfileFrame {
            unit: ValueUnit::Short,
            rows: vec![ProfileRow {
                level: 0,
                label: "main".into(),
                value: 4.0,
                self_value: None,
                value_right: Some(2.0),
                self_right: Some(3.0),
            }],
        };
        assert!(matches!(
            frame.validate(),
            Err(CallTreeError::InvalidFrame { row: 0, .. })
        ));
    }

    #[test]
    fn frame_parses_from_json() {
        let raw = r#"{"unit":"nanoseconds","rows":[{"level":0,"label":"main","value":3,"self":1}]}"#;
        let frame = ProfileFrame::from_json(raw).unwrap();
        assert_eq!(frame.unit, ValueUnit::Nanoseconds);
        assert_eq!(frame.rows[0].self_value, Some(1.0));
    }
}
