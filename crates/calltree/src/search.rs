use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{pre_order, CallTreeNode};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

pub const MAX_MATCHES: usize = 50;

const REGEX_METACHARACTERS: &[char] = &[
    '.', '*', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\',
];

/// Ranked match ids plus the reported pattern error, if any
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Ordered by descending total; equal totals keep traversal order
    pub match_ids: Vec<String>,
    pub error: Option<SearchError>,
}

enum LabelPattern {
    Substring(String),
    Regex(Regex),
}

impl LabelPattern {
    /// `Ok(None)` for blank queries
    fn parse(query: &str) -> Result<Option<Self>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        if query.contains(REGEX_METACHARACTERS) {
            let regex = RegexBuilder::new(query)
                .case_insensitive(true)
                .build()
                .map_err(|err| {
                    log::debug!("Rejected search pattern {query:?}: {err}");
                    SearchError::InvalidPattern
                })?;
            return Ok(Some(Self::Regex(regex)));
        }

        Ok(Some(Self::Substring(query.to_lowercase())))
    }

    fn is_match(&self, label: &str) -> bool {
        match self {
            Self::Substring(needle) => label.to_lowercase().contains(needle.as_str()),
            Self::Regex(regex) => regex.is_match(label),
        }
    }
}

/// Label matcher over the currently shown nodes
#[derive(Debug, Clone)]
pub struct Matcher {
    max_matches: usize,
}

impl Matcher {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            max_matches: config.max_matches,
        }
    }

    /// Depth-first scan collecting at most `max_matches` labels that match
    /// `query`, then ranked by total.
    ///
    /// Queries with regex metacharacters are case-insensitive regexes, all
    /// others case-insensitive substrings.
    pub fn search(&self, nodes: &[CallTreeNode], query: &str) -> SearchOutcome {
        let pattern = match LabelPattern::parse(query) {
            Ok(Some(pattern)) => pattern,
            Ok(None) => return SearchOutcome::default(),
            Err(error) => {
                return SearchOutcome {
                    match_ids: Vec::new(),
                    error: Some(error),
                }
            }
        };

        let mut matches: Vec<&CallTreeNode> = pre_order(nodes)
            .filter(|node| pattern.is_match(&node.label))
            .take(self.max_matches)
            .collect();
        matches.sort_by(|a, b| b.total.total_cmp(&a.total));

        SearchOutcome {
            match_ids: matches.into_iter().map(|node| node.id.clone()).collect(),
            error: None,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(&SearchConfig::default())
    }
}

pub fn search(nodes: &[CallTreeNode], query: &str) -> SearchOutcome {
    Matcher::default().search(nodes, query)
}

/// Current position within a match list.
///
/// `update` keeps the position when an equal list is re-applied (same query
/// over the same tree); `reset` always starts over at the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchNavigator {
    match_ids: Vec<String>,
    current: Option<usize>,
}

impl SearchNavigator {
    /// Returns `true` when the list changed and the position was reset
    pub fn update(&mut self, match_ids: Vec<String>) -> bool {
        if match_ids == self.match_ids {
            return false;
        }
        self.reset(match_ids);
        true
    }

    /// Replace the list and move to its first match, if any
    pub fn reset(&mut self, match_ids: Vec<String>) {
        self.current = if match_ids.is_empty() { None } else { Some(0) };
        self.match_ids = match_ids;
    }

    pub fn next(&mut self) -> Option<&str> {
        let len = self.match_ids.len();
        let current = self.current?;
        self.current = Some((current + 1) % len);
        self.current_id()
    }

    pub fn prev(&mut self) -> Option<&str> {
        let len = self.match_ids.len();
        let current = self.current?;
        self.current = Some((current + len - 1) % len);
        self.current_id()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_id(&self) -> Option<&str> {
        self.match_ids.get(self.current?).map(String::as_str)
    }

    pub fn match_ids(&self) -> &[String] {
        &self.match_ids
    }

    pub fn is_match(&self, id: &str) -> bool {
        self.match_ids.iter().any(|m| m == id)
    }
}
