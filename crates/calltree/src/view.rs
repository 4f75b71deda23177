use crate::builder::build_all_call_tree_nodes;
use crate::config::EngineConfig;
use crate::data::FlameGraphData;
use crate::focus::{focus, FocusTarget};
use crate::sandwich::{sandwich, SandwichView};
use crate::search::{Matcher, SearchNavigator, SearchOutcome};
use crate::types::{find_node, CallTreeNode};
use crate::weight::bar_width;
use serde::Serialize;

/// Which derived view is shown. Exactly one mode is active at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "target", rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Default,
    Focused(FocusTarget),
    Sandwiched(String),
}

/// The nodes currently shown plus breadcrumb references
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Visible {
    pub nodes: Vec<CallTreeNode>,
    pub focused_node: Option<CallTreeNode>,
    pub callers_node: Option<CallTreeNode>,
    pub depth_offset: usize,
}

/// Call tree of one data container with its active view and search state.
///
/// Every input change (data, mode, query) recomputes the derived state from
/// scratch; nothing derived is patched in place.
pub struct CallTreeView {
    config: EngineConfig,
    matcher: Matcher,
    data: FlameGraphData,
    forest: Vec<CallTreeNode>,
    mode: ViewMode,
    visible: Visible,
    sandwich: Option<SandwichView>,
    query: String,
    search: SearchOutcome,
    navigator: SearchNavigator,
}

impl CallTreeView {
    pub fn new(data: FlameGraphData, config: EngineConfig) -> Self {
        let forest = build_all_call_tree_nodes(&data);
        let mut view = Self {
            matcher: Matcher::new(&config.search),
            config,
            data,
            forest,
            mode: ViewMode::Default,
            visible: Visible::default(),
            sandwich: None,
            query: String::new(),
            search: SearchOutcome::default(),
            navigator: SearchNavigator::default(),
        };
        view.refresh();
        view
    }

    /// Swap in new data; the active mode is kept and falls back to the full
    /// tree if its target no longer exists.
    pub fn set_data(&mut self, data: FlameGraphData) {
        self.forest = build_all_call_tree_nodes(&data);
        self.data = data;
        self.refresh();
    }

    pub fn focus(&mut self, target: FocusTarget) {
        self.set_mode(ViewMode::Focused(target));
    }

    pub fn sandwich(&mut self, label: impl Into<String>) {
        self.set_mode(ViewMode::Sandwiched(label.into()));
    }

    pub fn reset(&mut self) {
        self.set_mode(ViewMode::Default);
    }

    fn set_mode(&mut self, mode: ViewMode) {
        if self.mode != mode {
            log::debug!("View mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.refresh();
        }
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn data(&self) -> &FlameGraphData {
        &self.data
    }

    pub fn forest(&self) -> &[CallTreeNode] {
        &self.forest
    }

    pub fn visible(&self) -> &Visible {
        &self.visible
    }

    /// Callee half of the active sandwich; empty outside sandwich mode
    pub fn callees(&self) -> &[CallTreeNode] {
        self.sandwich
            .as_ref()
            .map(|view| view.callees.as_slice())
            .unwrap_or_default()
    }

    /// Run a search over the visible nodes and return its outcome.
    ///
    /// Repeating the current query keeps the navigation position; any other
    /// query starts over at the first match.
    pub fn search(&mut self, query: &str) -> &SearchOutcome {
        let reset = self.query != query;
        self.query = query.to_string();
        self.run_search(reset);
        &self.search
    }

    pub fn search_outcome(&self) -> &SearchOutcome {
        &self.search
    }

    pub fn next_match(&mut self) -> Option<&str> {
        self.navigator.next()
    }

    pub fn prev_match(&mut self) -> Option<&str> {
        self.navigator.prev()
    }

    pub fn current_match_index(&self) -> Option<usize> {
        self.navigator.current_index()
    }

    pub fn current_match(&self) -> Option<&CallTreeNode> {
        let id = self.navigator.current_id()?;
        find_node(&self.visible.nodes, id)
    }

    pub fn bar_width(&self, node: &CallTreeNode) -> f64 {
        bar_width(node, self.visible.focused_node.as_ref())
    }

    fn refresh(&mut self) {
        self.sandwich = None;
        self.visible = match &self.mode {
            ViewMode::Default => Visible {
                nodes: self.forest.clone(),
                ..Visible::default()
            },
            ViewMode::Focused(target) => {
                let view = focus(&self.forest, target, self.config.focus.parent_context);
                Visible {
                    nodes: view.nodes,
                    focused_node: view.focused_node,
                    callers_node: None,
                    depth_offset: view.depth_offset,
                }
            }
            ViewMode::Sandwiched(label) => {
                let view = sandwich(&self.data, label);
                let visible = Visible {
                    nodes: view.callers.clone(),
                    focused_node: None,
                    callers_node: view.callers_node.clone(),
                    depth_offset: 0,
                };
                self.sandwich = Some(view);
                visible
            }
        };
        self.run_search(true);
    }

    fn run_search(&mut self, reset: bool) {
        self.search = self.matcher.search(&self.visible.nodes, &self.query);
        let match_ids = self.search.match_ids.clone();
        if reset {
            self.navigator.reset(match_ids);
        } else {
            self.navigator.update(match_ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ProfileFrame;

    fn data() -> FlameGraphData {
        let frame = ProfileFrame::default()
            .row(0, "main", 20.0)
            .row(1, "readFile", 10.0)
            .row(2, "parse", 10.0)
            .row(1, "readArgs", 5.0)
            .row(2, "parse", 5.0)
            .row(1, "idle", 5.0);
        FlameGraphData::from_frame(frame).unwrap()
    }

    #[test]
    fn modes_replace_each_other() {
        let mut view = CallTreeView::new(data(), EngineConfig::default());
        view.focus(FocusTarget::Id("0.1".into()));
        assert!(view.visible().focused_node.is_some());

        view.sandwich("parse");
        assert_eq!(view.mode(), &ViewMode::Sandwiched("parse".into()));
        assert!(view.visible().focused_node.is_none());
        assert_eq!(view.visible().callers_node.as_ref().map(|n| n.total), Some(15.0));
        assert_eq!(view.callees().len(), 1);

        view.reset();
        assert_eq!(view.visible().nodes, view.forest());
        assert!(view.callees().is_empty());
    }

    #[test]
    fn repeated_query_keeps_navigation_position() {
        let mut view = CallTreeView::new(data(), EngineConfig::default());
        view.search("read");
        assert_eq!(view.current_match_index(), Some(0));
        view.next_match();
        assert_eq!(view.current_match_index(), Some(1));

        view.search("read");
        assert_eq!(view.current_match_index(), Some(1));

        view.search("parse");
        assert_eq!(view.current_match_index(), Some(0));
        assert_eq!(view.current_match().map(|n| n.total), Some(10.0));

        view.search("nothing here");
        assert_eq!(view.current_match_index(), None);
    }

    #[test]
    fn different_query_with_same_matches_resets_position() {
        let mut view = CallTreeView::new(data(), EngineConfig::default());
        view.search("read");
        view.next_match();
        assert_eq!(view.current_match_index(), Some(1));

        view.search("rEaD");
        assert_eq!(view.search_outcome().match_ids, vec!["0.0", "0.1"]);
        assert_eq!(view.current_match_index(), Some(0));
    }

    #[test]
    fn new_data_resets_position_even_with_same_matches() {
        let mut view = CallTreeView::new(data(), EngineConfig::default());
        view.search("read");
        view.next_match();
        assert_eq!(view.current_match_index(), Some(1));

        let same_shape = ProfileFrame::default()
            .row(0, "main", 40.0)
            .row(1, "readFile", 20.0)
            .row(1, "readArgs", 10.0);
        view.set_data(FlameGraphData::from_frame(same_shape).unwrap());
        assert_eq!(view.search_outcome().match_ids, vec!["0.0", "0.1"]);
        assert_eq!(view.current_match_index(), Some(0));
    }

    #[test]
    fn mode_change_resets_position() {
        let mut view = CallTreeView::new(data(), EngineConfig::default());
        view.search("parse");
        view.next_match();
        assert_eq!(view.current_match_index(), Some(1));

        view.focus(FocusTarget::Id("0".into()));
        assert_eq!(view.search_outcome().match_ids.len(), 2);
        assert_eq!(view.current_match_index(), Some(0));
    }

    #[test]
    fn search_follows_the_visible_tree() {
        let mut view = CallTreeView::new(data(), EngineConfig::default());
        view.search("parse");
        assert_eq!(view.search_outcome().match_ids.len(), 2);

        view.focus(FocusTarget::Id("0.1".into()));
        assert_eq!(view.search_outcome().match_ids, vec!["0.1.0"]);
        assert_eq!(view.current_match_index(), Some(0));
    }

    #[test]
    fn stale_focus_falls_back_after_data_change() {
        let mut view = CallTreeView::new(data(), EngineConfig::default());
        view.focus(FocusTarget::Id("0.2".into()));
        assert!(view.visible().focused_node.is_some());

        let smaller = FlameGraphData::from_frame(ProfileFrame::default().row(0, "main", 1.0)).unwrap();
        view.set_data(smaller);
        assert!(view.visible().focused_node.is_none());
        assert_eq!(view.visible().nodes.len(), 1);
    }

    #[test]
    fn focus_hides_parent_bar() {
        let mut view = CallTreeView::new(data(), EngineConfig::default());
        view.focus(FocusTarget::Id("0.0".into()));

        let context = &view.visible().nodes[0];
        assert_eq!(context.id, "0");
        assert_eq!(view.bar_width(context), 0.0);
        assert_eq!(view.bar_width(&context.children[0]), 100.0);
        assert_eq!(view.visible().depth_offset, 1);
    }
}
