//! # Flame Call Tree
//!
//! Call-tree construction and navigation over flame-graph profiles.
//!
//! ## Features
//!
//! - **Tree building** - per-depth levels to a forest with path-stable ids
//! - **Focus** - zoom into one frame's callees, percentages relative to it
//! - **Sandwich** - merged callers tree and merged callees tree of a label
//! - **Search** - ranked, bounded substring/regex label matching
//! - **Diff metrics** - baseline vs comparison shares, new/removed sentinels
//!
//! ## Architecture
//!
//! ```text
//! ProfileFrame (nested-set rows, JSON or folded stacks)
//!     │
//!     ├──> FlameGraphData (levels arena, labels, sandwich levels)
//!     │
//!     ├──> Tree Builder ──> forest of CallTreeNode
//!     │
//!     ├──> View mode (exactly one)
//!     │      ├─ Default     full forest
//!     │      ├─ Focused     focus(forest, target)
//!     │      └─ Sandwiched  callers/callees of a label
//!     │
//!     └──> Visible nodes
//!            ├─ Search matcher + navigator
//!            └─ Bar widths, diff labels
//! ```
//!
//! ## Example
//!
//! ```rust
//! use flame_calltree::{build_all_call_tree_nodes, search, FlameGraphData, ProfileFrame};
//!
//! let frame = ProfileFrame::default()
//!     .row(0, "main", 15.0)
//!     .row(1, "readFile", 10.0)
//!     .row(2, "parse", 10.0)
//!     .row(1, "readArgs", 5.0);
//! let data = FlameGraphData::from_frame(frame).unwrap();
//!
//! let forest = build_all_call_tree_nodes(&data);
//! assert_eq!(forest[0].subtree_size, 4);
//!
//! let outcome = search(&forest, "read");
//! assert_eq!(outcome.match_ids, vec!["0.0", "0.1"]);
//! ```

mod builder;
mod config;
mod data;
mod display;
mod error;
mod focus;
mod frame;
mod sandwich;
mod search;
mod types;
mod view;
mod weight;

pub use builder::{build_all_call_tree_nodes, build_tree_from_levels};
pub use config::{EngineConfig, FocusConfig, SearchConfig};
pub use data::{FlameGraphData, ItemRef, SandwichLevels};
pub use display::{DisplayValue, ValueUnit};
pub use error::{CallTreeError, Result, SearchError};
pub use focus::{focus, FocusTarget, FocusedView};
pub use frame::{ProfileFrame, ProfileRow};
pub use sandwich::{build_callees_tree, build_callers_tree, sandwich, SandwichView};
pub use search::{search, Matcher, SearchNavigator, SearchOutcome, MAX_MATCHES};
pub use types::{find_node, pre_order, CallTreeNode, LevelItem, Levels, PreOrder};
pub use view::{CallTreeView, ViewMode, Visible};
pub use weight::{
    bar_width, diff_label, diff_percent, diff_tone, DiffTone, PercentBase, DIFF_PLACEHOLDER,
};
