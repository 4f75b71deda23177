use crate::error::{CallTreeError, Result};
use crate::search::MAX_MATCHES;
use serde::{Deserialize, Serialize};

/// Tunables of the call-tree engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub focus: FocusConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Traversal stops once this many matches are collected
    pub max_matches: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_matches: MAX_MATCHES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Keep the focused node's parent above it as breadcrumb context
    pub parent_context: bool,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            parent_context: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.max_matches == 0 {
            return Err(CallTreeError::invalid_config(
                "search.max_matches must be > 0",
            ));
        }
        Ok(())
    }
}
