use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

/// Names and labels the history tree uses.
///
/// Every field has a default, so an empty TOML file (or no file at all) gives
/// the behavior the editor has always had.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Branch that exists in a fresh store and receives legacy imports.
    pub default_branch: String,
    /// Prefix for automatically created fork branches (`<prefix>_<n>`).
    pub fork_prefix: String,
    /// Note given to imported legacy items that carry none.
    pub legacy_note: String,
    /// Note used by callers that commit without one.
    pub default_note: String,
    /// Host-document key holding the portable tree.
    pub tree_key: String,
    /// Host-document key holding the old flat history list.
    pub legacy_key: String,
    /// Document keys left out when comparing a snapshot with the document.
    pub diff_ignore: Vec<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".into(),
            fork_prefix: "branch".into(),
            legacy_note: "Legacy Import".into(),
            default_note: "Snapshot".into(),
            tree_key: "history_tree".into(),
            legacy_key: "prompt_history".into(),
            diff_ignore: vec!["batch_data".into(), "ui_reset_token".into()],
        }
    }
}

impl HistoryConfig {
    /// Parse a config from TOML text and check it.
    pub fn from_toml_str(text: &str) -> HistoryResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| HistoryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would produce unusable branch names or keys.
    pub fn validate(&self) -> HistoryResult<()> {
        for (field, value) in [
            ("default_branch", &self.default_branch),
            ("fork_prefix", &self.fork_prefix),
            ("tree_key", &self.tree_key),
            ("legacy_key", &self.legacy_key),
        ] {
            if value.is_empty() {
                return Err(HistoryError::Config(format!("{field} must not be empty")));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(HistoryError::Config(format!(
                    "{field} must not contain whitespace: {value:?}"
                )));
            }
        }
        if self.tree_key == self.legacy_key {
            return Err(HistoryError::Config(
                "tree_key and legacy_key must differ".into(),
            ));
        }
        Ok(())
    }
}
