use std::fmt;

use serde::{Deserialize, Serialize};

/// The three fixed buckets a query is split into: diagnose, change, confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    /// Read-only diagnostics run before any change.
    Show,
    /// Commands applied inside configuration mode.
    Config,
    /// Read-only checks run after the change.
    Verify,
}

impl CommandCategory {
    /// All categories in execution order.
    pub const ALL: [CommandCategory; 3] = [Self::Show, Self::Config, Self::Verify];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Config => "config",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Planner output: ordered command lists per category.
///
/// Missing categories deserialize as empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSet {
    #[serde(default)]
    pub show: Vec<String>,
    #[serde(default)]
    pub config: Vec<String>,
    #[serde(default)]
    pub verify: Vec<String>,
}

impl CommandSet {
    pub fn new(show: Vec<String>, config: Vec<String>, verify: Vec<String>) -> Self {
        Self {
            show,
            config,
            verify,
        }
    }

    /// Commands for one category, in order.
    pub fn get(&self, category: CommandCategory) -> &[String] {
        match category {
            CommandCategory::Show => &self.show,
            CommandCategory::Config => &self.config,
            CommandCategory::Verify => &self.verify,
        }
    }

    /// Total number of commands across all categories.
    pub fn total(&self) -> usize {
        self.show.len() + self.config.len() + self.verify.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Upper bound on the number of execution records this set can produce:
    /// one per show/verify command plus the config batch and its save.
    pub fn max_records(&self) -> usize {
        let batch = if self.config.is_empty() { 0 } else { 2 };
        self.show.len() + batch + self.verify.len()
    }
}
