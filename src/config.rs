//! Engine policy knobs, loadable from the `config` section of a contract document.
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_NAMED_DEPTH: usize = 256;
pub const DEFAULT_MAX_COMBINATIONS: usize = 1_000_000;

/// What to do with object keys / attributes a pattern does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedKeyPolicy {
    #[default]
    Strict,
    Permissive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub unexpected_keys: UnexpectedKeyPolicy,
    /// Named patterns that may be nested inside each other along one path.
    pub max_named_depth: usize,
    /// Upper bound on specialisations produced by one `new_based_on` call.
    pub max_combinations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unexpected_keys: UnexpectedKeyPolicy::Strict,
            max_named_depth: DEFAULT_MAX_NAMED_DEPTH,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }
}
