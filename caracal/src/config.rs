//! Search configuration.

use serde::{Deserialize, Serialize};

/// Direction of the reachability analysis.
///
/// Backward starts from states of the bad region and follows predecessors
/// towards the initial state; forward starts at the initial state and follows
/// successors towards the bad region. The frame sequence over-approximates
/// reachability from the opposite end.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Backward,
    Forward,
}

impl Default for Direction {
    fn default() -> Direction {
        Direction::Backward
    }
}

/// Configurable parameters of a search run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Direction of the search. (Default: backward)
    pub direction: Direction,

    /// Order assumption tails by prior unsat-core participation, biasing the
    /// solver towards small cores. (Default: off)
    pub rotate: bool,

    /// Order subsumption-filter assumptions by MOM-style literal weights.
    /// (Default: off)
    pub mom: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_merge_over_defaults() {
        let config: SearchConfig = toml::from_str("direction = \"forward\"\nrotate = true\n").unwrap();
        assert_eq!(config.direction, Direction::Forward);
        assert!(config.rotate);
        assert!(!config.mom);
    }
}
