//! Search statistics.

use std::fmt;

/// Counters collected during a run and reported at the end.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub rounds: u64,
    pub main_queries: u64,
    pub main_sat: u64,
    pub imply_queries: u64,
    pub imply_blocked: u64,
    pub inv_scans: u64,
    pub cubes_added: u64,
    pub cubes_propagated: u64,
    pub generalization_drops: u64,
    pub states: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rounds: {} main: {}/{} sat, filter: {}/{} blocked, inv scans: {}, \
             cubes: {} (+{} propagated, -{} generalized), states: {}",
            self.rounds,
            self.main_sat,
            self.main_queries,
            self.imply_blocked,
            self.imply_queries,
            self.inv_scans,
            self.cubes_added,
            self.cubes_propagated,
            self.generalization_drops,
            self.states,
        )
    }
}
