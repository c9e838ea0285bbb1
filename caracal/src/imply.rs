//! Per-level subsumption filters.

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use crate::lit::{negate_cube, Lit};
use crate::sat::{SatSolver, SolveResult};

/// Length limit below which a core contributes to the MOM weights.
const MOM_CUBE_LIMIT: usize = 10;

/// Answers "is this state already blocked at level k" for one level k.
///
/// The solver holds the negation of every cube added to the level as a
/// permanent clause; no activation literals are needed because cubes are
/// never removed. Assuming a state's latch literals is then unsatisfiable
/// exactly when some cube subsumes the state.
pub struct ImplySolver {
    solver: SatSolver,
    /// MOM-style literal weights, maintained only when the ordering is on.
    weights: FxHashMap<Lit, f64>,
    short_cubes: usize,
    mom: bool,
}

impl ImplySolver {
    pub fn new(mom: bool) -> ImplySolver {
        ImplySolver {
            solver: SatSolver::new(),
            weights: FxHashMap::default(),
            short_cubes: 0,
            mom,
        }
    }

    /// Permanently blocks a cube at this level.
    pub fn add_cube(&mut self, cube: &[Lit]) {
        self.solver.add_clause(&negate_cube(cube));

        if self.mom && cube.len() <= MOM_CUBE_LIMIT {
            self.short_cubes += 1;
            let weight = 1.0 / (1u64 << cube.len()) as f64
                + self.short_cubes as f64 * (1.0 / (1u64 << 20) as f64);
            for &lit in cube {
                *self.weights.entry(-lit).or_insert(0.0) += weight;
            }
        }
    }

    /// Budgeted filter query over a state's latch literals.
    ///
    /// A blocked state is refuted while the assumptions propagate, so the
    /// solve is bounded by the latch count; running out of budget counts as
    /// "not proven blocked" and the caller falls back to a full query.
    pub fn is_blocked(&mut self, latches: &[Lit]) -> bool {
        let mut assumptions = latches.to_vec();
        if self.mom {
            let weights = &self.weights;
            assumptions.sort_by_key(|lit| {
                std::cmp::Reverse(OrderedFloat(weights.get(lit).copied().unwrap_or(0.0)))
            });
        }

        self.solver.set_budget(latches.len() as i32);
        self.solver.solve(&assumptions) == SolveResult::Unsat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_subsumed_states() {
        let mut solver = ImplySolver::new(false);
        solver.add_cube(&lits![1, -3]);
        // Every state containing the cube is blocked.
        assert!(solver.is_blocked(&lits![1, 2, -3]));
        assert!(solver.is_blocked(&lits![1, -2, -3]));
        // Flipping any cube literal escapes the block.
        assert!(!solver.is_blocked(&lits![1, 2, 3]));
        assert!(!solver.is_blocked(&lits![-1, 2, -3]));
    }

    #[test]
    fn empty_level_blocks_nothing() {
        let mut solver = ImplySolver::new(false);
        assert!(!solver.is_blocked(&lits![1, 2]));
    }

    #[test]
    fn mom_ordering_preserves_the_verdict() {
        for &mom in &[false, true] {
            let mut solver = ImplySolver::new(mom);
            solver.add_cube(&lits![1, 2]);
            solver.add_cube(&lits![-1, -2, -3]);
            assert!(solver.is_blocked(&lits![1, 2, 3]));
            assert!(solver.is_blocked(&lits![-1, -2, -3]));
            assert!(!solver.is_blocked(&lits![1, -2, 3]));
        }
    }
}
