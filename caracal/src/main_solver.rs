//! Frame-multiplexed reachability queries.

use log::debug;

use crate::config::Direction;
use crate::lit::{negate_cube, Clause, Cube, Lit};
use crate::model::Model;
use crate::sat::{SatSolver, SolveResult};

/// One long-lived solver holding the transition relation, with every frame of
/// the sequence guarded by its own activation literal.
///
/// A query asks whether a candidate state connects to a frame's region in one
/// transition. In the canonical backward direction the frame constrains the
/// predecessor (current-state variables) and the candidate is asserted over
/// its primed literals; in the forward direction the roles are mirrored.
pub struct MainSolver {
    solver: SatSolver,
    direction: Direction,
    flags: Vec<Lit>,
    /// The assumptions of the last query; the pinned prefix (flags, the bad
    /// literal, constraint literals) comes before the state literals.
    assumptions: Vec<Lit>,
    prefix_len: usize,
    /// The candidate literals of the last query, before any priming.
    tail: Vec<Lit>,
}

impl MainSolver {
    pub fn new(model: &Model, direction: Direction) -> MainSolver {
        let mut solver = SatSolver::new();
        for clause in model.clauses() {
            solver.add_clause(clause);
        }
        solver.reserve(model.max_var());
        MainSolver {
            solver,
            direction,
            flags: vec![],
            assumptions: vec![],
            prefix_len: 0,
            tail: vec![],
        }
    }

    /// The activation literal guarding a frame level, allocated on demand
    /// with strictly increasing ids.
    fn flag_of(&mut self, level: usize) -> Lit {
        while level >= self.flags.len() {
            self.flags.push(Lit::positive(self.solver.new_var()));
        }
        self.flags[level]
    }

    /// Blocks a cube at a frame level: the negated cube guarded by the
    /// frame's flag. Forward frames speak about successor states, so there
    /// the cube is primed first.
    pub fn add_blocked_cube(&mut self, model: &Model, cube: &[Lit], level: usize) {
        let flag = self.flag_of(level);
        let mut clause: Clause = match self.direction {
            Direction::Backward => negate_cube(cube),
            Direction::Forward => cube.iter().map(|&lit| -model.prime(lit)).collect(),
        };
        clause.push(-flag);
        self.solver.add_clause(&clause);
    }

    /// Searches a state of the bad region within a frame: the root query of
    /// the backward direction.
    pub fn solve_bad(&mut self, model: &Model, level: usize) -> SolveResult {
        let flag = self.flag_of(level);
        self.assumptions.clear();
        self.assumptions.push(flag);
        self.assumptions.extend_from_slice(model.constraints());
        self.assumptions.push(model.bad());
        self.prefix_len = self.assumptions.len();
        self.tail.clear();
        debug!("bad query at level {}", level);
        self.solver.solve(&self.assumptions)
    }

    /// Checks whether the bad output can be asserted at the candidate state
    /// itself: the level-zero query of the forward direction.
    pub fn solve_target(&mut self, model: &Model, latches: &[Lit]) -> SolveResult {
        self.assumptions.clear();
        self.assumptions.push(model.bad());
        self.assumptions.extend_from_slice(model.constraints());
        self.prefix_len = self.assumptions.len();
        self.assumptions.extend_from_slice(latches);
        self.tail = latches.to_vec();
        debug!("target query over {} literals", latches.len());
        self.solver.solve(&self.assumptions)
    }

    /// The reachability query: does the candidate connect in one transition
    /// to the region of the given frame? The frame flag is pinned first, the
    /// candidate's literals form the tail in the caller's order.
    pub fn solve_frame(&mut self, model: &Model, latches: &[Lit], level: usize) -> SolveResult {
        let flag = self.flag_of(level);
        self.assumptions.clear();
        self.assumptions.push(flag);
        self.assumptions.extend_from_slice(model.constraints());
        self.prefix_len = self.assumptions.len();
        match self.direction {
            Direction::Backward => {
                for &lit in latches {
                    self.assumptions.push(model.prime(lit));
                }
            }
            Direction::Forward => self.assumptions.extend_from_slice(latches),
        }
        self.tail = latches.to_vec();
        debug!("frame query at level {}", level);
        self.solver.solve(&self.assumptions)
    }

    /// The state found by a satisfiable query: the current-state assignment
    /// for backward searches, the successor (read back through the next-state
    /// map) for forward ones. Inputs are the transition's input assignment.
    pub fn extract_state(&mut self, model: &Model) -> (Cube, Cube) {
        let mut inputs = Vec::with_capacity(model.num_inputs());
        for var in 1..=model.num_inputs() as u32 {
            let value = self.solver.model_value(Lit::positive(var)).unwrap_or(false);
            inputs.push(Lit::new(var, value));
        }

        let mut latches = Vec::with_capacity(model.num_latches());
        for index in 0..model.num_latches() as u32 {
            let var = model.first_latch_var() + index;
            let value = match self.direction {
                Direction::Backward => {
                    self.solver.model_value(Lit::positive(var)).unwrap_or(false)
                }
                Direction::Forward => {
                    let primed = model.prime(Lit::positive(var));
                    let value = self
                        .solver
                        .model_value(Lit::positive(primed.var()))
                        .unwrap_or(false);
                    value == primed.is_positive()
                }
            };
            latches.push(Lit::new(var, value));
        }
        (inputs, latches)
    }

    /// The unsat core of the last query as a blocking cube over latch
    /// variables: the pinned prefix is dropped, and primed literals are
    /// lifted back through the reverse next-state map. Two latches may track
    /// the same signal with opposite polarities, so the lifted product is
    /// intersected with the queried candidate's own literals.
    pub fn get_conflict(&mut self, model: &Model) -> Cube {
        let mut core = self.solver.unsat_core();
        let prefix = &self.assumptions[..self.prefix_len];
        core.retain(|lit| !prefix.contains(lit));
        match self.direction {
            Direction::Backward => {
                model.shrink_to_previous_vars(&mut core);
                let tail = &self.tail;
                core.retain(|lit| tail.contains(lit));
            }
            Direction::Forward => model.shrink_to_latch_vars(&mut core),
        }
        core
    }

    /// A second, often different, core for the same query: the assumption
    /// tail is reversed and the query re-run under the same pinned prefix.
    pub fn get_conflict_another(&mut self, model: &Model) -> Cube {
        self.assumptions[self.prefix_len..].reverse();
        let assumptions = self.assumptions.clone();
        let result = self.solver.solve(&assumptions);
        debug_assert_eq!(result, SolveResult::Unsat);
        self.get_conflict(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use caracal_aiger::Aig;

    /// One latch toggling itself, bad when high. Latch is variable 1.
    fn toggle_model() -> Model {
        let aig = Aig::parse_bytes(b"aag 1 0 1 1 0\n2 3\n2\n").unwrap();
        Model::from_aig(&aig).unwrap()
    }

    #[test]
    fn backward_level_zero_finds_the_initial_predecessor() {
        let model = toggle_model();
        let mut main = MainSolver::new(&model, Direction::Backward);
        // Frame 0 pins the initial state.
        for &lit in model.init() {
            main.add_blocked_cube(&model, &[-lit], 0);
        }

        // The bad state (latch high) has the initial state as predecessor.
        let bad_state = lits![1];
        assert_eq!(main.solve_frame(&model, &bad_state, 0), SolveResult::Sat);
        let (inputs, latches) = main.extract_state(&model);
        assert!(inputs.is_empty());
        assert_eq!(latches, lits![-1]);

        // The initial state itself has none: its predecessor would need to
        // be the latch-high state, which frame 0 blocks.
        let init_state = lits![-1];
        assert_eq!(main.solve_frame(&model, &init_state, 0), SolveResult::Unsat);
        let conflict = main.get_conflict(&model);
        assert_eq!(conflict, lits![-1]);
    }

    #[test]
    fn bad_query_respects_the_frame() {
        let model = toggle_model();
        let mut main = MainSolver::new(&model, Direction::Backward);
        assert_eq!(main.solve_bad(&model, 1), SolveResult::Sat);
        let (_, latches) = main.extract_state(&model);
        assert_eq!(latches, lits![1]);

        // Blocking the bad state at the frame makes the query unsatisfiable.
        main.add_blocked_cube(&model, &lits![1], 1);
        assert_eq!(main.solve_bad(&model, 1), SolveResult::Unsat);
    }

    #[test]
    fn forward_target_query_reports_core_over_latches() {
        let model = toggle_model();
        let mut main = MainSolver::new(&model, Direction::Forward);
        // The latch-low state cannot assert the bad output.
        assert_eq!(main.solve_target(&model, &lits![-1]), SolveResult::Unsat);
        let conflict = main.get_conflict(&model);
        assert_eq!(conflict, lits![-1]);

        assert_eq!(main.solve_target(&model, &lits![1]), SolveResult::Sat);
    }

    #[test]
    fn forward_extraction_reads_the_successor() {
        let model = toggle_model();
        let mut main = MainSolver::new(&model, Direction::Forward);
        // Some successor of the latch-low state lies outside frame 1's
        // blocked region; it must be the latch-high state.
        main.add_blocked_cube(&model, &lits![-1], 1);
        assert_eq!(main.solve_frame(&model, &lits![-1], 1), SolveResult::Sat);
        let (_, latches) = main.extract_state(&model);
        assert_eq!(latches, lits![1]);
    }

    #[test]
    fn second_core_comes_from_the_reversed_tail() {
        let model = toggle_model();
        let mut main = MainSolver::new(&model, Direction::Backward);
        for &lit in model.init() {
            main.add_blocked_cube(&model, &[-lit], 0);
        }
        let init_state = lits![-1];
        assert_eq!(main.solve_frame(&model, &init_state, 0), SolveResult::Unsat);
        let first = main.get_conflict(&model);
        let second = main.get_conflict_another(&model);
        // One latch only, so both cores must agree here.
        assert_eq!(first, second);
    }
}
