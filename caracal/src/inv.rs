//! Fixed-point detection across the frame sequence.
//!
//! The sequence is closed at level k when every state of frame k's region is
//! excluded by some earlier frame. The solver keeps two encodings per level:
//! an or-encoding ("the state lies in some blocked cube", the level's
//! exclusion region) that persists and is refreshed as cubes arrive, and an
//! and-encoding ("the state avoids every blocked cube", the level's region)
//! that is built fresh for a check and retired afterwards. All encodings are
//! controlled through activation literals; nothing is ever removed.

use crate::lit::{negate_cube, Cube, Frame, Lit};
use crate::model::Model;
use crate::sat::{SatSolver, SolveResult};

/// Result of advancing the invariant scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The region of this level is covered by the union of earlier levels.
    Closed(usize),
    /// No fixed point yet.
    Open,
    /// The backend failed to answer; the verdict becomes unknown.
    Aborted,
}

/// Fixed-point (invariant) check across all frames of a sequence.
pub struct InvSolver {
    solver: SatSolver,
    /// Per or-encoded level: the current or-flag and its clause flags.
    or_flags: Vec<Lit>,
    or_clause_flags: Vec<Vec<Lit>>,
}

impl InvSolver {
    /// Loads the state-only clause prefix of the model; transition cones
    /// play no role in comparing state sets.
    pub fn new(model: &Model) -> InvSolver {
        let mut solver = SatSolver::new();
        for clause in model.state_clauses() {
            solver.add_clause(clause);
        }
        solver.reserve(model.max_var());
        InvSolver {
            solver,
            or_flags: vec![],
            or_clause_flags: vec![],
        }
    }

    /// Routes a newly blocked cube to the level's encoding. Levels the scan
    /// has not reached yet are picked up wholesale when it does.
    pub fn add_cube(&mut self, level: usize, cube: &[Lit]) {
        if level < self.or_flags.len() {
            self.refresh_or(level, cube);
        }
    }

    /// Checks every committed level, lowest first. `Closed(k)` proves the
    /// sequence closed at k; the safety invariant is the union of the
    /// regions below k.
    pub fn scan(&mut self, frames: &[Frame]) -> ScanOutcome {
        for level in 1..frames.len() {
            while self.or_flags.len() < level {
                let next = self.or_flags.len();
                self.encode_or(&frames[next]);
            }

            let and_flag = self.encode_and(&frames[level]);
            let mut assumptions: Vec<Lit> = self.or_flags[..level].to_vec();
            assumptions.push(and_flag);
            let result = self.solver.solve(&assumptions);
            // Retire the and-encoding; the next check gets a fresh one.
            self.solver.add_clause(&[-and_flag]);

            match result {
                SolveResult::Unsat => return ScanOutcome::Closed(level),
                SolveResult::Sat => (),
                SolveResult::Unknown => return ScanOutcome::Aborted,
            }
        }
        ScanOutcome::Open
    }

    /// Encodes "the state lies in some cube of the frame" under a fresh
    /// or-flag, appending the level.
    fn encode_or(&mut self, frame: &Frame) {
        assert!(!frame.is_empty(), "or-encoding an empty frame");
        let or_flag = Lit::positive(self.solver.new_var());
        let mut clause_flags = vec![];
        for cube in frame {
            clause_flags.push(self.encode_cube_flag(cube));
        }

        let mut master: Cube = clause_flags.clone();
        master.push(-or_flag);
        self.solver.add_clause(&master);

        self.or_flags.push(or_flag);
        self.or_clause_flags.push(clause_flags);
    }

    /// The refreshing pattern: the old or-flag is dropped from future
    /// assumption vectors, and a new flag guards the extended disjunction.
    fn refresh_or(&mut self, level: usize, cube: &[Lit]) {
        let or_flag = Lit::positive(self.solver.new_var());
        let clause_flag = self.encode_cube_flag(cube);
        self.or_clause_flags[level].push(clause_flag);

        let mut master: Cube = self.or_clause_flags[level].clone();
        master.push(-or_flag);
        self.solver.add_clause(&master);

        self.or_flags[level] = or_flag;
    }

    /// A fresh flag implying every literal of the cube.
    fn encode_cube_flag(&mut self, cube: &[Lit]) -> Lit {
        let clause_flag = Lit::positive(self.solver.new_var());
        for &lit in cube {
            self.solver.add_clause(&[-clause_flag, lit]);
        }
        clause_flag
    }

    /// Encodes "the state avoids every cube of the frame" under a fresh
    /// and-flag.
    fn encode_and(&mut self, frame: &Frame) -> Lit {
        let and_flag = Lit::positive(self.solver.new_var());
        for cube in frame {
            let mut clause = negate_cube(cube);
            clause.push(-and_flag);
            self.solver.add_clause(&clause);
        }
        and_flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use caracal_aiger::Aig;

    /// Two independent latches (vars 1 and 2), no inputs.
    fn two_latch_model() -> Model {
        let aig = Aig::parse_bytes(b"aag 2 0 2 1 0\n2 5\n4 3\n2\n").unwrap();
        Model::from_aig(&aig).unwrap()
    }

    #[test]
    fn closed_when_region_repeats() {
        let model = two_latch_model();
        let mut inv = InvSolver::new(&model);
        let frames = vec![vec![lits![1]], vec![lits![1]]];
        assert_eq!(inv.scan(&frames), ScanOutcome::Closed(1));
    }

    #[test]
    fn open_when_regions_differ() {
        let model = two_latch_model();
        let mut inv = InvSolver::new(&model);
        let frames = vec![vec![lits![1]], vec![lits![2]]];
        assert_eq!(inv.scan(&frames), ScanOutcome::Open);
    }

    #[test]
    fn add_cube_refreshes_encoded_levels() {
        let model = two_latch_model();
        let mut inv = InvSolver::new(&model);
        let mut frames = vec![vec![lits![1]], vec![lits![2]], vec![lits![-1]]];
        assert_eq!(inv.scan(&frames), ScanOutcome::Open);

        // A cube arriving at an already-encoded level goes through the
        // refreshing pattern; rescanning must see the shrunken region.
        frames[1].push(lits![-2]);
        inv.add_cube(1, &lits![-2]);
        assert_eq!(inv.scan(&frames), ScanOutcome::Closed(1));
    }

    #[test]
    fn closure_over_a_union_of_levels() {
        let model = two_latch_model();
        let mut inv = InvSolver::new(&model);
        // Exclusions at levels 0 and 1 cover the whole space, so level 2 is
        // closed no matter what it holds.
        let frames = vec![vec![lits![1]], vec![lits![-1]], vec![lits![2]]];
        assert_eq!(inv.scan(&frames), ScanOutcome::Closed(2));
    }
}
