//! The incremental SAT backend.
//!
//! A thin facade over the CaDiCaL solver. The rest of the system speaks in
//! signed-integer literals only; conversion to the backend representation
//! (which happens to be the same integers) is confined to this module, as is
//! all variable allocation for activation literals.

use crate::lit::{Cube, Lit, VarId};

/// Outcome of a solver call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// The solve budget was exhausted before a verdict was reached.
    Unknown,
}

/// An incremental CDCL solver instance with assumption bookkeeping.
pub struct SatSolver {
    backend: cadical::Solver,
    next_var: VarId,
    assumptions: Vec<Lit>,
    budget: Option<i32>,
    last_result: SolveResult,
}

impl SatSolver {
    pub fn new() -> SatSolver {
        SatSolver {
            backend: cadical::Solver::new(),
            next_var: 1,
            assumptions: vec![],
            budget: None,
            last_result: SolveResult::Unknown,
        }
    }

    /// Makes sure the given variable is considered allocated, so that
    /// `new_var` hands out ids strictly above it.
    pub fn reserve(&mut self, var: VarId) {
        self.next_var = self.next_var.max(var + 1);
    }

    /// Allocates a fresh variable, above everything added so far.
    pub fn new_var(&mut self) -> VarId {
        let var = self.next_var;
        self.next_var += 1;
        var
    }

    pub fn add_clause(&mut self, clause: &[Lit]) {
        for &lit in clause {
            self.next_var = self.next_var.max(lit.var() + 1);
        }
        self.backend.add_clause(clause.iter().map(|lit| lit.to_int()));
        self.last_result = SolveResult::Unknown;
    }

    /// Bounds the next `solve` call to the given number of decisions; the
    /// bounded call reports `Unknown` when the budget runs out. A budget of
    /// zero aborts any query that needs an actual search.
    pub fn set_budget(&mut self, decisions: i32) {
        self.budget = Some(decisions);
    }

    /// Solves under the given assumptions, which are recorded for later
    /// `unsat_core` extraction.
    pub fn solve(&mut self, assumptions: &[Lit]) -> SolveResult {
        self.assumptions.clear();
        self.assumptions.extend_from_slice(assumptions);

        if let Some(budget) = self.budget.take() {
            // A backend without decision limits just runs unbounded, which
            // only costs time, never correctness.
            let limited = self.backend.set_limit("decisions", budget).is_ok();
            debug_assert!(limited, "the backend supports decision limits");
        }

        let result = self
            .backend
            .solve_with(self.assumptions.iter().map(|lit| lit.to_int()));
        self.last_result = match result {
            Some(true) => SolveResult::Sat,
            Some(false) => SolveResult::Unsat,
            None => SolveResult::Unknown,
        };
        self.last_result
    }

    /// The value of a literal in the satisfying assignment, `None` when the
    /// formula is satisfied either way.
    pub fn model_value(&mut self, lit: Lit) -> Option<bool> {
        debug_assert_eq!(self.last_result, SolveResult::Sat);
        self.backend.value(lit.to_int())
    }

    /// The subset of the recorded assumptions the solver used to derive
    /// unsatisfiability, in assumption order.
    pub fn unsat_core(&mut self) -> Cube {
        debug_assert_eq!(self.last_result, SolveResult::Unsat);
        let backend = &mut self.backend;
        self.assumptions
            .iter()
            .filter(|lit| backend.failed(lit.to_int()))
            .copied()
            .collect()
    }
}

impl Default for SatSolver {
    fn default() -> SatSolver {
        SatSolver::new()
    }
}
