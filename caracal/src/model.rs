//! AIG to CNF translation.
//!
//! The produced CNF is equisatisfiable with one unrolling of the transition
//! relation. Variables are laid out as inputs, current-state latches, live
//! AND-gate outputs, the two constant variables, and finally the two latch
//! constraint flags; everything above is free for activation literals.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use caracal_aiger::{Aig, AigLit, AndGate};

use crate::lit::{Clause, Cube, Lit, VarId};

/// Problems with the circuit that are detected before any search begins.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("latch {} has reset value {}, only 0 and 1 are supported", latch, reset)]
    UnsupportedReset { latch: AigLit, reset: u32 },
    #[error("AND gate left-hand side {} is not a positive even literal", lhs)]
    MalformedAnd { lhs: AigLit },
    #[error("input literal {} is out of place, the circuit is not reindexed", lit)]
    NonContiguousInput { lit: AigLit },
    #[error("latch literal {} is out of place, the circuit is not reindexed", lit)]
    NonContiguousLatch { lit: AigLit },
    #[error("the circuit has neither bad-state properties nor outputs")]
    NoProperty,
}

/// The CNF view of a circuit, built once and read-only during search.
pub struct Model {
    num_inputs: usize,
    num_latches: usize,
    true_id: VarId,
    false_id: VarId,
    /// Largest variable used by the model clauses (the initial-state flag).
    max_var: VarId,
    bad: Lit,
    constraints: Vec<Lit>,
    /// One literal per latch, fixing it to its reset value.
    init: Cube,
    next_map: FxHashMap<VarId, Lit>,
    reverse_next_map: FxHashMap<VarId, Vec<Lit>>,
    /// AIG wires that are provably constant true.
    trues: FxHashSet<AigLit>,
    clauses: Vec<Clause>,
    /// Start of the latch next-state cones within `clauses`.
    latches_start: usize,
}

/// Converts a non-constant AIGER literal into its signed variable form.
fn signed_lit(lit: AigLit) -> Lit {
    debug_assert!(lit > 1);
    Lit::new(lit >> 1, lit & 1 == 0)
}

impl Model {
    pub fn from_aig(aig: &Aig) -> Result<Model, ModelError> {
        let num_inputs = aig.num_inputs();
        let num_latches = aig.num_latches();
        let true_id = aig.max_var + 1;
        let false_id = aig.max_var + 2;

        let mut model = Model {
            num_inputs,
            num_latches,
            true_id,
            false_id,
            max_var: false_id,
            bad: Lit::positive(true_id),
            constraints: vec![],
            init: vec![],
            next_map: FxHashMap::default(),
            reverse_next_map: FxHashMap::default(),
            trues: FxHashSet::default(),
            clauses: vec![],
            latches_start: 0,
        };

        for (index, &lit) in aig.inputs.iter().enumerate() {
            if lit != 2 * (index as AigLit + 1) {
                return Err(ModelError::NonContiguousInput { lit });
            }
        }

        model.collect_trues(aig)?;

        let bad = aig.bad_literal().ok_or(ModelError::NoProperty)?;
        model.bad = model.lit_of(bad);
        model.constraints = aig
            .constraints
            .iter()
            .map(|&lit| model.lit_of(lit))
            .collect();

        model.set_init(aig)?;
        model.create_next_map(aig)?;
        model.create_clauses(aig);

        Ok(model)
    }

    /// Marks the gates that are trivially constant.
    ///
    /// Gates are visited in file order, which the AIGER format guarantees to
    /// be topological, so constants propagate towards the outputs.
    fn collect_trues(&mut self, aig: &Aig) -> Result<(), ModelError> {
        for gate in aig.ands.iter() {
            if gate.lhs % 2 != 0 || gate.lhs <= 1 {
                return Err(ModelError::MalformedAnd { lhs: gate.lhs });
            }
            if self.is_true_wire(gate.rhs0) && self.is_true_wire(gate.rhs1) {
                self.trues.insert(gate.lhs);
            } else if self.is_false_wire(gate.rhs0) || self.is_false_wire(gate.rhs1) {
                self.trues.insert(gate.lhs + 1);
            } else if gate.rhs0 == gate.rhs1 + 1 && gate.rhs0 % 2 == 1 {
                // ANDing a wire with its own negation.
                self.trues.insert(gate.lhs + 1);
            }
        }
        Ok(())
    }

    fn set_init(&mut self, aig: &Aig) -> Result<(), ModelError> {
        for (index, latch) in aig.latches.iter().enumerate() {
            let var = self.first_latch_var() + index as VarId;
            match latch.reset {
                0 => self.init.push(Lit::negative(var)),
                1 => self.init.push(Lit::positive(var)),
                reset => {
                    return Err(ModelError::UnsupportedReset {
                        latch: latch.lit,
                        reset,
                    })
                }
            }
        }
        Ok(())
    }

    fn create_next_map(&mut self, aig: &Aig) -> Result<(), ModelError> {
        for (index, latch) in aig.latches.iter().enumerate() {
            let var = self.first_latch_var() + index as VarId;
            if latch.lit != 2 * var {
                return Err(ModelError::NonContiguousLatch { lit: latch.lit });
            }

            let next = if self.is_false_wire(latch.next) {
                Lit::positive(self.false_id)
            } else if self.is_true_wire(latch.next) {
                Lit::positive(self.true_id)
            } else {
                signed_lit(latch.next)
            };
            self.next_map.insert(var, next);
            self.reverse_next_map
                .entry(next.var())
                .or_insert_with(Vec::new)
                .push(Lit::new(var, next.is_positive()));
        }
        Ok(())
    }

    fn create_clauses(&mut self, aig: &Aig) {
        let gate_map: FxHashMap<AigLit, AndGate> =
            aig.ands.iter().map(|&gate| (gate.lhs, gate)).collect();
        let mut seen = FxHashSet::default();

        // Constraint cones first, then the latch constraints, so that
        // state-only solvers can load a prefix of the clause list.
        let gates = self.collect_necessary_gates(aig.constraints.iter().copied(), &gate_map, &mut seen);
        for gate in gates {
            self.add_clauses_from_equation(&gate);
        }

        self.create_constraints_for_latches();

        let bad = aig.bad_literal().unwrap_or(0);
        let gates = self.collect_necessary_gates(Some(bad).into_iter(), &gate_map, &mut seen);
        for gate in gates {
            self.add_clauses_from_equation(&gate);
        }

        self.latches_start = self.clauses.len();
        let nexts: Vec<AigLit> = aig.latches.iter().map(|latch| latch.next).collect();
        let gates = self.collect_necessary_gates(nexts.into_iter(), &gate_map, &mut seen);
        for gate in gates {
            self.add_clauses_from_equation(&gate);
        }

        self.clauses.push(vec![Lit::positive(self.true_id)]);
        self.clauses.push(vec![Lit::negative(self.false_id)]);
    }

    /// Walks the AND-gate DAG backwards from the given literals, returning
    /// every not-yet-seen gate on a live fan-in cone. Gates that evaluate to
    /// a constant are omitted along with their cones.
    fn collect_necessary_gates(
        &self,
        start: impl Iterator<Item = AigLit>,
        gate_map: &FxHashMap<AigLit, AndGate>,
        seen: &mut FxHashSet<AigLit>,
    ) -> Vec<AndGate> {
        let mut gates = vec![];
        let mut pending: Vec<AigLit> = start.collect();

        while let Some(lit) = pending.pop() {
            if self.is_true_wire(lit) || self.is_false_wire(lit) {
                continue;
            }
            let gate = match gate_map.get(&(lit & !1)) {
                Some(gate) => gate,
                None => continue, // an input or latch
            };
            if !seen.insert(gate.lhs) {
                continue;
            }
            gates.push(*gate);
            pending.push(gate.rhs0);
            pending.push(gate.rhs1);
        }
        gates
    }

    /// Encodes `lhs <-> rhs0 & rhs1`, specialized to a biconditional when one
    /// side is constant true. Constant-false sides cannot occur here: they
    /// make the whole gate constant, which keeps it off every live cone.
    fn add_clauses_from_equation(&mut self, gate: &AndGate) {
        let lhs = signed_lit(gate.lhs);

        if self.is_true_wire(gate.rhs0) {
            let rhs1 = signed_lit(gate.rhs1);
            self.clauses.push(vec![lhs, -rhs1]);
            self.clauses.push(vec![-lhs, rhs1]);
        } else if self.is_true_wire(gate.rhs1) {
            let rhs0 = signed_lit(gate.rhs0);
            self.clauses.push(vec![lhs, -rhs0]);
            self.clauses.push(vec![-lhs, rhs0]);
        } else {
            let rhs0 = signed_lit(gate.rhs0);
            let rhs1 = signed_lit(gate.rhs1);
            self.clauses.push(vec![lhs, -rhs0, -rhs1]);
            self.clauses.push(vec![-lhs, rhs0]);
            self.clauses.push(vec![-lhs, rhs1]);
        }
    }

    /// Latches that share a next-state literal agree in every state except
    /// possibly the initial one. The disjunction `equiv_flag | init_flag` is
    /// hard; under the first flag co-next latches are pairwise equivalent,
    /// under the second every latch sits at its reset value.
    fn create_constraints_for_latches(&mut self) {
        let equiv_flag = Lit::positive(self.new_flag_var());

        let mut keys: Vec<VarId> = self
            .reverse_next_map
            .iter()
            .filter(|(_, latches)| latches.len() > 1)
            .map(|(&key, _)| key)
            .collect();
        keys.sort_unstable();

        for key in keys {
            let latches = &self.reverse_next_map[&key];
            for pair in latches.windows(2) {
                self.clauses.push(vec![pair[0], -pair[1], -equiv_flag]);
                self.clauses.push(vec![-pair[0], pair[1], -equiv_flag]);
            }
        }

        let init_flag = Lit::positive(self.new_flag_var());
        for index in 0..self.init.len() {
            let lit = self.init[index];
            self.clauses.push(vec![lit, -init_flag]);
        }

        self.clauses.push(vec![equiv_flag, init_flag]);
    }

    fn new_flag_var(&mut self) -> VarId {
        self.max_var += 1;
        self.max_var
    }

    fn is_true_wire(&self, lit: AigLit) -> bool {
        lit == 1 || self.trues.contains(&lit)
    }

    fn is_false_wire(&self, lit: AigLit) -> bool {
        lit == 0 || self.trues.contains(&(lit ^ 1))
    }

    /// Converts an AIGER literal, folding known constants onto the reserved
    /// constant variables.
    fn lit_of(&self, lit: AigLit) -> Lit {
        if self.is_true_wire(lit) {
            Lit::positive(self.true_id)
        } else if self.is_false_wire(lit) {
            Lit::positive(self.false_id)
        } else {
            signed_lit(lit)
        }
    }

    /// The next-state literal of a latch literal, preserving polarity.
    pub fn prime(&self, lit: Lit) -> Lit {
        match self.next_map.get(&lit.var()) {
            Some(&next) => {
                if lit.is_positive() {
                    next
                } else {
                    -next
                }
            }
            None => panic!("no next-state literal for {}", lit),
        }
    }

    /// All latch literals whose next-state literal equals the given literal.
    pub fn previous(&self, lit: Lit) -> Vec<Lit> {
        match self.reverse_next_map.get(&lit.var()) {
            Some(latches) if lit.is_positive() => latches.clone(),
            Some(latches) => latches.iter().map(|&l| -l).collect(),
            None => vec![],
        }
    }

    /// Replaces every literal by all of its predecessor latch literals,
    /// lifting a next-state cube back over the transition relation. Literals
    /// without predecessors (inputs, gate outputs) are dropped.
    pub fn shrink_to_previous_vars(&self, cube: &mut Cube) {
        let mut shrunk = vec![];
        for &lit in cube.iter() {
            shrunk.extend(self.previous(lit));
        }
        *cube = shrunk;
    }

    /// Discards the activation-flag literal pinned at the cube's tail. After
    /// shrinking every remaining literal must be a latch literal.
    pub fn shrink_to_latch_vars(&self, cube: &mut Cube) {
        if let Some(&last) = cube.last() {
            if !self.is_latch_var(last.var()) {
                cube.pop();
            }
        }
        assert!(
            cube.iter().all(|lit| self.is_latch_var(lit.var())),
            "shrunken cube retains a non-latch literal"
        );
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_latches(&self) -> usize {
        self.num_latches
    }

    pub fn first_latch_var(&self) -> VarId {
        self.num_inputs as VarId + 1
    }

    pub fn is_latch_var(&self, var: VarId) -> bool {
        var >= self.first_latch_var() && var < self.first_latch_var() + self.num_latches as VarId
    }

    /// Largest variable used by the model clauses. Activation literals are
    /// allocated above this.
    pub fn max_var(&self) -> VarId {
        self.max_var
    }

    pub fn bad(&self) -> Lit {
        self.bad
    }

    pub fn constraints(&self) -> &[Lit] {
        &self.constraints
    }

    /// The initial state as a cube over the latch variables.
    pub fn init(&self) -> &Cube {
        &self.init
    }

    /// All clauses of the transition relation.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// The clauses that speak about a single state rather than a transition:
    /// constraint cones, the latch constraints, the bad cone and the constant
    /// units. Used by the fixed-point solver.
    pub fn state_clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses[..self.latches_start]
            .iter()
            .chain(self.clauses[self.clauses.len() - 2..].iter())
    }

    #[cfg(test)]
    pub fn trues(&self) -> &FxHashSet<AigLit> {
        &self.trues
    }
}
