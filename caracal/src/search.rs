//! The search loop.
//!
//! The frame sequence over-approximates reachability from one end of the
//! system (the initial state in the backward direction, the bad region in the
//! forward one) while concrete candidate states are driven in from the other
//! end. Satisfiable queries extend the candidate chain by one transition;
//! unsatisfiable queries yield cores that block whole regions from a frame.
//! A run ends with a touched target, a closed sequence, or a solver failure.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use log::{debug, info};

use caracal_aiger::Aig;

use crate::config::{Direction, SearchConfig};
use crate::imply::ImplySolver;
use crate::inv::{InvSolver, ScanOutcome};
use crate::lit::{sort_cube, Cube, Frame};
use crate::main_solver::MainSolver;
use crate::model::{Model, ModelError};
use crate::sat::SolveResult;
use crate::state::{StateId, StatePool};
use crate::stats::Stats;
use crate::trie::Trie;
use crate::witness::Verdict;

/// Checks a circuit against its designated bad output.
pub fn check(aig: &Aig, config: &SearchConfig) -> Result<Verdict, ModelError> {
    let model = Model::from_aig(aig)?;
    let mut checker = Checker::new(&model, config.clone());
    Ok(checker.run())
}

/// A queued candidate and the frame level to query it against.
///
/// The heap yields entries in insertion order; state ids grow in allocation
/// order and keep the comparison total.
#[derive(PartialEq, Eq)]
struct Item {
    seq: u64,
    state: StateId,
    level: usize,
}

impl Ord for Item {
    fn cmp(&self, other: &Item) -> Ordering {
        Reverse(self.seq)
            .cmp(&Reverse(other.seq))
            .then_with(|| Reverse(self.state).cmp(&Reverse(other.state)))
    }
}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Item) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One search run over a fixed model.
pub struct Checker<'a> {
    model: &'a Model,
    config: SearchConfig,
    main: MainSolver,
    inv: InvSolver,
    /// Subsumption filters, one per frame level.
    imply: Vec<ImplySolver>,
    frames: Vec<Frame>,
    /// Duplicate guards, one per frame level.
    tries: Vec<Trie>,
    pool: StatePool,
    queue: BinaryHeap<Item>,
    seq: u64,
    stats: Stats,
}

impl<'a> Checker<'a> {
    pub fn new(model: &'a Model, config: SearchConfig) -> Checker<'a> {
        let mut checker = Checker {
            main: MainSolver::new(model, config.direction),
            inv: InvSolver::new(model),
            imply: vec![],
            frames: vec![],
            tries: vec![],
            pool: StatePool::new(),
            queue: BinaryHeap::new(),
            seq: 0,
            stats: Stats::default(),
            model,
            config,
        };
        checker.push_frame();
        if checker.config.direction == Direction::Backward {
            // Frame 0 pins the initial state; it never changes afterwards.
            for index in 0..model.init().len() {
                let lit = model.init()[index];
                checker.block_cube(vec![-lit], 0);
            }
        }
        checker
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn run(&mut self) -> Verdict {
        let verdict = self.search();
        self.stats.states = self.pool.len() as u64;
        info!("{}", self.stats);
        verdict
    }

    fn search(&mut self) -> Verdict {
        // Is the bad output satisfiable at all, under the constraints?
        self.stats.main_queries += 1;
        match self.main.solve_target(self.model, &[]) {
            SolveResult::Unsat => {
                info!("bad output unsatisfiable, vacuously safe");
                return Verdict::Safe { invariant: vec![] };
            }
            SolveResult::Unknown => return self.unknown("the vacuity check"),
            SolveResult::Sat => self.stats.main_sat += 1,
        }

        loop {
            self.stats.rounds += 1;
            let deepest = self.frames.len() - 1;
            debug!("round {} at level {}", self.stats.rounds, deepest);

            if let Some(verdict) = self.expand_round(deepest) {
                return verdict;
            }

            // The round is exhausted: look for a fixed point, then deepen.
            self.stats.inv_scans += 1;
            match self.inv.scan(&self.frames) {
                ScanOutcome::Closed(level) => {
                    info!("sequence closed at level {}", level);
                    return Verdict::Safe {
                        invariant: self.frames[level].clone(),
                    };
                }
                ScanOutcome::Aborted => return self.unknown("the fixed-point check"),
                ScanOutcome::Open => (),
            }
            self.push_frame();
        }
    }

    /// Enumerates and expands root candidates until none are left at the
    /// round's deepest level. `Some` ends the whole run.
    fn expand_round(&mut self, deepest: usize) -> Option<Verdict> {
        loop {
            match self.config.direction {
                Direction::Backward => {
                    self.stats.main_queries += 1;
                    match self.main.solve_bad(self.model, deepest) {
                        // Every bad state is excluded at the deepest frame.
                        SolveResult::Unsat => return None,
                        SolveResult::Unknown => return Some(self.unknown("a bad-state query")),
                        SolveResult::Sat => {
                            self.stats.main_sat += 1;
                            let (inputs, latches) = self.main.extract_state(self.model);
                            let parent = self.pool.bad_region();
                            let root = self.pool.add(inputs, latches, Some(parent));
                            if let Some(verdict) =
                                self.handle_new_state(root, deepest.checked_sub(1))
                            {
                                return Some(verdict);
                            }
                        }
                    }
                }
                Direction::Forward => {
                    // The single root is the initial state.
                    let root = self.pool.add(vec![], self.model.init().clone(), None);
                    if let Some(verdict) = self.handle_new_state(root, deepest.checked_sub(1)) {
                        return Some(verdict);
                    }
                }
            }

            while let Some(item) = self.queue.pop() {
                if let Some(verdict) = self.expand(item) {
                    return Some(verdict);
                }
            }

            if self.config.direction == Direction::Forward {
                return None;
            }
        }
    }

    /// Direction-specific handling of a freshly extracted state, then
    /// queueing it for expansion at the given level.
    fn handle_new_state(&mut self, id: StateId, level: Option<usize>) -> Option<Verdict> {
        match self.config.direction {
            Direction::Backward => {
                // An extracted initial state completes a counterexample.
                if self.pool.get(id).latches() == &self.model.init()[..] {
                    return Some(self.unsafe_verdict(id));
                }
            }
            Direction::Forward => {
                // Every new state is tested against the bad output at once.
                let latches = self.pool.get(id).latches().to_vec();
                self.stats.main_queries += 1;
                match self.main.solve_target(self.model, &latches) {
                    SolveResult::Sat => {
                        self.stats.main_sat += 1;
                        return Some(self.unsafe_verdict(id));
                    }
                    SolveResult::Unknown => return Some(self.unknown("a bad-output test")),
                    SolveResult::Unsat => {
                        let cube = self.blocking_cube(id, None);
                        self.block_cube(cube, 0);
                    }
                }
            }
        }
        if let Some(level) = level {
            self.enqueue(id, level);
        }
        None
    }

    /// One step for one queued candidate.
    fn expand(&mut self, item: Item) -> Option<Verdict> {
        let Item { state, level, .. } = item;

        let max_query = self.frames.len().saturating_sub(2);

        // A candidate already excluded at the level it would be blocked into
        // needs no new core; it moves on to the next level directly.
        let latches = self.pool.get(state).latches().to_vec();
        self.stats.imply_queries += 1;
        if self.imply[level + 1].is_blocked(&latches) {
            self.stats.imply_blocked += 1;
            if level + 1 <= max_query {
                self.enqueue(state, level + 1);
            }
            return None;
        }

        let ordered = self.rotation_order(state);
        self.stats.main_queries += 1;
        match self.main.solve_frame(self.model, &ordered, level) {
            SolveResult::Unknown => Some(self.unknown("a reachability query")),
            SolveResult::Sat => {
                self.stats.main_sat += 1;
                let (inputs, latches) = self.main.extract_state(self.model);
                let child = self.pool.add(inputs, latches, Some(state));
                if let Some(verdict) = self.handle_new_state(child, level.checked_sub(1)) {
                    return Some(verdict);
                }
                // Retry the candidate at the same level once the child's
                // outcome has refined the frames.
                self.enqueue(state, level);
                None
            }
            SolveResult::Unsat => {
                let cube = self.blocking_cube(state, Some(level));
                self.block_cube(cube.clone(), level + 1);

                // Push the cube into higher frames while it stays blocked.
                let mut target = level + 2;
                while target < self.frames.len() {
                    self.stats.main_queries += 1;
                    match self.main.solve_frame(self.model, &cube, target - 1) {
                        SolveResult::Unsat => {
                            self.stats.cubes_propagated += 1;
                            self.block_cube(cube.clone(), target);
                            target += 1;
                        }
                        SolveResult::Sat => {
                            self.stats.main_sat += 1;
                            break;
                        }
                        SolveResult::Unknown => {
                            return Some(self.unknown("a propagation query"))
                        }
                    }
                }

                // The candidate may still be reachable in more steps.
                if level + 1 <= max_query {
                    self.enqueue(state, level + 1);
                }
                None
            }
        }
    }

    /// Turns the current unsatisfiable query into a blocking cube: takes the
    /// shorter of the two cores, then drops literals whose removal keeps the
    /// query unsatisfiable. `at` is the queried frame level, `None` for the
    /// forward bad-output test.
    fn blocking_cube(&mut self, state: StateId, at: Option<usize>) -> Cube {
        let first = self.main.get_conflict(self.model);
        let second = self.main.get_conflict_another(self.model);
        let mut cube = if second.len() < first.len() { second } else { first };

        let mut index = cube.len();
        while index > 0 && cube.len() > 1 {
            index -= 1;
            let mut candidate = cube.clone();
            candidate.remove(index);
            self.stats.main_queries += 1;
            let result = match at {
                Some(level) => self.main.solve_frame(self.model, &candidate, level),
                None => self.main.solve_target(self.model, &candidate),
            };
            if result == SolveResult::Unsat {
                self.stats.generalization_drops += 1;
                cube = candidate;
            } else if result == SolveResult::Sat {
                self.stats.main_sat += 1;
            }
        }

        if self.config.rotate {
            self.pool.set_rotation(state, cube.clone());
        }
        cube
    }

    /// Latch literals of a state with the last core's literals floated to
    /// the front, when rotation is enabled.
    fn rotation_order(&self, state: StateId) -> Cube {
        let entry = self.pool.get(state);
        let latches = entry.latches();
        if !self.config.rotate || entry.rotation().is_empty() {
            return latches.to_vec();
        }

        let mut ordered: Cube = entry
            .rotation()
            .iter()
            .copied()
            .filter(|&lit| entry.imply(&[lit]))
            .collect();
        for &lit in latches {
            if !ordered.contains(&lit) {
                ordered.push(lit);
            }
        }
        ordered
    }

    /// Records a blocked cube everywhere at once: frame, duplicate guard,
    /// reachability solver, subsumption filter and fixed-point solver.
    fn block_cube(&mut self, mut cube: Cube, level: usize) {
        sort_cube(&mut cube);
        if self.tries[level].contains_subset_of(&cube) {
            return;
        }
        self.tries[level].insert(&cube);
        self.stats.cubes_added += 1;
        debug!("blocking {:?} at level {}", cube, level);

        self.frames[level].push(cube.clone());
        self.main.add_blocked_cube(self.model, &cube, level);
        self.imply[level].add_cube(&cube);
        self.inv.add_cube(level, &cube);
    }

    fn push_frame(&mut self) {
        self.frames.push(vec![]);
        self.tries.push(Trie::new());
        self.imply.push(ImplySolver::new(self.config.mom));
    }

    fn enqueue(&mut self, state: StateId, level: usize) {
        self.seq += 1;
        self.queue.push(Item {
            seq: self.seq,
            state,
            level,
        });
    }

    /// Reconstructs the run from the parent chain of the touched state.
    fn unsafe_verdict(&mut self, leaf: StateId) -> Verdict {
        let mut chain = vec![leaf];
        let mut cursor = leaf;
        while let Some(parent) = self.pool.get(cursor).parent() {
            if self.pool.get(parent).is_bad_region() {
                break;
            }
            chain.push(parent);
            cursor = parent;
        }

        // Orient the chain from the initial state towards the bad region,
        // then emit the input vector stored on the source state of every
        // transition.
        let to_bits = |id: &StateId| {
            self.pool
                .get(*id)
                .inputs()
                .iter()
                .map(|lit| lit.is_positive())
                .collect::<Vec<bool>>()
        };
        let inputs: Vec<Vec<bool>> = match self.config.direction {
            Direction::Backward => chain[..chain.len() - 1].iter().map(to_bits).collect(),
            Direction::Forward => {
                chain.reverse();
                chain[1..].iter().map(to_bits).collect()
            }
        };

        info!("counterexample after {} steps", inputs.len());
        Verdict::Unsafe {
            init: self.model.init().iter().map(|lit| lit.is_positive()).collect(),
            inputs,
        }
    }

    fn unknown(&self, during: &str) -> Verdict {
        Verdict::Unknown {
            reason: format!("the solver gave up during {}", during),
        }
    }
}
