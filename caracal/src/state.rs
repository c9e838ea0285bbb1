//! States and the state pool.

use crate::lit::{Cube, Lit};

/// Index of a state in the pool. Ids are handed out in strictly increasing
/// order and double as a stable tie breaker.
pub type StateId = u32;

/// What a pool entry stands for.
#[derive(Debug)]
enum StateKind {
    /// The pseudo-state marking the bad region at the far end of a trace.
    BadRegion,
    /// A concrete assignment to the inputs and latches.
    Assign { inputs: Cube, latches: Cube },
}

/// One state discovered during search.
///
/// The assignment and the parent link never change after construction; the
/// rotation record is updated between queries of the same state.
#[derive(Debug)]
pub struct State {
    id: StateId,
    parent: Option<StateId>,
    kind: StateKind,
    /// Literals of the last unsat core this state produced, kept for the
    /// rotation ordering heuristic.
    rotation: Cube,
}

impl State {
    pub fn id(&self) -> StateId {
        self.id
    }

    /// The successor state this one was derived from, `None` for roots.
    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    pub fn is_bad_region(&self) -> bool {
        matches!(self.kind, StateKind::BadRegion)
    }

    /// Latch literals in variable order. Empty for the bad-region sentinel.
    pub fn latches(&self) -> &[Lit] {
        match &self.kind {
            StateKind::BadRegion => &[],
            StateKind::Assign { latches, .. } => latches,
        }
    }

    /// Input literals in variable order. For states found by a reachability
    /// query these are the inputs of the transition that connects the state
    /// to its parent.
    pub fn inputs(&self) -> &[Lit] {
        match &self.kind {
            StateKind::BadRegion => &[],
            StateKind::Assign { inputs, .. } => inputs,
        }
    }

    /// Whether every literal of the cube also appears in this state.
    pub fn imply(&self, cube: &[Lit]) -> bool {
        let latches = self.latches();
        cube.iter().all(|lit| {
            latches
                .binary_search_by_key(&lit.var(), |l| l.var())
                .map(|index| latches[index] == *lit)
                .unwrap_or(false)
        })
    }

    pub fn rotation(&self) -> &[Lit] {
        &self.rotation
    }
}

/// Arena owning every state of a run.
///
/// Parent links are pool indices, so they stay valid while the pool grows and
/// cycles cannot be formed. Entry zero is the bad-region sentinel.
pub struct StatePool {
    states: Vec<State>,
}

impl StatePool {
    pub fn new() -> StatePool {
        StatePool {
            states: vec![State {
                id: 0,
                parent: None,
                kind: StateKind::BadRegion,
                rotation: vec![],
            }],
        }
    }

    /// The id of the bad-region sentinel.
    pub fn bad_region(&self) -> StateId {
        0
    }

    pub fn add(&mut self, inputs: Cube, latches: Cube, parent: Option<StateId>) -> StateId {
        let id = self.states.len() as StateId;
        debug_assert!(parent.map_or(true, |parent| parent < id));
        self.states.push(State {
            id,
            parent,
            kind: StateKind::Assign { inputs, latches },
            rotation: vec![],
        });
        id
    }

    pub fn get(&self, id: StateId) -> &State {
        &self.states[id as usize]
    }

    pub fn set_rotation(&mut self, id: StateId, rotation: Cube) {
        self.states[id as usize].rotation = rotation;
    }

    /// Number of states, the sentinel included.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for StatePool {
    fn default() -> StatePool {
        StatePool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_links_form_a_chain() {
        let mut pool = StatePool::new();
        let root = pool.add(vec![], lits![1, -2], Some(pool.bad_region()));
        let child = pool.add(lits![3], lits![-1, -2], Some(root));
        assert_eq!(pool.get(child).parent(), Some(root));
        assert_eq!(pool.get(root).parent(), Some(pool.bad_region()));
        assert!(pool.get(pool.bad_region()).is_bad_region());
        assert!(root < child);
    }

    #[test]
    fn imply_checks_subset_on_polarity() {
        let mut pool = StatePool::new();
        let id = pool.add(vec![], lits![1, -2, 3], None);
        let state = pool.get(id);
        assert!(state.imply(&lits![1, 3]));
        assert!(state.imply(&lits![-2]));
        assert!(!state.imply(&lits![2]));
        assert!(!state.imply(&lits![1, -3]));
    }

    #[test]
    fn rotation_is_updatable() {
        let mut pool = StatePool::new();
        let id = pool.add(vec![], lits![1, 2], None);
        assert!(pool.get(id).rotation().is_empty());
        pool.set_rotation(id, lits![2]);
        assert_eq!(pool.get(id).rotation(), &lits![2][..]);
    }
}
