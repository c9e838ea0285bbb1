//! Prefix index over blocked cubes.
//!
//! Cubes are stored as variable-sorted literal sequences. A lookup asks
//! whether any stored cube is a subset of the queried sequence, which for a
//! complete state assignment means the state is inside a blocked region.

use rustc_hash::FxHashMap;

use crate::lit::Lit;

#[derive(Default)]
struct TrieNode {
    children: FxHashMap<i32, usize>,
    is_end: bool,
}

/// Prefix tree over sorted cubes, used to keep frames duplicate free.
pub struct Trie {
    nodes: Vec<TrieNode>,
    len: usize,
}

impl Trie {
    pub fn new() -> Trie {
        Trie {
            nodes: vec![TrieNode::default()],
            len: 0,
        }
    }

    /// Number of stored cubes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a cube. The literals must be sorted by variable.
    pub fn insert(&mut self, cube: &[Lit]) {
        debug_assert!(cube.windows(2).all(|pair| pair[0].var() < pair[1].var()));
        let mut node = 0;
        for &lit in cube {
            let fresh = self.nodes.len();
            node = *self.nodes[node].children.entry(lit.to_int()).or_insert(fresh);
            if node == fresh {
                self.nodes.push(TrieNode::default());
            }
        }
        if !self.nodes[node].is_end {
            self.nodes[node].is_end = true;
            self.len += 1;
        }
    }

    /// Whether some stored cube is a subset of the given literal sequence,
    /// which must be sorted by variable.
    pub fn contains_subset_of(&self, lits: &[Lit]) -> bool {
        debug_assert!(lits.windows(2).all(|pair| pair[0].var() < pair[1].var()));
        self.search(0, lits)
    }

    /// Descends matching children in variable order. A matching child may
    /// belong to a different stored cube, so every match is tried.
    fn search(&self, node: usize, lits: &[Lit]) -> bool {
        if self.nodes[node].is_end {
            return true;
        }
        for (index, lit) in lits.iter().enumerate() {
            if let Some(&child) = self.nodes[node].children.get(&lit.to_int()) {
                if self.search(child, &lits[index + 1..]) {
                    return true;
                }
            }
        }
        false
    }
}

impl Default for Trie {
    fn default() -> Trie {
        Trie::new()
    }
}
