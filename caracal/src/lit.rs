//! Literals, cubes, clauses and frames.
use std::{fmt, ops};

/// Variable identifier. Variables are numbered contiguously from 1: first the
/// inputs, then the current-state latches, then internal AND-gate outputs,
/// then the two reserved constant variables, then dynamically allocated
/// activation flags.
pub type VarId = u32;

/// A signed boolean literal.
///
/// Stored as a nonzero integer whose absolute value is the variable and whose
/// sign is the polarity. This is also the encoding the SAT backend speaks, so
/// conversion is a cast.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Lit {
    code: i32,
}

impl Lit {
    /// Creates a literal from a variable and a polarity, `true` for positive.
    #[inline]
    pub fn new(var: VarId, polarity: bool) -> Lit {
        debug_assert!(var > 0 && var <= i32::max_value() as VarId);
        Lit {
            code: if polarity { var as i32 } else { -(var as i32) },
        }
    }

    /// Creates a positive literal.
    #[inline]
    pub fn positive(var: VarId) -> Lit {
        Lit::new(var, true)
    }

    /// Creates a negative literal.
    #[inline]
    pub fn negative(var: VarId) -> Lit {
        Lit::new(var, false)
    }

    /// Creates a literal from its signed integer form.
    #[inline]
    pub fn from_int(code: i32) -> Lit {
        debug_assert!(code != 0);
        Lit { code }
    }

    /// The signed integer form, opposite of `from_int`.
    #[inline]
    pub fn to_int(self) -> i32 {
        self.code
    }

    /// The literal's variable.
    #[inline]
    pub fn var(self) -> VarId {
        self.code.abs() as VarId
    }

    /// Whether the literal is a non-negated variable.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.code > 0
    }

    /// Whether the literal is a negated variable.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.code < 0
    }

    /// This literal with the polarity of `polarity`: positive when `true`.
    #[inline]
    pub fn with_polarity(self, polarity: bool) -> Lit {
        Lit::new(self.var(), polarity)
    }
}

impl ops::Neg for Lit {
    type Output = Lit;

    #[inline]
    fn neg(self) -> Lit {
        Lit { code: -self.code }
    }
}

/// Uses the signed integer form.
impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// Uses the signed integer form.
impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A conjunction of literals describing a region of the state space.
///
/// Order is significant for the assumption-ordering heuristics but not for
/// the semantics.
pub type Cube = Vec<Lit>;

/// A disjunction of literals.
pub type Clause = Vec<Lit>;

/// A set of blocked cubes attached to one level of the frame sequence.
pub type Frame = Vec<Cube>;

/// Sorts a cube by variable index, the canonical order for trie storage.
pub fn sort_cube(cube: &mut Cube) {
    cube.sort_unstable_by_key(|lit| lit.var());
}

/// Negates every literal, turning a cube into the clause blocking it.
pub fn negate_cube(cube: &[Lit]) -> Clause {
    cube.iter().map(|&lit| -lit).collect()
}

/// Shortcut for tests
#[cfg(test)]
#[macro_export]
macro_rules! lits {
    ( $( $x:expr ),* ) => { vec![ $( $crate::lit::Lit::from_int($x) ),* ] };
    ( $( $x:expr ),* , ) => { $crate::lits![ $( $x ),* ] };
}
