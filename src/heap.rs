use std::collections::HashSet;

use crate::env::EnvId;
use crate::value::{LambdaId, PairId, SymbolId, Value};

/// A single mutable two-field cell on the heap.
pub struct PairCell {
    pub first: Value,
    pub rest: Value,
}

/// A lambda: parameter names, body form, and the captured definition
/// environment.
#[derive(Clone)]
pub struct LambdaData {
    pub params: Vec<SymbolId>,
    pub body: Value,
    pub env: EnvId,
}

/// The value heap. All pairs and lambdas are allocated here; `PairId` and
/// `LambdaId` are indices into the arenas. Cells are never reclaimed — the
/// heap lives as long as the machine (host facilities are the only GC).
pub struct Heap {
    cells: Vec<PairCell>,
    lambdas: Vec<LambdaData>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            cells: Vec::with_capacity(1024),
            lambdas: Vec::new(),
        }
    }

    /// Allocate a new pair cell.
    pub fn alloc(&mut self, first: Value, rest: Value) -> PairId {
        let id = PairId(self.cells.len() as u32);
        self.cells.push(PairCell { first, rest });
        id
    }

    #[inline]
    pub fn first(&self, id: PairId) -> Value {
        self.cells[id.0 as usize].first
    }

    #[inline]
    pub fn rest(&self, id: PairId) -> Value {
        self.cells[id.0 as usize].rest
    }

    /// Mutate the first field in place. Aliasing is observable: every holder
    /// of this PairId sees the change.
    #[inline]
    pub fn set_first(&mut self, id: PairId, val: Value) {
        self.cells[id.0 as usize].first = val;
    }

    /// Mutate the rest field in place. May create cycles.
    #[inline]
    pub fn set_rest(&mut self, id: PairId, val: Value) {
        self.cells[id.0 as usize].rest = val;
    }

    /// Build a proper list from a slice of values.
    pub fn list(&mut self, values: &[Value]) -> Value {
        let mut result = Value::Nil;
        for &val in values.iter().rev() {
            let pair = self.alloc(val, result);
            result = Value::Pair(pair);
        }
        result
    }

    /// Collect a proper list into a Vec. Returns None if the chain does not
    /// terminate in nil (a dotted tail).
    pub fn list_to_vec(&self, val: Value) -> Option<Vec<Value>> {
        let mut result = Vec::new();
        let mut current = val;
        loop {
            match current {
                Value::Nil => return Some(result),
                Value::Pair(id) => {
                    result.push(self.first(id));
                    current = self.rest(id);
                }
                _ => return None,
            }
        }
    }

    /// Returns true if this value is a nil-terminated chain of pairs.
    pub fn is_proper_list(&self, val: Value) -> bool {
        let mut current = val;
        let mut seen = HashSet::new();
        loop {
            match current {
                Value::Nil => return true,
                Value::Pair(id) => {
                    if !seen.insert(id) {
                        return false;
                    }
                    current = self.rest(id);
                }
                _ => return false,
            }
        }
    }

    /// Allocate a lambda.
    pub fn alloc_lambda(&mut self, data: LambdaData) -> LambdaId {
        let id = LambdaId(self.lambdas.len() as u32);
        self.lambdas.push(data);
        id
    }

    pub fn lambda(&self, id: LambdaId) -> &LambdaData {
        &self.lambdas[id.0 as usize]
    }

    /// Structural equality: recursive over pairs, value equality for atoms
    /// (interning makes Sym/Str comparison id comparison), identity for
    /// lambdas, resources and continuations. Revisited pair combinations
    /// compare equal, so cyclic structures terminate.
    pub fn structural_eq(&self, a: Value, b: Value) -> bool {
        let mut visited = HashSet::new();
        self.eq_inner(a, b, &mut visited)
    }

    fn eq_inner(&self, a: Value, b: Value, visited: &mut HashSet<(PairId, PairId)>) -> bool {
        // Recurse on firsts, iterate down the rest spine.
        let (mut a, mut b) = (a, b);
        loop {
            if a == b {
                return true;
            }
            match (a, b) {
                (Value::Pair(pa), Value::Pair(pb)) => {
                    if !visited.insert((pa, pb)) {
                        return true;
                    }
                    if !self.eq_inner(self.first(pa), self.first(pb), visited) {
                        return false;
                    }
                    a = self.rest(pa);
                    b = self.rest(pb);
                }
                _ => return false,
            }
        }
    }

    /// Total number of allocated cells.
    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}
