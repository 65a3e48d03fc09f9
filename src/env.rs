use std::collections::HashMap;

use crate::value::{SymbolId, Value};

/// Index into the environment arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EnvId(pub u32);

struct Frame {
    vars: HashMap<SymbolId, Value>,
    parent: Option<EnvId>,
}

/// All environments live here, as frames with parent ids. An `EnvId` can be
/// copied into any number of lambdas and continuation records; mutations
/// through `define`/`assign` are visible to every holder.
pub struct EnvTable {
    frames: Vec<Frame>,
}

impl EnvTable {
    pub fn new() -> Self {
        EnvTable { frames: Vec::new() }
    }

    /// Allocate a parentless environment.
    pub fn new_root(&mut self) -> EnvId {
        self.push_frame(None)
    }

    /// Allocate a child environment for a lambda invocation.
    pub fn new_child(&mut self, parent: EnvId) -> EnvId {
        self.push_frame(Some(parent))
    }

    fn push_frame(&mut self, parent: Option<EnvId>) -> EnvId {
        let id = EnvId(self.frames.len() as u32);
        self.frames.push(Frame {
            vars: HashMap::new(),
            parent,
        });
        id
    }

    /// Insert into this environment, never a parent.
    pub fn define(&mut self, env: EnvId, name: SymbolId, val: Value) {
        self.frames[env.0 as usize].vars.insert(name, val);
    }

    /// Walk the parent chain for a binding.
    pub fn lookup(&self, env: EnvId, name: SymbolId) -> Option<Value> {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = &self.frames[id.0 as usize];
            if let Some(&val) = frame.vars.get(&name) {
                return Some(val);
            }
            current = frame.parent;
        }
        None
    }

    /// Mutate the nearest binding walking the parent chain. Returns false if
    /// no binding exists anywhere on the chain.
    pub fn assign(&mut self, env: EnvId, name: SymbolId, val: Value) -> bool {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = &mut self.frames[id.0 as usize];
            if let Some(slot) = frame.vars.get_mut(&name) {
                *slot = val;
                return true;
            }
            current = frame.parent;
        }
        false
    }
}

impl Default for EnvTable {
    fn default() -> Self {
        EnvTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_stays_in_the_named_frame() {
        let mut envs = EnvTable::new();
        let root = envs.new_root();
        let child = envs.new_child(root);
        envs.define(root, SymbolId(0), Value::Int(1));
        envs.define(child, SymbolId(0), Value::Int(2));
        assert_eq!(envs.lookup(child, SymbolId(0)), Some(Value::Int(2)));
        assert_eq!(envs.lookup(root, SymbolId(0)), Some(Value::Int(1)));
    }

    #[test]
    fn lookup_walks_parents() {
        let mut envs = EnvTable::new();
        let root = envs.new_root();
        let child = envs.new_child(root);
        envs.define(root, SymbolId(7), Value::Int(42));
        assert_eq!(envs.lookup(child, SymbolId(7)), Some(Value::Int(42)));
        assert_eq!(envs.lookup(child, SymbolId(8)), None);
    }

    #[test]
    fn assign_mutates_the_nearest_binding() {
        let mut envs = EnvTable::new();
        let root = envs.new_root();
        let child = envs.new_child(root);
        envs.define(root, SymbolId(3), Value::Int(1));
        assert!(envs.assign(child, SymbolId(3), Value::Int(5)));
        assert_eq!(envs.lookup(root, SymbolId(3)), Some(Value::Int(5)));
        assert!(!envs.assign(child, SymbolId(4), Value::Int(0)));
    }
}
