use std::collections::VecDeque;

use crate::env::EnvId;
use crate::error::LispError;
use crate::primitives::Builtin;
use crate::value::{ContId, LambdaId, SymbolId, Value};

/// Index into the chain-header arena.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HeaderId(pub u32);

/// The value a predecessor step delivered into this node.
#[derive(Clone, Debug)]
pub enum Inbox {
    Empty,
    /// A single evaluated value.
    One(Value),
    /// An evaluated argument list, delivered by an Args step.
    Many(Vec<Value>),
    /// A routed failure, delivered to the chain's error handler.
    Fault(LispError),
}

/// One step of evaluation, with a typed payload instead of a name→value bag.
/// The trampoline dispatches on this; a step's result is delivered into the
/// successor's inbox.
#[derive(Clone, Debug)]
pub enum Step {
    /// Evaluate `ast` in `env`.
    Eval { ast: Value, env: EnvId },
    /// Resolve `name` through the environment chain.
    Binding { name: SymbolId, env: EnvId },
    /// Dispatch a call; the evaluated function slot arrives in the inbox,
    /// `args` is the unevaluated argument list.
    Call { args: Value, env: EnvId },
    /// Evaluate a list of expressions left to right, accumulating results.
    Args {
        pending: VecDeque<Value>,
        done: Vec<Value>,
        env: EnvId,
    },
    /// Apply a lambda: first entry checks arity and requests argument
    /// evaluation, re-entry (inbox Many) binds and evaluates the body.
    Apply {
        lambda: LambdaId,
        args: Value,
        env: EnvId,
    },
    /// A built-in operation step; `args` is the unevaluated argument list.
    Op {
        op: Builtin,
        args: Value,
        env: EnvId,
    },
    /// Body of `load`: evaluate the parsed forms one at a time, threading
    /// the last result.
    Load {
        forms: VecDeque<Value>,
        last: Value,
        env: EnvId,
        log: bool,
    },
    /// Terminal: record the chain result.
    Finish,
    /// Terminal: record a routed fault. Installed as the chain's error
    /// handler by the driver.
    Rescue,
}

impl Step {
    /// Short name for chain tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Eval { .. } => "eval",
            Step::Binding { .. } => "binding",
            Step::Call { .. } => "call",
            Step::Args { .. } => "args",
            Step::Apply { .. } => "apply",
            Step::Op { .. } => "op",
            Step::Load { .. } => "load",
            Step::Finish => "finish",
            Step::Rescue => "rescue",
        }
    }
}

/// A node in a continuation chain.
pub struct ContNode {
    pub step: Step,
    pub inbox: Inbox,
    /// Successor, or None for a terminal.
    pub next: Option<ContId>,
    pub header: HeaderId,
}

/// Chain-global state, shared by reference (via HeaderId) among all nodes a
/// chain creates. This is the rendezvous for error handling.
#[derive(Clone)]
pub struct ChainHeader {
    /// Continuation every in-chain failure is routed to.
    pub error_handler: Option<ContId>,
    /// Current top-level form, for diagnostics.
    pub statement: Value,
}

/// Arena of all continuation nodes and chain headers. Nodes captured by
/// callcc stay referable for the machine's lifetime.
pub struct ContTable {
    nodes: Vec<ContNode>,
    headers: Vec<ChainHeader>,
}

impl ContTable {
    pub fn new() -> Self {
        ContTable {
            nodes: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn alloc_header(&mut self, statement: Value) -> HeaderId {
        let id = HeaderId(self.headers.len() as u32);
        self.headers.push(ChainHeader {
            error_handler: None,
            statement,
        });
        id
    }

    pub fn header(&self, id: HeaderId) -> &ChainHeader {
        &self.headers[id.0 as usize]
    }

    pub fn header_mut(&mut self, id: HeaderId) -> &mut ChainHeader {
        &mut self.headers[id.0 as usize]
    }

    pub fn alloc(&mut self, step: Step, next: Option<ContId>, header: HeaderId) -> ContId {
        let id = ContId(self.nodes.len() as u32);
        self.nodes.push(ContNode {
            step,
            inbox: Inbox::Empty,
            next,
            header,
        });
        id
    }

    pub fn node(&self, id: ContId) -> &ContNode {
        &self.nodes[id.0 as usize]
    }

    pub fn next_of(&self, id: ContId) -> Option<ContId> {
        self.nodes[id.0 as usize].next
    }

    pub fn set_step(&mut self, id: ContId, step: Step) {
        self.nodes[id.0 as usize].step = step;
    }

    /// Allocate a node inserted ahead of `at`: the new node's successor is
    /// `at`, sharing its header.
    pub fn create_before(&mut self, at: ContId, step: Step) -> ContId {
        let header = self.nodes[at.0 as usize].header;
        self.alloc(step, Some(at), header)
    }

    /// Allocate a node inserted between `at` and its successor, relinking
    /// `at` to point at the new node.
    pub fn create_after(&mut self, at: ContId, step: Step) -> ContId {
        let (next, header) = {
            let node = &self.nodes[at.0 as usize];
            (node.next, node.header)
        };
        let id = self.alloc(step, next, header);
        self.nodes[at.0 as usize].next = Some(id);
        id
    }

    /// Allocate a fresh node sharing `at`'s header, with a patched step and
    /// an explicit successor — "retry this step with patched state".
    pub fn copy_with(&mut self, at: ContId, next: Option<ContId>, step: Step) -> ContId {
        let header = self.nodes[at.0 as usize].header;
        self.alloc(step, next, header)
    }

    /// Shallow clone for callcc capture: copy the step and inbox, share the
    /// successor, copy the header.
    pub fn dup(&mut self, at: ContId) -> ContId {
        let (step, inbox, next, header) = {
            let node = &self.nodes[at.0 as usize];
            (
                node.step.clone(),
                node.inbox.clone(),
                node.next,
                self.headers[node.header.0 as usize].clone(),
            )
        };
        let header_id = HeaderId(self.headers.len() as u32);
        self.headers.push(header);
        let id = ContId(self.nodes.len() as u32);
        self.nodes.push(ContNode {
            step,
            inbox,
            next,
            header: header_id,
        });
        id
    }

    /// Write `inbox` into `to` and return it — the typed `next_with`.
    pub fn deliver(&mut self, to: ContId, inbox: Inbox) -> ContId {
        self.nodes[to.0 as usize].inbox = inbox;
        to
    }

    pub fn take_inbox(&mut self, id: ContId) -> Inbox {
        std::mem::replace(&mut self.nodes[id.0 as usize].inbox, Inbox::Empty)
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for ContTable {
    fn default() -> Self {
        ContTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_before_and_after_link_correctly() {
        let mut conts = ContTable::new();
        let header = conts.alloc_header(Value::Nil);
        let terminal = conts.alloc(Step::Finish, None, header);
        let mid = conts.create_before(terminal, Step::Rescue);
        assert_eq!(conts.next_of(mid), Some(terminal));

        let after = conts.create_after(mid, Step::Finish);
        assert_eq!(conts.next_of(mid), Some(after));
        assert_eq!(conts.next_of(after), Some(terminal));
    }

    #[test]
    fn dup_copies_the_header() {
        let mut conts = ContTable::new();
        let header = conts.alloc_header(Value::Int(1));
        let terminal = conts.alloc(Step::Finish, None, header);
        let node = conts.create_before(terminal, Step::Finish);
        let copy = conts.dup(node);
        assert_eq!(conts.next_of(copy), Some(terminal));
        let copy_header = conts.node(copy).header;
        assert_ne!(copy_header, header);
        assert_eq!(conts.header(copy_header).statement, Value::Int(1));
    }

    #[test]
    fn deliver_fills_the_inbox() {
        let mut conts = ContTable::new();
        let header = conts.alloc_header(Value::Nil);
        let terminal = conts.alloc(Step::Finish, None, header);
        conts.deliver(terminal, Inbox::One(Value::Int(5)));
        assert!(matches!(
            conts.take_inbox(terminal),
            Inbox::One(Value::Int(5))
        ));
        assert!(matches!(conts.take_inbox(terminal), Inbox::Empty));
    }
}
