use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::cont::{ContTable, Inbox, Step};
use crate::env::{EnvId, EnvTable};
use crate::error::{LispError, LispResult};
use crate::heap::Heap;
use crate::printer::print_val;
use crate::primitives::Builtin;
use crate::resource::ResourceTable;
use crate::strings::StrTable;
use crate::symbol::SymbolTable;
use crate::value::{ContId, LambdaId, SymbolId, Value};

/// Default step ceiling: generous enough for real programs, finite enough to
/// turn a runaway chain into a diagnostic.
pub const DEFAULT_MAX_FUEL: u64 = 1_000_000_000;

/// The evaluation machine. All interpreter state lives here: the value
/// tables, the environment arena, and the continuation-chain arena the
/// trampoline drives.
pub struct Machine {
    pub heap: Heap,
    pub symbols: SymbolTable,
    pub strings: StrTable,
    pub envs: EnvTable,
    pub conts: ContTable,
    pub resources: ResourceTable,

    /// The global environment. Built-in names are pre-bound to their own
    /// symbols here, so an evaluated function slot like `plus` reaches call
    /// dispatch as the symbol that names the built-in.
    pub root: EnvId,

    /// Step counter for safety (fuel), reset per top-level form.
    pub fuel: u64,
    pub max_fuel: u64,
    /// Ctrl+C interrupt flag; a set flag aborts the in-flight chain.
    pub interrupted: Arc<AtomicBool>,
    /// Render the chain to this many nodes before every step.
    pub log_conts: Option<usize>,
    /// Log every form `load` evaluates, as if each call carried the log flag.
    pub log_loads: bool,

    /// Outcome recorded by a terminal step.
    outcome: Option<LispResult<Value>>,
}

impl Machine {
    pub fn new(max_fuel: u64) -> Self {
        let mut envs = EnvTable::new();
        let root = envs.new_root();
        let mut machine = Machine {
            heap: Heap::new(),
            symbols: SymbolTable::new(),
            strings: StrTable::new(),
            envs,
            conts: ContTable::new(),
            resources: ResourceTable::new(),
            root,
            fuel: 0,
            max_fuel,
            interrupted: Arc::new(AtomicBool::new(false)),
            log_conts: None,
            log_loads: false,
            outcome: None,
        };
        for &op in Builtin::ALL {
            let name = op.symbol();
            machine.envs.define(root, name, Value::Sym(name));
        }
        machine
    }

    /// Get the interrupt flag for use with a Ctrl+C handler.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Pretty-print a value using this machine's tables.
    pub fn render(&self, val: Value) -> String {
        print_val(val, &self.heap, &self.symbols, &self.strings)
    }

    // ========================================================================
    // Chain seeding and the trampoline
    // ========================================================================

    /// Evaluate one top-level form in the global environment.
    ///
    /// Seeds a fresh chain — Eval feeding a Finish terminal, with a Rescue
    /// terminal installed as the chain's error handler — and pumps it.
    pub fn eval_form(&mut self, ast: Value) -> LispResult<Value> {
        self.fuel = 0;
        self.outcome = None;

        let header = self.conts.alloc_header(ast);
        let finish = self.conts.alloc(Step::Finish, None, header);
        let rescue = self.conts.alloc(Step::Rescue, None, header);
        self.conts.header_mut(header).error_handler = Some(rescue);
        let start = self.conts.alloc(
            Step::Eval {
                ast,
                env: self.root,
            },
            Some(finish),
            header,
        );

        self.run(start);

        self.outcome
            .take()
            .unwrap_or_else(|| Err(LispError::Internal("chain ended without an outcome".into())))
    }

    /// The trampoline: repeatedly invoke the current continuation's step
    /// until a step returns no successor.
    fn run(&mut self, start: ContId) {
        let mut current = Some(start);
        while let Some(id) = current {
            self.fuel += 1;
            if self.fuel > self.max_fuel {
                self.fuel = 0;
                current = self.fault(id, "step limit exceeded (possible infinite loop)".into());
                continue;
            }
            if self.interrupted.load(Ordering::Relaxed) {
                self.interrupted.store(false, Ordering::Relaxed);
                current = self.fault(id, "interrupted".into());
                continue;
            }
            if let Some(depth) = self.log_conts {
                trace!(target: "conts", "{}", self.describe_chain(id, depth));
            }
            current = self.step(id);
        }
    }

    fn step(&mut self, id: ContId) -> Option<ContId> {
        let step = self.conts.node(id).step.clone();
        match step {
            Step::Eval { ast, env } => self.step_eval(id, ast, env),
            Step::Binding { name, env } => self.step_binding(id, name, env),
            Step::Call { args, env } => self.step_call(id, args, env),
            Step::Args { pending, done, env } => self.step_args(id, pending, done, env),
            Step::Apply { lambda, args, env } => self.step_apply(id, lambda, args, env),
            Step::Op { op, args, env } => self.step_op(id, op, args, env),
            Step::Load {
                forms,
                last,
                env,
                log,
            } => self.step_load(id, forms, last, env, log),
            Step::Finish => {
                let val = match self.conts.take_inbox(id) {
                    Inbox::One(v) => v,
                    _ => Value::Nil,
                };
                self.outcome = Some(Ok(val));
                None
            }
            Step::Rescue => {
                let outcome = match self.conts.take_inbox(id) {
                    Inbox::Fault(e) => Err(e),
                    _ => Err(LispError::Internal(
                        "error handler invoked without a fault".into(),
                    )),
                };
                self.outcome = Some(outcome);
                None
            }
        }
    }

    // ========================================================================
    // Core steps
    // ========================================================================

    /// `eval`: symbols resolve through the environment, pairs become calls,
    /// everything else self-evaluates.
    fn step_eval(&mut self, id: ContId, ast: Value, env: EnvId) -> Option<ContId> {
        match ast {
            Value::Sym(name) => Some(self.conts.create_after(id, Step::Binding { name, env })),
            Value::Pair(pid) => {
                let fn_slot = self.heap.first(pid);
                let fn_args = self.heap.rest(pid);
                // Evaluate the function slot first; its result lands in the
                // call step's inbox.
                let call = self
                    .conts
                    .create_after(id, Step::Call { args: fn_args, env });
                Some(
                    self.conts
                        .copy_with(id, Some(call), Step::Eval { ast: fn_slot, env }),
                )
            }
            other => self.deliver_next(id, other),
        }
    }

    /// `eval_binding`: walk the environment chain.
    fn step_binding(&mut self, id: ContId, name: SymbolId, env: EnvId) -> Option<ContId> {
        match self.envs.lookup(env, name) {
            Some(val) => self.deliver_next(id, val),
            None => {
                let msg = format!("unresolved symbol: {}", self.symbols.name(name));
                self.fault(id, msg)
            }
        }
    }

    /// `eval_function_call`: dispatch on the evaluated function slot.
    fn step_call(&mut self, id: ContId, args: Value, env: EnvId) -> Option<ContId> {
        let callee = match self.conts.take_inbox(id) {
            Inbox::One(v) => v,
            _ => return self.fault(id, "function slot produced no value".into()),
        };
        match callee {
            Value::Sym(name) => match Builtin::from_symbol(name) {
                Some(op) => Some(self.conts.create_after(id, Step::Op { op, args, env })),
                None => {
                    let msg = format!("unknown built-in: {}", self.symbols.name(name));
                    self.fault(id, msg)
                }
            },
            Value::Lambda(lambda) => {
                Some(self.conts.create_after(id, Step::Apply { lambda, args, env }))
            }
            Value::Cont(captured) => {
                // Reinstate the captured chain: evaluate the first argument
                // and deliver it as the captured step's incoming value.
                let first = match args {
                    Value::Pair(pid) => self.heap.first(pid),
                    _ => Value::Nil,
                };
                Some(
                    self.conts
                        .create_before(captured, Step::Eval { ast: first, env }),
                )
            }
            other => {
                let msg = format!("not callable: {}", self.render(other));
                self.fault(id, msg)
            }
        }
    }

    /// `eval_function_args`: evaluate expressions left to right, accumulating
    /// results in evaluation order.
    fn step_args(
        &mut self,
        id: ContId,
        mut pending: std::collections::VecDeque<Value>,
        mut done: Vec<Value>,
        env: EnvId,
    ) -> Option<ContId> {
        match self.conts.take_inbox(id) {
            Inbox::One(val) => {
                // A producer just delivered; bank it and re-enter.
                done.push(val);
                self.conts.set_step(id, Step::Args { pending, done, env });
                Some(id)
            }
            _ => {
                if let Some(head) = pending.pop_front() {
                    self.conts.set_step(id, Step::Args { pending, done, env });
                    Some(self.conts.create_before(id, Step::Eval { ast: head, env }))
                } else {
                    let next = self.conts.next_of(id)?;
                    Some(self.conts.deliver(next, Inbox::Many(done)))
                }
            }
        }
    }

    /// `eval_lambda`: first entry checks arity and requests argument
    /// evaluation; the re-entry binds a child environment and evaluates the
    /// body there.
    fn step_apply(
        &mut self,
        id: ContId,
        lambda: LambdaId,
        args: Value,
        env: EnvId,
    ) -> Option<ContId> {
        match self.conts.take_inbox(id) {
            Inbox::Many(vals) => {
                let data = self.heap.lambda(lambda).clone();
                if vals.len() != data.params.len() {
                    let msg = format!(
                        "wrong number of arguments: expected {}, got {}",
                        data.params.len(),
                        vals.len()
                    );
                    return self.fault(id, msg);
                }
                let child = self.envs.new_child(data.env);
                for (&param, &val) in data.params.iter().zip(vals.iter()) {
                    self.envs.define(child, param, val);
                }
                Some(self.conts.create_after(
                    id,
                    Step::Eval {
                        ast: data.body,
                        env: child,
                    },
                ))
            }
            _ => {
                let Some(unevaled) = self.heap.list_to_vec(args) else {
                    return self.fault(id, "malformed argument list".into());
                };
                let nparams = self.heap.lambda(lambda).params.len();
                if unevaled.len() != nparams {
                    let msg = format!(
                        "wrong number of arguments: expected {}, got {}",
                        nparams,
                        unevaled.len()
                    );
                    return self.fault(id, msg);
                }
                Some(self.conts.create_before(
                    id,
                    Step::Args {
                        pending: unevaled.into(),
                        done: Vec::new(),
                        env,
                    },
                ))
            }
        }
    }

    // ========================================================================
    // Error routing and shared step helpers
    // ========================================================================

    /// Route a failure to the chain's error handler. The handler receives
    /// the message and the chain's current top-level form; with no handler
    /// installed the outcome is recorded directly.
    pub(crate) fn fault(&mut self, at: ContId, message: String) -> Option<ContId> {
        let header_id = self.conts.node(at).header;
        let statement = self.conts.header(header_id).statement;
        let form = self.render(statement);
        let err = LispError::Eval {
            message,
            form: Some(form),
        };
        match self.conts.header(header_id).error_handler {
            Some(handler) => Some(self.conts.deliver(handler, Inbox::Fault(err))),
            None => {
                self.outcome = Some(Err(err));
                None
            }
        }
    }

    /// Deliver a result into this step's successor and advance to it.
    pub(crate) fn deliver_next(&mut self, id: ContId, val: Value) -> Option<ContId> {
        let next = self.conts.next_of(id)?;
        Some(self.conts.deliver(next, Inbox::One(val)))
    }

    // ========================================================================
    // Chain tracing (--log-conts)
    // ========================================================================

    fn describe_chain(&self, id: ContId, depth: usize) -> String {
        let mut out = String::new();
        let mut current = Some(id);
        let mut shown = 0;
        while let Some(cid) = current {
            if shown == depth {
                out.push_str(" -> ...");
                break;
            }
            if shown > 0 {
                out.push_str(" -> ");
            }
            out.push_str(&self.describe_node(cid));
            shown += 1;
            current = self.conts.next_of(cid);
        }
        out
    }

    fn describe_node(&self, id: ContId) -> String {
        let node = self.conts.node(id);
        match &node.step {
            Step::Eval { ast, .. } => format!("eval {}", self.render_short(*ast)),
            Step::Binding { name, .. } => format!("binding {}", self.symbols.name(*name)),
            Step::Call { .. } => "call".into(),
            Step::Args { pending, done, .. } => {
                format!("args {}/{}", done.len(), done.len() + pending.len())
            }
            Step::Apply { .. } => "apply".into(),
            Step::Op { op, .. } => format!("op {}", op.name()),
            Step::Load { forms, .. } => format!("load ({} forms left)", forms.len()),
            Step::Finish => "finish".into(),
            Step::Rescue => "rescue".into(),
        }
    }

    fn render_short(&self, val: Value) -> String {
        let text = self.render(val);
        if text.len() <= 40 {
            return text;
        }
        let mut cut = 37;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &text[..cut])
    }
}

impl Default for Machine {
    fn default() -> Self {
        Machine::new(DEFAULT_MAX_FUEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_str;

    fn eval_one(machine: &mut Machine, src: &str) -> LispResult<Value> {
        let form = read_str(
            src,
            &mut machine.heap,
            &mut machine.symbols,
            &mut machine.strings,
        )?;
        machine.eval_form(form)
    }

    #[test]
    fn atoms_self_evaluate() {
        let mut m = Machine::default();
        assert_eq!(eval_one(&mut m, "42").unwrap(), Value::Int(42));
        assert_eq!(eval_one(&mut m, "true").unwrap(), Value::True);
        assert_eq!(eval_one(&mut m, "nil").unwrap(), Value::Nil);
    }

    #[test]
    fn unresolved_symbol_routes_to_the_handler() {
        let mut m = Machine::default();
        let err = eval_one(&mut m, "no-such-thing").unwrap_err();
        match err {
            LispError::Eval { message, .. } => {
                assert!(message.contains("unresolved symbol"), "{}", message)
            }
            other => panic!("expected an eval error, got {:?}", other),
        }
    }

    #[test]
    fn builtin_names_resolve_to_themselves() {
        let mut m = Machine::default();
        let v = eval_one(&mut m, "plus").unwrap();
        assert_eq!(v, Value::Sym(crate::symbol::sym::PLUS));
    }

    #[test]
    fn fuel_exhaustion_is_reported_not_hung() {
        let mut m = Machine::new(200);
        eval_one(&mut m, "(define (loop) (loop))").unwrap();
        let err = eval_one(&mut m, "(loop)").unwrap_err();
        match err {
            LispError::Eval { message, .. } => {
                assert!(message.contains("step limit"), "{}", message)
            }
            other => panic!("expected an eval error, got {:?}", other),
        }
    }
}
