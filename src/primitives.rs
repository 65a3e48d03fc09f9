use std::collections::{HashSet, VecDeque};
use std::io::{self, Write};

use tracing::info;

use crate::cont::{Inbox, Step};
use crate::env::EnvId;
use crate::eval::Machine;
use crate::heap::LambdaData;
use crate::reader;
use crate::symbol::sym;
use crate::value::{ContId, SymbolId, Value};

/// The built-in operations, dispatched statically by symbol id.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Builtin {
    Quote,
    Define,
    Set,
    Lambda,
    Begin,
    Load,
    Cons,
    First,
    Rest,
    SetFirst,
    SetRest,
    Last,
    Plus,
    Minus,
    Not,
    And,
    Or,
    Eq,
    Gt,
    If,
    IsSymbol,
    IsPair,
    IsNil,
    IsAtom,
    IsLambda,
    Print,
    Puts,
    ToS,
    Error,
    FileOpen,
    FileClose,
    FileWrite,
    FileRead,
    Callcc,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Builtin::Quote,
        Builtin::Define,
        Builtin::Set,
        Builtin::Lambda,
        Builtin::Begin,
        Builtin::Load,
        Builtin::Cons,
        Builtin::First,
        Builtin::Rest,
        Builtin::SetFirst,
        Builtin::SetRest,
        Builtin::Last,
        Builtin::Plus,
        Builtin::Minus,
        Builtin::Not,
        Builtin::And,
        Builtin::Or,
        Builtin::Eq,
        Builtin::Gt,
        Builtin::If,
        Builtin::IsSymbol,
        Builtin::IsPair,
        Builtin::IsNil,
        Builtin::IsAtom,
        Builtin::IsLambda,
        Builtin::Print,
        Builtin::Puts,
        Builtin::ToS,
        Builtin::Error,
        Builtin::FileOpen,
        Builtin::FileClose,
        Builtin::FileWrite,
        Builtin::FileRead,
        Builtin::Callcc,
    ];

    /// The pre-interned symbol naming this operation.
    pub fn symbol(self) -> SymbolId {
        match self {
            Builtin::Quote => sym::QUOTE,
            Builtin::Define => sym::DEFINE,
            Builtin::Set => sym::SET,
            Builtin::Lambda => sym::LAMBDA,
            Builtin::Begin => sym::BEGIN,
            Builtin::Load => sym::LOAD,
            Builtin::Cons => sym::CONS,
            Builtin::First => sym::FIRST,
            Builtin::Rest => sym::REST,
            Builtin::SetFirst => sym::SET_FIRST,
            Builtin::SetRest => sym::SET_REST,
            Builtin::Last => sym::LAST,
            Builtin::Plus => sym::PLUS,
            Builtin::Minus => sym::MINUS,
            Builtin::Not => sym::NOT,
            Builtin::And => sym::AND,
            Builtin::Or => sym::OR,
            Builtin::Eq => sym::EQ,
            Builtin::Gt => sym::GT,
            Builtin::If => sym::IF,
            Builtin::IsSymbol => sym::IS_SYMBOL,
            Builtin::IsPair => sym::IS_PAIR,
            Builtin::IsNil => sym::IS_NIL,
            Builtin::IsAtom => sym::IS_ATOM,
            Builtin::IsLambda => sym::IS_LAMBDA,
            Builtin::Print => sym::PRINT,
            Builtin::Puts => sym::PUTS,
            Builtin::ToS => sym::TO_S,
            Builtin::Error => sym::ERROR,
            Builtin::FileOpen => sym::FILE_OPEN,
            Builtin::FileClose => sym::FILE_CLOSE,
            Builtin::FileWrite => sym::FILE_WRITE,
            Builtin::FileRead => sym::FILE_READ,
            Builtin::Callcc => sym::CALLCC,
        }
    }

    /// Source-level name, for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Quote => "quote",
            Builtin::Define => "define",
            Builtin::Set => "set",
            Builtin::Lambda => "lambda",
            Builtin::Begin => "begin",
            Builtin::Load => "load",
            Builtin::Cons => "cons",
            Builtin::First => "first",
            Builtin::Rest => "rest",
            Builtin::SetFirst => "set_first",
            Builtin::SetRest => "set_rest",
            Builtin::Last => "last",
            Builtin::Plus => "plus",
            Builtin::Minus => "minus",
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::Eq => "eq?",
            Builtin::Gt => "gt?",
            Builtin::If => "if",
            Builtin::IsSymbol => "symbol?",
            Builtin::IsPair => "pair?",
            Builtin::IsNil => "nil?",
            Builtin::IsAtom => "atom?",
            Builtin::IsLambda => "lambda?",
            Builtin::Print => "print",
            Builtin::Puts => "puts",
            Builtin::ToS => "to_s",
            Builtin::Error => "error",
            Builtin::FileOpen => "file_open",
            Builtin::FileClose => "file_close",
            Builtin::FileWrite => "file_write",
            Builtin::FileRead => "file_read",
            Builtin::Callcc => "callcc",
        }
    }

    /// Look up an operation by the symbol naming it.
    pub fn from_symbol(name: SymbolId) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|op| op.symbol() == name)
    }
}

impl Machine {
    /// One step of a built-in operation. Operations that need evaluated
    /// arguments request them through an Args step and re-enter with the
    /// results in the inbox; special forms act on the raw argument list.
    pub(crate) fn step_op(
        &mut self,
        id: ContId,
        op: Builtin,
        args: Value,
        env: EnvId,
    ) -> Option<ContId> {
        let inbox = self.conts.take_inbox(id);
        match op {
            Builtin::Quote => {
                let val = self.first_or_nil(args);
                self.deliver_next(id, val)
            }
            Builtin::Lambda => self.op_lambda(id, args, env),
            Builtin::Define => self.op_define(id, args, env, inbox),
            Builtin::Set => self.op_set(id, args, env, inbox),
            Builtin::If => self.op_if(id, args, env, inbox),
            Builtin::Plus | Builtin::Minus => self.op_arith(id, op, args, env, inbox),
            Builtin::Callcc => self.op_callcc(id, args, env, inbox),
            Builtin::Begin => match inbox {
                Inbox::Many(vals) => {
                    let last = vals.last().copied().unwrap_or(Value::Nil);
                    self.deliver_next(id, last)
                }
                _ => self.eval_args_first(id, args, env),
            },
            Builtin::Load => match inbox {
                Inbox::Many(vals) => self.op_load_start(id, &vals, env),
                _ => self.eval_args_first(id, args, env),
            },
            _ => match inbox {
                Inbox::Many(vals) => match self.run_simple(op, &vals) {
                    Ok(val) => self.deliver_next(id, val),
                    Err(msg) => self.fault(id, msg),
                },
                _ => self.eval_args_first(id, args, env),
            },
        }
    }

    /// Insert an Args step ahead of this one to evaluate the whole argument
    /// list; this step re-enters with the results.
    fn eval_args_first(&mut self, id: ContId, args: Value, env: EnvId) -> Option<ContId> {
        let Some(items) = self.heap.list_to_vec(args) else {
            return self.fault(id, "malformed argument list".into());
        };
        Some(self.conts.create_before(
            id,
            Step::Args {
                pending: items.into(),
                done: Vec::new(),
                env,
            },
        ))
    }

    // ========================================================================
    // Special forms
    // ========================================================================

    fn op_lambda(&mut self, id: ContId, args: Value, env: EnvId) -> Option<ContId> {
        let Value::Pair(pid) = args else {
            return self.fault(id, "lambda: missing parameter list".into());
        };
        let params_form = self.heap.first(pid);
        let params = match self.parse_params(params_form) {
            Ok(p) => p,
            Err(msg) => return self.fault(id, msg),
        };
        let forms = self.heap.rest(pid);
        let body = self.body_form(forms);
        let lam = self.heap.alloc_lambda(LambdaData { params, body, env });
        self.deliver_next(id, Value::Lambda(lam))
    }

    /// `(define name value)` evaluates the value first; `(define (name p…) body…)`
    /// is lambda sugar and binds immediately.
    fn op_define(&mut self, id: ContId, args: Value, env: EnvId, inbox: Inbox) -> Option<ContId> {
        let Value::Pair(pid) = args else {
            return self.fault(id, "define: missing target".into());
        };
        let target = self.heap.first(pid);
        match target {
            Value::Pair(sig) => {
                let name_form = self.heap.first(sig);
                let Some(name) = name_form.as_sym() else {
                    let msg = format!(
                        "define: name is not a symbol: {}",
                        self.render(name_form)
                    );
                    return self.fault(id, msg);
                };
                let params_form = self.heap.rest(sig);
                let params = match self.parse_params(params_form) {
                    Ok(p) => p,
                    Err(msg) => return self.fault(id, msg),
                };
                let forms = self.heap.rest(pid);
                let body = self.body_form(forms);
                let lam = self.heap.alloc_lambda(LambdaData { params, body, env });
                self.envs.define(env, name, Value::Lambda(lam));
                self.deliver_next(id, Value::Lambda(lam))
            }
            Value::Sym(name) => match inbox {
                Inbox::One(val) => {
                    self.envs.define(env, name, val);
                    self.deliver_next(id, val)
                }
                _ => {
                    let value_expr = self.second_or_nil(args);
                    Some(self.conts.create_before(
                        id,
                        Step::Eval {
                            ast: value_expr,
                            env,
                        },
                    ))
                }
            },
            other => {
                let msg = format!(
                    "define: target must be a symbol or a signature list: {}",
                    self.render(other)
                );
                self.fault(id, msg)
            }
        }
    }

    /// The value is evaluated before the binding walk, so its side effects
    /// happen even when the binding turns out to be missing.
    fn op_set(&mut self, id: ContId, args: Value, env: EnvId, inbox: Inbox) -> Option<ContId> {
        let Some(name) = self.first_or_nil(args).as_sym() else {
            return self.fault(id, "set: target must be a symbol".into());
        };
        match inbox {
            Inbox::One(val) => {
                if self.envs.assign(env, name, val) {
                    self.deliver_next(id, val)
                } else {
                    let msg = format!("unresolved symbol: {}", self.symbols.name(name));
                    self.fault(id, msg)
                }
            }
            _ => {
                let value_expr = self.second_or_nil(args);
                Some(self.conts.create_before(
                    id,
                    Step::Eval {
                        ast: value_expr,
                        env,
                    },
                ))
            }
        }
    }

    fn op_if(&mut self, id: ContId, args: Value, env: EnvId, inbox: Inbox) -> Option<ContId> {
        match inbox {
            Inbox::One(cond) => {
                let rest = self.rest_or_nil(args);
                let branch = if cond.is_truthy() {
                    self.first_or_nil(rest)
                } else {
                    let tail = self.rest_or_nil(rest);
                    self.first_or_nil(tail)
                };
                Some(self.conts.create_after(id, Step::Eval { ast: branch, env }))
            }
            _ => {
                let cond_expr = self.first_or_nil(args);
                Some(self.conts.create_before(
                    id,
                    Step::Eval {
                        ast: cond_expr,
                        env,
                    },
                ))
            }
        }
    }

    /// Pairwise left fold: evaluate the first two operands, combine, then
    /// retry with the intermediate as the new first operand and the
    /// remaining expressions as the tail.
    fn op_arith(
        &mut self,
        id: ContId,
        op: Builtin,
        args: Value,
        env: EnvId,
        inbox: Inbox,
    ) -> Option<ContId> {
        match inbox {
            Inbox::Many(vals) => {
                if vals.len() != 2 {
                    return self.fault(id, format!("{}: malformed operand fold", op.name()));
                }
                let result = match self.combine(op, vals[0], vals[1]) {
                    Ok(v) => v,
                    Err(msg) => return self.fault(id, msg),
                };
                let tail = self.rest_or_nil(args);
                let remaining = self.rest_or_nil(tail);
                if remaining.is_nil() {
                    self.deliver_next(id, result)
                } else {
                    let new_args = Value::Pair(self.heap.alloc(result, remaining));
                    let next = self.conts.next_of(id);
                    Some(self.conts.copy_with(
                        id,
                        next,
                        Step::Op {
                            op,
                            args: new_args,
                            env,
                        },
                    ))
                }
            }
            _ => {
                let Value::Pair(pid) = args else {
                    return self.fault(id, format!("{}: expected at least 1 argument", op.name()));
                };
                let first = self.heap.first(pid);
                let second = match self.heap.rest(pid) {
                    Value::Pair(p2) => self.heap.first(p2),
                    Value::Nil => Value::Nil,
                    _ => return self.fault(id, "malformed argument list".into()),
                };
                Some(self.conts.create_before(
                    id,
                    Step::Args {
                        pending: VecDeque::from(vec![first, second]),
                        done: Vec::new(),
                        env,
                    },
                ))
            }
        }
    }

    fn combine(&mut self, op: Builtin, a: Value, b: Value) -> Result<Value, String> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(if op == Builtin::Plus {
                x.wrapping_add(y)
            } else {
                x.wrapping_sub(y)
            })),
            (Value::Str(x), Value::Str(y)) if op == Builtin::Plus => {
                let text = format!("{}{}", self.strings.text(x), self.strings.text(y));
                Ok(Value::Str(self.strings.intern(&text)))
            }
            _ => Err(format!(
                "{}: cannot combine {} and {}",
                op.name(),
                self.render(a),
                self.render(b)
            )),
        }
    }

    /// Snapshot the successor of this step and apply the lambda to it.
    /// Invoking the snapshot later resumes the saved chain with the supplied
    /// value as this callcc's result.
    fn op_callcc(&mut self, id: ContId, args: Value, env: EnvId, inbox: Inbox) -> Option<ContId> {
        match inbox {
            Inbox::Many(vals) => {
                if vals.len() != 1 {
                    return self.fault(
                        id,
                        format!("callcc: expected 1 argument, got {}", vals.len()),
                    );
                }
                let Value::Lambda(lambda) = vals[0] else {
                    let msg = format!("callcc: argument must be a lambda: {}", self.render(vals[0]));
                    return self.fault(id, msg);
                };
                let Some(next) = self.conts.next_of(id) else {
                    return self.fault(id, "callcc: nothing to capture".into());
                };
                let snapshot = self.conts.dup(next);
                let apply = self.conts.create_after(
                    id,
                    Step::Apply {
                        lambda,
                        args: Value::Nil,
                        env,
                    },
                );
                self.conts
                    .deliver(apply, Inbox::Many(vec![Value::Cont(snapshot)]));
                Some(apply)
            }
            _ => self.eval_args_first(id, args, env),
        }
    }

    // ========================================================================
    // load
    // ========================================================================

    fn op_load_start(&mut self, id: ContId, vals: &[Value], env: EnvId) -> Option<ContId> {
        let path = match vals.first() {
            Some(Value::Str(p)) => self.strings.text(*p).to_string(),
            _ => return self.fault(id, "load: expected a filename string".into()),
        };
        let log = self.log_loads || vals[1..].iter().any(|&v| self.is_log_flag(v));
        let source = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => return self.fault(id, format!("cannot open '{}': {}", path, e)),
        };
        let forms = match reader::read_all(
            &source,
            &mut self.heap,
            &mut self.symbols,
            &mut self.strings,
        ) {
            Ok(f) => f,
            Err(e) => return self.fault(id, format!("{}: {}", path, e)),
        };
        Some(self.conts.create_after(
            id,
            Step::Load {
                forms: forms.into(),
                last: Value::Nil,
                env,
                log,
            },
        ))
    }

    fn is_log_flag(&self, val: Value) -> bool {
        match val {
            Value::Sym(s) => s == sym::LOG,
            Value::Str(s) => self.strings.text(s) == "log",
            _ => false,
        }
    }

    /// Pump the parsed forms one at a time, threading the last result. The
    /// chain header's statement tracks the current form for diagnostics.
    pub(crate) fn step_load(
        &mut self,
        id: ContId,
        mut forms: VecDeque<Value>,
        mut last: Value,
        env: EnvId,
        log: bool,
    ) -> Option<ContId> {
        if let Inbox::One(val) = self.conts.take_inbox(id) {
            if log {
                info!(target: "load", result = %self.render(val), "form finished");
            }
            last = val;
        }
        if let Some(form) = forms.pop_front() {
            let header = self.conts.node(id).header;
            self.conts.header_mut(header).statement = form;
            if log {
                info!(target: "load", form = %self.render(form), "evaluating");
            }
            self.conts.set_step(
                id,
                Step::Load {
                    forms,
                    last,
                    env,
                    log,
                },
            );
            Some(self.conts.create_before(id, Step::Eval { ast: form, env }))
        } else {
            let next = self.conts.next_of(id)?;
            Some(self.conts.deliver(next, Inbox::One(last)))
        }
    }

    // ========================================================================
    // Evaluated-argument operations
    // ========================================================================

    fn run_simple(&mut self, op: Builtin, vals: &[Value]) -> Result<Value, String> {
        match op {
            Builtin::Cons => {
                let [a, b] = self.arity2(op, vals)?;
                Ok(Value::Pair(self.heap.alloc(a, b)))
            }
            Builtin::First => {
                let a = self.arity1(op, vals)?;
                let p = a
                    .as_pair()
                    .ok_or_else(|| format!("first: not a pair: {}", self.render(a)))?;
                Ok(self.heap.first(p))
            }
            Builtin::Rest => {
                let a = self.arity1(op, vals)?;
                let p = a
                    .as_pair()
                    .ok_or_else(|| format!("rest: not a pair: {}", self.render(a)))?;
                Ok(self.heap.rest(p))
            }
            Builtin::SetFirst => {
                let [a, b] = self.arity2(op, vals)?;
                let p = a
                    .as_pair()
                    .ok_or_else(|| format!("set_first: not a pair: {}", self.render(a)))?;
                self.heap.set_first(p, b);
                Ok(a)
            }
            Builtin::SetRest => {
                let [a, b] = self.arity2(op, vals)?;
                let p = a
                    .as_pair()
                    .ok_or_else(|| format!("set_rest: not a pair: {}", self.render(a)))?;
                self.heap.set_rest(p, b);
                Ok(a)
            }
            Builtin::Last => {
                let a = self.arity1(op, vals)?;
                Ok(self.last_of(a))
            }
            Builtin::Not => {
                let a = self.arity1(op, vals)?;
                Ok(Value::bool(a != Value::True))
            }
            Builtin::And => Ok(Value::bool(vals.iter().all(|&v| v == Value::True))),
            Builtin::Or => Ok(Value::bool(vals.iter().any(|&v| v == Value::True))),
            Builtin::Eq => {
                let [a, b] = self.arity2(op, vals)?;
                Ok(Value::bool(self.heap.structural_eq(a, b)))
            }
            Builtin::Gt => {
                let [a, b] = self.arity2(op, vals)?;
                self.compare_gt(a, b)
            }
            Builtin::IsSymbol => {
                let a = self.arity1(op, vals)?;
                Ok(Value::bool(a.is_sym()))
            }
            Builtin::IsPair => {
                let a = self.arity1(op, vals)?;
                Ok(Value::bool(a.is_pair()))
            }
            Builtin::IsNil => {
                let a = self.arity1(op, vals)?;
                Ok(Value::bool(a.is_nil()))
            }
            Builtin::IsAtom => {
                let a = self.arity1(op, vals)?;
                Ok(Value::bool(a.is_atom()))
            }
            Builtin::IsLambda => {
                let a = self.arity1(op, vals)?;
                Ok(Value::bool(matches!(a, Value::Lambda(_))))
            }
            Builtin::Print => self.emit(vals, false),
            Builtin::Puts => self.emit(vals, true),
            Builtin::ToS => {
                let a = self.arity1(op, vals)?;
                let text = self.value_text(a);
                Ok(Value::Str(self.strings.intern(&text)))
            }
            Builtin::Error => {
                let a = self.arity1(op, vals)?;
                Err(self.value_text(a))
            }
            Builtin::FileOpen => {
                let [p, m] = self.arity2(op, vals)?;
                let (Value::Str(p), Value::Str(m)) = (p, m) else {
                    return Err("file_open: path and mode must be strings".into());
                };
                let path = self.strings.text(p).to_string();
                let mode = self.strings.text(m).to_string();
                self.resources
                    .open(&path, &mode)
                    .map(Value::Resource)
                    .map_err(|e| e.to_string())
            }
            Builtin::FileClose => {
                let a = self.arity1(op, vals)?;
                let Value::Resource(rid) = a else {
                    return Err(format!("file_close: not a resource: {}", self.render(a)));
                };
                self.resources
                    .close(rid)
                    .map(|_| Value::Nil)
                    .map_err(|e| e.to_string())
            }
            Builtin::FileWrite => {
                let [r, s] = self.arity2(op, vals)?;
                let Value::Resource(rid) = r else {
                    return Err(format!("file_write: not a resource: {}", self.render(r)));
                };
                let Value::Str(sid) = s else {
                    return Err(format!("file_write: not a string: {}", self.render(s)));
                };
                let text = self.strings.text(sid).to_string();
                self.resources
                    .write(rid, &text)
                    .map(|n| Value::Int(n as i64))
                    .map_err(|e| e.to_string())
            }
            Builtin::FileRead => {
                let a = self.arity1(op, vals)?;
                let Value::Resource(rid) = a else {
                    return Err(format!("file_read: not a resource: {}", self.render(a)));
                };
                let text = self.resources.read_all(rid).map_err(|e| e.to_string())?;
                Ok(Value::Str(self.strings.intern(&text)))
            }
            _ => Err(format!("internal: {} dispatched as a simple op", op.name())),
        }
    }

    fn emit(&mut self, vals: &[Value], newline_each: bool) -> Result<Value, String> {
        let mut stdout = io::stdout();
        for &val in vals {
            let text = translate_escapes(&self.value_text(val));
            let written = if newline_each {
                writeln!(stdout, "{}", text)
            } else {
                write!(stdout, "{}", text)
            };
            written.map_err(|e| format!("write failed: {}", e))?;
        }
        stdout.flush().map_err(|e| format!("write failed: {}", e))?;
        Ok(vals.last().copied().unwrap_or(Value::Nil))
    }

    /// The textual value of a value-bearing atom; the printed form of
    /// everything else.
    pub(crate) fn value_text(&self, val: Value) -> String {
        match val {
            Value::Int(n) => n.to_string(),
            Value::Str(id) => self.strings.text(id).to_string(),
            Value::Sym(id) => self.symbols.name(id).to_string(),
            other => self.render(other),
        }
    }

    fn compare_gt(&self, a: Value, b: Value) -> Result<Value, String> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Ok(Value::bool(x > y)),
            (Value::Str(x), Value::Str(y)) => {
                Ok(Value::bool(self.strings.text(x) > self.strings.text(y)))
            }
            _ => Err(format!(
                "gt?: cannot order {} and {}",
                self.render(a),
                self.render(b)
            )),
        }
    }

    /// Walk a list to its terminal: the final element of a proper list, the
    /// dotted tail otherwise. A cycle stops at the first revisited cell.
    fn last_of(&self, val: Value) -> Value {
        let mut seen = HashSet::new();
        let mut current = val;
        while let Value::Pair(id) = current {
            if !seen.insert(id) {
                return self.heap.first(id);
            }
            match self.heap.rest(id) {
                Value::Nil => return self.heap.first(id),
                next => current = next,
            }
        }
        current
    }

    // ========================================================================
    // Small argument-list helpers
    // ========================================================================

    fn arity1(&self, op: Builtin, vals: &[Value]) -> Result<Value, String> {
        if vals.len() != 1 {
            return Err(format!(
                "{}: expected 1 argument, got {}",
                op.name(),
                vals.len()
            ));
        }
        Ok(vals[0])
    }

    fn arity2(&self, op: Builtin, vals: &[Value]) -> Result<[Value; 2], String> {
        if vals.len() != 2 {
            return Err(format!(
                "{}: expected 2 arguments, got {}",
                op.name(),
                vals.len()
            ));
        }
        Ok([vals[0], vals[1]])
    }

    fn first_or_nil(&self, val: Value) -> Value {
        match val {
            Value::Pair(p) => self.heap.first(p),
            _ => Value::Nil,
        }
    }

    fn rest_or_nil(&self, val: Value) -> Value {
        match val {
            Value::Pair(p) => self.heap.rest(p),
            _ => Value::Nil,
        }
    }

    fn second_or_nil(&self, val: Value) -> Value {
        let rest = self.rest_or_nil(val);
        self.first_or_nil(rest)
    }

    fn parse_params(&self, form: Value) -> Result<Vec<SymbolId>, String> {
        let Some(items) = self.heap.list_to_vec(form) else {
            return Err("lambda: parameter list must be a list".into());
        };
        items
            .into_iter()
            .map(|v| {
                v.as_sym()
                    .ok_or_else(|| format!("lambda: parameter is not a symbol: {}", self.render(v)))
            })
            .collect()
    }

    /// Zero body forms evaluate to nil, a single form stands alone, several
    /// are wrapped in (begin …).
    fn body_form(&mut self, forms: Value) -> Value {
        match forms {
            Value::Nil => Value::Nil,
            Value::Pair(pid) if self.heap.rest(pid).is_nil() => self.heap.first(pid),
            _ => Value::Pair(self.heap.alloc(Value::Sym(sym::BEGIN), forms)),
        }
    }
}

/// Interpret the two-character sequences `\n` and `\t` when emitting text.
fn translate_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_sequences_translate() {
        assert_eq!(translate_escapes("a\\nb\\tc"), "a\nb\tc");
        assert_eq!(translate_escapes("plain"), "plain");
        assert_eq!(translate_escapes("trailing\\"), "trailing\\");
        assert_eq!(translate_escapes("\\x"), "\\x");
    }

    #[test]
    fn every_builtin_has_a_distinct_symbol() {
        let mut seen = HashSet::new();
        for &op in Builtin::ALL {
            assert!(seen.insert(op.symbol()), "duplicate symbol for {:?}", op);
            assert_eq!(Builtin::from_symbol(op.symbol()), Some(op));
        }
    }
}
