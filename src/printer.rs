use crate::heap::Heap;
use crate::strings::StrTable;
use crate::symbol::SymbolTable;
use crate::value::{PairId, Value};

/// Render a value back to source form.
///
/// Pairs currently being printed are tracked on a stack; re-entering one
/// (a cycle built with set_first/set_rest) emits `...` instead of recursing
/// forever.
pub fn print_val(val: Value, heap: &Heap, symbols: &SymbolTable, strings: &StrTable) -> String {
    let mut out = String::new();
    let mut in_progress: Vec<PairId> = Vec::new();
    print_inner(val, heap, symbols, strings, &mut out, &mut in_progress);
    out
}

fn print_inner(
    val: Value,
    heap: &Heap,
    symbols: &SymbolTable,
    strings: &StrTable,
    out: &mut String,
    in_progress: &mut Vec<PairId>,
) {
    match val {
        Value::Nil => out.push_str("nil"),
        Value::True => out.push_str("true"),
        Value::False => out.push_str("false"),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Sym(id) => out.push_str(symbols.name(id)),
        Value::Str(id) => {
            out.push('"');
            out.push_str(strings.text(id));
            out.push('"');
        }
        Value::Resource(id) => out.push_str(&format!("<resource {}>", id.0)),
        Value::Cont(_) => out.push_str("<continuation>"),
        Value::Lambda(id) => {
            let data = heap.lambda(id);
            out.push_str("(lambda (");
            for (i, &param) in data.params.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(symbols.name(param));
            }
            out.push_str(") ");
            print_inner(data.body, heap, symbols, strings, out, in_progress);
            out.push(')');
        }
        Value::Pair(id) => print_pair(id, heap, symbols, strings, out, in_progress),
    }
}

fn print_pair(
    id: PairId,
    heap: &Heap,
    symbols: &SymbolTable,
    strings: &StrTable,
    out: &mut String,
    in_progress: &mut Vec<PairId>,
) {
    if in_progress.contains(&id) {
        out.push_str("...");
        return;
    }
    let mark = in_progress.len();
    in_progress.push(id);

    out.push('(');
    print_inner(heap.first(id), heap, symbols, strings, out, in_progress);

    let mut current = heap.rest(id);
    loop {
        match current {
            Value::Nil => break,
            Value::Pair(pid) => {
                if in_progress.contains(&pid) {
                    out.push_str(" ...");
                    break;
                }
                in_progress.push(pid);
                out.push(' ');
                print_inner(heap.first(pid), heap, symbols, strings, out, in_progress);
                current = heap.rest(pid);
            }
            tail => {
                out.push_str(" . ");
                print_inner(tail, heap, symbols, strings, out, in_progress);
                break;
            }
        }
    }
    out.push(')');
    in_progress.truncate(mark);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> (Heap, SymbolTable, StrTable) {
        (Heap::new(), SymbolTable::new(), StrTable::new())
    }

    #[test]
    fn atoms_render_as_literals() {
        let (heap, symbols, mut strings) = tables();
        let s = Value::Str(strings.intern("hi"));
        assert_eq!(print_val(Value::Nil, &heap, &symbols, &strings), "nil");
        assert_eq!(print_val(Value::Int(-7), &heap, &symbols, &strings), "-7");
        assert_eq!(print_val(s, &heap, &symbols, &strings), "\"hi\"");
    }

    #[test]
    fn dotted_tail_renders_with_a_dot() {
        let (mut heap, symbols, strings) = tables();
        let p = heap.alloc(Value::Int(1), Value::Int(2));
        assert_eq!(
            print_val(Value::Pair(p), &heap, &symbols, &strings),
            "(1 . 2)"
        );
    }

    #[test]
    fn lambdas_render_with_params_and_body() {
        let (mut heap, mut symbols, strings) = tables();
        let a = symbols.intern("a");
        let body = Value::Sym(a);
        let lam = heap.alloc_lambda(crate::heap::LambdaData {
            params: vec![a],
            body,
            env: crate::env::EnvId(0),
        });
        assert_eq!(
            print_val(Value::Lambda(lam), &heap, &symbols, &strings),
            "(lambda (a) a)"
        );
    }

    #[test]
    fn tail_cycle_prints_ellipsis() {
        let (mut heap, symbols, strings) = tables();
        let p = heap.alloc(Value::Int(1), Value::Nil);
        heap.set_rest(p, Value::Pair(p));
        assert_eq!(
            print_val(Value::Pair(p), &heap, &symbols, &strings),
            "(1 ...)"
        );
    }

    #[test]
    fn head_cycle_prints_ellipsis() {
        let (mut heap, symbols, strings) = tables();
        let p = heap.alloc(Value::Nil, Value::Int(2));
        heap.set_first(p, Value::Pair(p));
        assert_eq!(
            print_val(Value::Pair(p), &heap, &symbols, &strings),
            "(... . 2)"
        );
    }

    #[test]
    fn shared_but_acyclic_structure_prints_fully() {
        let (mut heap, symbols, strings) = tables();
        let shared = heap.alloc(Value::Int(1), Value::Nil);
        let l = heap.list(&[Value::Pair(shared), Value::Pair(shared)]);
        assert_eq!(print_val(l, &heap, &symbols, &strings), "((1) (1))");
    }
}
