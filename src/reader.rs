use crate::error::{LispError, LispResult};
use crate::heap::Heap;
use crate::scanner::{Scanner, END};
use crate::strings::StrTable;
use crate::symbol::{sym, SymbolTable};
use crate::value::Value;

/// Characters that end a bare word: whitespace, a closing paren, or end of
/// input. Anything else (including `.`) is part of the symbol.
const WORD_END: &[u8] = &[b' ', b'\t', b'\n', b'\r', b')', END];

/// S-expression parser producing heap-allocated values.
pub struct Reader<'a> {
    scan: Scanner<'a>,
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
    strings: &'a mut StrTable,
}

impl<'a> Reader<'a> {
    pub fn new(
        input: &'a str,
        heap: &'a mut Heap,
        symbols: &'a mut SymbolTable,
        strings: &'a mut StrTable,
    ) -> Self {
        Reader {
            scan: Scanner::new(input),
            heap,
            symbols,
            strings,
        }
    }

    /// Read one form. Returns None when only whitespace and comments remain.
    pub fn read(&mut self) -> LispResult<Option<Value>> {
        self.skip_blank();
        if self.scan.ended() {
            return Ok(None);
        }
        Ok(Some(self.read_form()?))
    }

    /// Read all remaining forms.
    pub fn read_all(&mut self) -> LispResult<Vec<Value>> {
        let mut forms = Vec::new();
        while let Some(form) = self.read()? {
            forms.push(form);
        }
        Ok(forms)
    }

    /// Byte offset of the cursor, for resumable reads.
    pub fn position(&self) -> usize {
        self.scan.position()
    }

    /// Skip whitespace and `;` line comments.
    fn skip_blank(&mut self) {
        self.scan.skip_whitespace();
        while self.scan.peek() == b';' {
            // A comment runs to the newline; end of input also ends it.
            let _ = self.scan.until(&[b'\n', END]);
            self.scan.skip_whitespace();
        }
    }

    fn read_form(&mut self) -> LispResult<Value> {
        match self.scan.peek() {
            b'\'' => {
                self.scan.next();
                self.skip_blank();
                if self.scan.ended() {
                    return Err(LispError::Syntax("unexpected end of input after '".into()));
                }
                let inner = self.read_form()?;
                let quoted = self.heap.list(&[Value::Sym(sym::QUOTE), inner]);
                Ok(quoted)
            }
            b'(' => self.read_list(),
            b')' => Err(LispError::Syntax(format!(
                "unexpected ')' at offset {}",
                self.scan.position()
            ))),
            _ => self.read_atom(),
        }
    }

    fn read_list(&mut self) -> LispResult<Value> {
        self.scan.one_of(&[b'('])?;
        self.read_list_rest()
    }

    fn read_list_rest(&mut self) -> LispResult<Value> {
        self.skip_blank();
        if self.scan.ended() {
            return Err(LispError::Syntax("unterminated list".into()));
        }
        if self.scan.peek() == b')' {
            self.scan.next();
            return Ok(Value::Nil);
        }
        let first = self.read_form()?;
        let rest = self.read_list_rest()?;
        Ok(Value::Pair(self.heap.alloc(first, rest)))
    }

    fn read_atom(&mut self) -> LispResult<Value> {
        if self.scan.peek() == b'"' {
            self.scan.next();
            let text = self
                .scan
                .until(&[b'"'])
                .map_err(|_| LispError::Syntax("unterminated string".into()))?;
            let text = text.to_string();
            self.scan.next();
            return Ok(Value::Str(self.strings.intern(&text)));
        }

        let word = self.scan.until(WORD_END)?;
        match word {
            "" => Ok(Value::Nil),
            "nil" | "null" => Ok(Value::Nil),
            "true" => Ok(Value::True),
            "false" => Ok(Value::False),
            _ if word.bytes().all(|b| b.is_ascii_digit()) => {
                let n = word.parse::<i64>().map_err(|_| {
                    LispError::Syntax(format!("integer literal out of range: {}", word))
                })?;
                Ok(Value::Int(n))
            }
            _ => Ok(Value::Sym(self.symbols.intern(word))),
        }
    }
}

/// Read a single form from a string.
pub fn read_str(
    input: &str,
    heap: &mut Heap,
    symbols: &mut SymbolTable,
    strings: &mut StrTable,
) -> LispResult<Value> {
    let mut reader = Reader::new(input, heap, symbols, strings);
    reader
        .read()?
        .ok_or_else(|| LispError::Syntax("empty input".into()))
}

/// Read all forms from a string.
pub fn read_all(
    input: &str,
    heap: &mut Heap,
    symbols: &mut SymbolTable,
    strings: &mut StrTable,
) -> LispResult<Vec<Value>> {
    let mut reader = Reader::new(input, heap, symbols, strings);
    reader.read_all()
}

/// Read one form starting at byte offset `pos`.
/// Returns `Ok(Some((value, new_pos)))` or `Ok(None)` if only whitespace and
/// comments remain.
pub fn read_one_at(
    input: &str,
    pos: usize,
    heap: &mut Heap,
    symbols: &mut SymbolTable,
    strings: &mut StrTable,
) -> LispResult<Option<(Value, usize)>> {
    let mut reader = Reader::new(&input[pos..], heap, symbols, strings);
    match reader.read()? {
        Some(val) => {
            let new_pos = pos + reader.position();
            Ok(Some((val, new_pos)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_val;

    struct Fixture {
        heap: Heap,
        symbols: SymbolTable,
        strings: StrTable,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                heap: Heap::new(),
                symbols: SymbolTable::new(),
                strings: StrTable::new(),
            }
        }

        fn read(&mut self, src: &str) -> LispResult<Value> {
            read_str(src, &mut self.heap, &mut self.symbols, &mut self.strings)
        }

        fn print(&self, v: Value) -> String {
            print_val(v, &self.heap, &self.symbols, &self.strings)
        }
    }

    #[test]
    fn atoms() {
        let mut fx = Fixture::new();
        assert_eq!(fx.read("nil").unwrap(), Value::Nil);
        assert_eq!(fx.read("null").unwrap(), Value::Nil);
        assert_eq!(fx.read("true").unwrap(), Value::True);
        assert_eq!(fx.read("false").unwrap(), Value::False);
        assert_eq!(fx.read("123").unwrap(), Value::Int(123));
        let s = fx.read("\"hi there\"").unwrap();
        assert_eq!(s.as_str().map(|id| fx.strings.text(id)), Some("hi there"));
        assert!(fx.read("a.b").unwrap().is_sym());
    }

    #[test]
    fn lists_nest() {
        let mut fx = Fixture::new();
        let v = fx.read("((a) (b c))").unwrap();
        assert_eq!(fx.print(v), "((a) (b c))");
        assert_eq!(fx.read("()").unwrap(), Value::Nil);
    }

    #[test]
    fn quote_shorthand_expands() {
        let mut fx = Fixture::new();
        let v = fx.read("'x").unwrap();
        assert_eq!(fx.print(v), "(quote x)");
    }

    #[test]
    fn comments_are_skipped() {
        let mut fx = Fixture::new();
        let v = fx.read("; leading\n ; more\n 42 ; trailing").unwrap();
        assert_eq!(v, Value::Int(42));
    }

    #[test]
    fn end_of_input_reads_as_no_form() {
        let mut fx = Fixture::new();
        let mut reader = Reader::new(
            "  ; just a comment",
            &mut fx.heap,
            &mut fx.symbols,
            &mut fx.strings,
        );
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn syntax_errors() {
        let mut fx = Fixture::new();
        assert!(matches!(fx.read("(1 2"), Err(LispError::Syntax(_))));
        assert!(matches!(fx.read("\"open"), Err(LispError::Syntax(_))));
        assert!(matches!(fx.read(")"), Err(LispError::Syntax(_))));
    }

    #[test]
    fn read_one_at_resumes() {
        let mut fx = Fixture::new();
        let src = "1 (2 3) four";
        let mut pos = 0;
        let mut printed = Vec::new();
        while let Some((form, new_pos)) =
            read_one_at(src, pos, &mut fx.heap, &mut fx.symbols, &mut fx.strings).unwrap()
        {
            printed.push(fx.print(form));
            pos = new_pos;
        }
        assert_eq!(printed, vec!["1", "(2 3)", "four"]);
    }
}
