use crate::value::SymbolId;
use std::collections::HashMap;

/// Interned symbol table. Each unique symbol name maps to a unique SymbolId,
/// so `(eq? 'foo 'foo)` is id equality.
pub struct SymbolTable {
    name_to_id: HashMap<String, SymbolId>,
    id_to_name: Vec<String>,
}

/// Well-known symbol IDs, pre-interned at startup.
/// These must match the order of interning in SymbolTable::new().
pub mod sym {
    use crate::value::SymbolId;

    pub const QUOTE: SymbolId = SymbolId(0);
    pub const DEFINE: SymbolId = SymbolId(1);
    pub const SET: SymbolId = SymbolId(2);
    pub const LAMBDA: SymbolId = SymbolId(3);
    pub const BEGIN: SymbolId = SymbolId(4);
    pub const LOAD: SymbolId = SymbolId(5);
    pub const CONS: SymbolId = SymbolId(6);
    pub const FIRST: SymbolId = SymbolId(7);
    pub const REST: SymbolId = SymbolId(8);
    pub const SET_FIRST: SymbolId = SymbolId(9);
    pub const SET_REST: SymbolId = SymbolId(10);
    pub const LAST: SymbolId = SymbolId(11);
    pub const PLUS: SymbolId = SymbolId(12);
    pub const MINUS: SymbolId = SymbolId(13);
    pub const NOT: SymbolId = SymbolId(14);
    pub const AND: SymbolId = SymbolId(15);
    pub const OR: SymbolId = SymbolId(16);
    pub const EQ: SymbolId = SymbolId(17);
    pub const GT: SymbolId = SymbolId(18);
    pub const IF: SymbolId = SymbolId(19);
    pub const IS_SYMBOL: SymbolId = SymbolId(20);
    pub const IS_PAIR: SymbolId = SymbolId(21);
    pub const IS_NIL: SymbolId = SymbolId(22);
    pub const IS_ATOM: SymbolId = SymbolId(23);
    pub const IS_LAMBDA: SymbolId = SymbolId(24);
    pub const PRINT: SymbolId = SymbolId(25);
    pub const PUTS: SymbolId = SymbolId(26);
    pub const TO_S: SymbolId = SymbolId(27);
    pub const ERROR: SymbolId = SymbolId(28);
    pub const FILE_OPEN: SymbolId = SymbolId(29);
    pub const FILE_CLOSE: SymbolId = SymbolId(30);
    pub const FILE_WRITE: SymbolId = SymbolId(31);
    pub const FILE_READ: SymbolId = SymbolId(32);
    pub const CALLCC: SymbolId = SymbolId(33);
    pub const ARGV: SymbolId = SymbolId(34);
    pub const LOG: SymbolId = SymbolId(35);
}

impl SymbolTable {
    /// Create a new symbol table with all well-known symbols pre-interned.
    /// The order MUST match the constants in the `sym` module above.
    pub fn new() -> Self {
        let names = [
            "quote", "define", "set", "lambda", "begin", "load",
            "cons", "first", "rest", "set_first", "set_rest", "last",
            "plus", "minus", "not", "and", "or", "eq?", "gt?", "if",
            "symbol?", "pair?", "nil?", "atom?", "lambda?",
            "print", "puts", "to_s", "error",
            "file_open", "file_close", "file_write", "file_read",
            "callcc", "argv", "log",
        ];

        let mut name_to_id = HashMap::new();
        let mut id_to_name = Vec::new();

        for (i, name) in names.iter().enumerate() {
            let id = SymbolId(i as u32);
            name_to_id.insert(name.to_string(), id);
            id_to_name.push(name.to_string());
        }

        SymbolTable {
            name_to_id,
            id_to_name,
        }
    }

    /// Intern a symbol name. Returns the existing ID if already interned,
    /// or creates a new one.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = SymbolId(self.id_to_name.len() as u32);
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.push(name.to_string());
        id
    }

    /// Look up a symbol name by its ID.
    pub fn name(&self, id: SymbolId) -> &str {
        &self.id_to_name[id.0 as usize]
    }

    /// Look up a symbol ID by name, without interning.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.name_to_id.get(name).copied()
    }

    /// Total number of interned symbols.
    pub fn count(&self) -> usize {
        self.id_to_name.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}
