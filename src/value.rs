use std::fmt;

/// Unique identifier for an interned symbol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SymbolId(pub u32);

/// Unique identifier for an interned string literal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StrId(pub u32);

/// Index into the pair-cell heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PairId(pub u32);

/// Index into the lambda arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LambdaId(pub u32);

/// Index into the table of open host resources.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ResourceId(pub u32);

/// Index into the continuation-chain arena. A `Value::Cont` holding one of
/// these is a first-class captured continuation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContId(pub u32);

/// The fundamental Lisp value. 8 bytes: discriminant + payload.
/// Copy semantics — compound data lives in the machine's tables, so a
/// `Value` can be handed around and stored in continuation records freely.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Nil,
    True,
    False,
    Sym(SymbolId),
    Str(StrId),
    Int(i64),
    Pair(PairId),
    Lambda(LambdaId),
    Resource(ResourceId),
    Cont(ContId),
}

impl Value {
    pub fn is_nil(self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_sym(self) -> bool {
        matches!(self, Value::Sym(_))
    }

    /// An atom is a leaf value: a singleton, a symbol, a string, or an
    /// integer. Lambdas, resources and continuations are neither atoms nor
    /// pairs.
    pub fn is_atom(self) -> bool {
        matches!(
            self,
            Value::Nil
                | Value::True
                | Value::False
                | Value::Sym(_)
                | Value::Str(_)
                | Value::Int(_)
        )
    }

    /// Truthiness as `if` sees it: only `false` and `nil` are false.
    pub fn is_truthy(self) -> bool {
        !matches!(self, Value::False | Value::Nil)
    }

    pub fn as_pair(self) -> Option<PairId> {
        match self {
            Value::Pair(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_sym(self) -> Option<SymbolId> {
        match self {
            Value::Sym(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_str(self) -> Option<StrId> {
        match self {
            Value::Str(id) => Some(id),
            _ => None,
        }
    }

    /// Build the canonical boolean singleton for a host bool.
    pub fn bool(b: bool) -> Value {
        if b {
            Value::True
        } else {
            Value::False
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::True => write!(f, "True"),
            Value::False => write!(f, "False"),
            Value::Sym(id) => write!(f, "Sym({})", id.0),
            Value::Str(id) => write!(f, "Str({})", id.0),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Pair(id) => write!(f, "Pair({})", id.0),
            Value::Lambda(id) => write!(f, "Lambda({})", id.0),
            Value::Resource(id) => write!(f, "Resource({})", id.0),
            Value::Cont(id) => write!(f, "Cont({})", id.0),
        }
    }
}
