use thiserror::Error;

/// Errors surfaced to the driver.
///
/// Failures inside a running chain do not travel as `Err` through the
/// trampoline — they are routed to the chain's error handler continuation
/// and come out the far end as an `Eval` diagnostic.
#[derive(Debug, Clone, Error)]
pub enum LispError {
    /// Raised by the scanner or reader before evaluation begins.
    #[error("{0}")]
    Syntax(String),

    /// Any in-chain failure: unresolved symbol, type or arity mismatch,
    /// user-raised `(error msg)`, unknown built-in.
    #[error("{message}")]
    Eval {
        message: String,
        /// The offending top-level form, pretty-printed.
        form: Option<String>,
    },

    /// I/O failure from a resource operation.
    #[error("{0}")]
    Io(String),

    /// Internal interpreter error (should not happen in correct code).
    #[error("internal error: {0}")]
    Internal(String),
}

pub type LispResult<T> = Result<T, LispError>;
