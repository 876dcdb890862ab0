use thiserror::Error;

/// One recoverable parse diagnostic (spec section 4.3/7). The parser keeps
/// going after emitting one of these; callers inspect `Program.errors` (or
/// rather the compiler's accumulated list, since the AST itself carries no
/// error state) to decide whether to proceed to codegen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}
