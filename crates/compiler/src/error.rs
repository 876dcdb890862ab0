use thiserror::Error;

/// The three compile-time error kinds from spec section 7; lex/parse errors
/// are folded in here once they're surfaced to the compiler so `Program`
/// has one uniform diagnostic shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    Io,
    Lex,
    Parse,
    Codegen,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{line}:{column}: {message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub line: u32,
    pub column: u32,
    pub message: String,
}
