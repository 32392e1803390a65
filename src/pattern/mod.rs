//! Pattern language: tokenizer, compiler and the compiled Op tree
//!
//! A pattern is a compact textual description of a binary layout:
//!
//! ```text
//! c s l q      uint8 / uint16 / uint32 / uint64 (big-endian)
//! v            dynamic value, resolved by capability
//! { ... }      struct, bound to a composite's fields in order
//! [len] op     array; len is a uint token (encoded length) or a decimal literal
//! < ... >      const block, its bytes must match exactly on decode
//! xHH          single literal byte
//! ```
//!
//! Architecture:
//! - Lexer: turns a pattern string into tokens
//! - Compiler: recursive descent from tokens to a [`Format`], with a cache
//! - Op: the immutable compiled tree walked by the codec

pub mod compiler;
pub mod lexer;
pub mod op;

pub use compiler::Compiler;
pub use lexer::{Lexeme, Lexer, Token};
pub use op::{arity, ArrayOp, Format, Length, Op, Width};

use thiserror::Error;

/// Errors produced while tokenizing or compiling a pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("invalid format character 0x{byte:02x} at offset {offset}")]
    InvalidCharacter { byte: u8, offset: usize },

    #[error("invalid byte literal at offset {offset}: expected 'x' and two hex digits")]
    InvalidByteLiteral { offset: usize },

    #[error("unexpected token '{token}' at offset {offset}")]
    UnexpectedToken { token: Token, offset: usize },

    #[error("unexpected end of pattern")]
    UnexpectedEnd,

    #[error("invalid fixed array length at offset {offset}: must be a positive integer")]
    InvalidArrayLength { offset: usize },

    #[error("pattern nesting exceeds depth limit of {0}")]
    NestingTooDeep(usize),
}

/// Compile a pattern through the process-wide compiler cache.
///
/// ```
/// let format = cslq::compile("{[c]c q}").unwrap();
/// assert_eq!(format.to_string(), "{[c]cq}");
/// ```
pub fn compile(pattern: &str) -> Result<Format, CompileError> {
    Compiler::global().get_or_compile(pattern)
}
