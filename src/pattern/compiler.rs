//! Pattern Compiler - Builds the Op tree from tokens
//!
//! Recursive descent: every opening token owns the consumption of its
//! parameters and of its matching close token.

use super::lexer::{Lexeme, Lexer, Token};
use super::op::{ArrayOp, Format, Length, Op, Width};
use super::CompileError;
use crate::config::Limits;
use log::{debug, trace};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::OnceLock;

static GLOBAL_COMPILER: OnceLock<Compiler> = OnceLock::new();

/// Compiles patterns and caches the resulting formats by pattern string.
///
/// # Thread Safety
/// Lookups share a read lock. A miss compiles outside the lock and inserts
/// under the write lock only if no other thread got there first, so every
/// caller ends up with the same `Format` and never sees a partial one.
pub struct Compiler {
    cache: RwLock<HashMap<String, Format>>,
    limits: Limits,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl Compiler {
    /// Create a compiler with its own, empty cache
    pub fn new(limits: Limits) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// The process-wide compiler used by the crate-level helpers.
    ///
    /// Created with default limits unless [`Compiler::init_global`] ran first.
    pub fn global() -> &'static Compiler {
        GLOBAL_COMPILER.get_or_init(Compiler::default)
    }

    /// Install the process-wide compiler with custom limits.
    ///
    /// Returns `false` if the global compiler was already initialized.
    pub fn init_global(limits: Limits) -> bool {
        GLOBAL_COMPILER.set(Compiler::new(limits)).is_ok()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Compile a pattern without touching the cache.
    pub fn compile(&self, pattern: &str) -> Result<Format, CompileError> {
        let mut parser = Parser {
            lexer: Lexer::new(pattern),
            max_depth: self.limits.max_depth,
        };

        let format = Format::new(parser.parse()?);
        trace!("compiled {:?} into {} ops", pattern, format.len());
        Ok(format)
    }

    /// Return the cached format for `pattern`, compiling it on first use.
    ///
    /// Failed compilations are not cached.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Format, CompileError> {
        if let Some(format) = self.cache.read().get(pattern) {
            return Ok(format.clone());
        }

        debug!("format cache miss for {:?}", pattern);
        let format = self.compile(pattern).map_err(|e| {
            debug!("failed to compile {:?}: {}", pattern, e);
            e
        })?;

        let mut cache = self.cache.write();
        Ok(cache.entry(pattern.to_string()).or_insert(format).clone())
    }

    /// Number of cached formats
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    max_depth: usize,
}

impl Parser<'_> {
    fn parse(&mut self) -> Result<Vec<Op>, CompileError> {
        let mut ops = Vec::new();

        while let Some(lexeme) = self.lexer.next_token()? {
            ops.push(self.parse_op(lexeme, 1)?);
        }

        Ok(ops)
    }

    fn parse_op(&mut self, lexeme: Lexeme, depth: usize) -> Result<Op, CompileError> {
        if depth > self.max_depth {
            return Err(CompileError::NestingTooDeep(self.max_depth));
        }

        match lexeme.token {
            Token::StructStart => Ok(Op::Struct(self.parse_sequence(Token::StructEnd, depth)?)),
            Token::ConstStart => Ok(Op::Const(self.parse_sequence(Token::ConstEnd, depth)?)),
            Token::ArrayStart => self.parse_array(depth),
            Token::Uint8 => Ok(Op::Uint(Width::U8)),
            Token::Uint16 => Ok(Op::Uint(Width::U16)),
            Token::Uint32 => Ok(Op::Uint(Width::U32)),
            Token::Uint64 => Ok(Op::Uint(Width::U64)),
            Token::Interface => Ok(Op::Interface),
            Token::Byte(b) => Ok(Op::Byte(b)),
            token => Err(CompileError::UnexpectedToken {
                token,
                offset: lexeme.offset,
            }),
        }
    }

    /// Compile ops until `close`; any other close token is an error.
    fn parse_sequence(&mut self, close: Token, depth: usize) -> Result<Vec<Op>, CompileError> {
        let mut ops = Vec::new();

        loop {
            let lexeme = self.expect_token()?;
            if lexeme.token == close {
                return Ok(ops);
            }
            ops.push(self.parse_op(lexeme, depth + 1)?);
        }
    }

    fn parse_array(&mut self, depth: usize) -> Result<Op, CompileError> {
        let lexeme = self.expect_token()?;
        let length = match lexeme.token {
            Token::Uint8 => Length::Prefixed(Width::U8),
            Token::Uint16 => Length::Prefixed(Width::U16),
            Token::Uint32 => Length::Prefixed(Width::U32),
            Token::Uint64 => Length::Prefixed(Width::U64),
            Token::Number(0) => {
                return Err(CompileError::InvalidArrayLength {
                    offset: lexeme.offset,
                })
            }
            Token::Number(n) => Length::Fixed(n),
            token => {
                return Err(CompileError::UnexpectedToken {
                    token,
                    offset: lexeme.offset,
                })
            }
        };

        let end = self.expect_token()?;
        if end.token != Token::ArrayEnd {
            return Err(CompileError::UnexpectedToken {
                token: end.token,
                offset: end.offset,
            });
        }

        let element = self.expect_token()?;
        let element = self.parse_op(element, depth + 1)?;

        Ok(Op::Array(ArrayOp {
            length,
            element: Box::new(element),
        }))
    }

    fn expect_token(&mut self) -> Result<Lexeme, CompileError> {
        self.lexer.next_token()?.ok_or(CompileError::UnexpectedEnd)
    }
}
