//! Pattern Lexer - Tokenizes pattern strings
//!
//! Tokens are produced on demand; whitespace is insignificant.

use super::CompileError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    StructStart, // {
    StructEnd,   // }
    ArrayStart,  // [
    ArrayEnd,    // ]
    ConstStart,  // <
    ConstEnd,    // >

    Uint8,  // c
    Uint16, // s
    Uint32, // l
    Uint64, // q

    Interface, // v

    // Literals
    Number(usize), // 16
    Byte(u8),      // x0f
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::StructStart => f.write_str("{"),
            Token::StructEnd => f.write_str("}"),
            Token::ArrayStart => f.write_str("["),
            Token::ArrayEnd => f.write_str("]"),
            Token::ConstStart => f.write_str("<"),
            Token::ConstEnd => f.write_str(">"),
            Token::Uint8 => f.write_str("c"),
            Token::Uint16 => f.write_str("s"),
            Token::Uint32 => f.write_str("l"),
            Token::Uint64 => f.write_str("q"),
            Token::Interface => f.write_str("v"),
            Token::Number(n) => write!(f, "{}", n),
            Token::Byte(b) => write!(f, "x{:02x}", b),
        }
    }
}

/// A token together with the byte offset it started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            position: 0,
        }
    }

    /// Collect every remaining token.
    pub fn tokenize(&mut self) -> Result<Vec<Lexeme>, CompileError> {
        let mut tokens = Vec::new();
        while let Some(lexeme) = self.next_token()? {
            tokens.push(lexeme);
        }
        Ok(tokens)
    }

    /// Read the next token. `Ok(None)` marks the end of the pattern.
    pub fn next_token(&mut self) -> Result<Option<Lexeme>, CompileError> {
        self.skip_whitespace();

        let offset = self.position;
        let byte = match self.current() {
            Some(byte) => byte,
            None => return Ok(None),
        };

        let token = match byte {
            b'{' => Token::StructStart,
            b'}' => Token::StructEnd,
            b'[' => Token::ArrayStart,
            b']' => Token::ArrayEnd,
            b'<' => Token::ConstStart,
            b'>' => Token::ConstEnd,
            b'c' => Token::Uint8,
            b's' => Token::Uint16,
            b'l' => Token::Uint32,
            b'q' => Token::Uint64,
            b'v' => Token::Interface,
            b'x' => return self.read_byte_literal(offset).map(Some),
            b'0'..=b'9' => return self.read_number(offset).map(Some),
            byte => return Err(CompileError::InvalidCharacter { byte, offset }),
        };

        self.advance();
        Ok(Some(Lexeme { token, offset }))
    }

    fn current(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.advance();
        }
    }

    fn read_number(&mut self, offset: usize) -> Result<Lexeme, CompileError> {
        let mut value: usize = 0;

        // stops on (and leaves unread) the first non-digit
        while let Some(digit @ b'0'..=b'9') = self.current() {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(usize::from(digit - b'0')))
                .ok_or(CompileError::InvalidArrayLength { offset })?;
            self.advance();
        }

        Ok(Lexeme {
            token: Token::Number(value),
            offset,
        })
    }

    fn read_byte_literal(&mut self, offset: usize) -> Result<Lexeme, CompileError> {
        self.advance(); // skip 'x'

        let mut value = 0u8;
        for _ in 0..2 {
            let nibble = self
                .current()
                .and_then(|b| (b as char).to_digit(16))
                .ok_or(CompileError::InvalidByteLiteral { offset })?;
            value = (value << 4) | nibble as u8;
            self.advance();
        }

        Ok(Lexeme {
            token: Token::Byte(value),
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|l| l.token)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            tokens("{ } [ ] < > c s l q v"),
            vec![
                Token::StructStart,
                Token::StructEnd,
                Token::ArrayStart,
                Token::ArrayEnd,
                Token::ConstStart,
                Token::ConstEnd,
                Token::Uint8,
                Token::Uint16,
                Token::Uint32,
                Token::Uint64,
                Token::Interface,
            ]
        );
    }

    #[test]
    fn test_number_stops_at_non_digit() {
        assert_eq!(
            tokens("[128]c"),
            vec![
                Token::ArrayStart,
                Token::Number(128),
                Token::ArrayEnd,
                Token::Uint8,
            ]
        );
    }

    #[test]
    fn test_byte_literals() {
        assert_eq!(
            tokens("x00xffxA5"),
            vec![Token::Byte(0x00), Token::Byte(0xff), Token::Byte(0xa5)]
        );
    }

    #[test]
    fn test_whitespace_is_skipped() {
        assert_eq!(
            tokens(" \t{\n c\r\n}"),
            vec![Token::StructStart, Token::Uint8, Token::StructEnd]
        );
        assert!(tokens("  \n ").is_empty());
    }

    #[test]
    fn test_offsets() {
        let lexemes = Lexer::new("c  [s]").tokenize().unwrap();
        let offsets: Vec<usize> = lexemes.iter().map(|l| l.offset).collect();
        assert_eq!(offsets, vec![0, 3, 4, 5]);
    }

    #[test]
    fn test_invalid_character() {
        let err = Lexer::new("c z").tokenize().unwrap_err();
        assert_eq!(err, CompileError::InvalidCharacter { byte: b'z', offset: 2 });
    }

    #[test]
    fn test_truncated_byte_literal() {
        assert_eq!(
            Lexer::new("x1").tokenize().unwrap_err(),
            CompileError::InvalidByteLiteral { offset: 0 }
        );
        assert_eq!(
            Lexer::new("c xg0").tokenize().unwrap_err(),
            CompileError::InvalidByteLiteral { offset: 2 }
        );
    }

    #[test]
    fn test_number_overflow() {
        let err = Lexer::new("[99999999999999999999999]c").tokenize().unwrap_err();
        assert_eq!(err, CompileError::InvalidArrayLength { offset: 1 });
    }

    #[test]
    fn test_display_matches_source() {
        let rendered: String = tokens("{[4]x0a<q>v}")
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(rendered, "{[4]x0a<q>v}");
    }
}
