//! Codec runtime
//!
//! Walks a compiled [`Format`] in lockstep with an ordered list of values,
//! writing to a `std::io::Write` sink or reading from a `std::io::Read`
//! source. Values bind to ops through the [`Encode`] and [`Decode`] traits.
//!
//! A failed call leaves the stream partially written or read. Callers must
//! treat any error as fatal to the stream's framing.

pub mod decoder;
pub mod dynamic;
pub mod encoder;
pub mod value;
pub mod wire;

pub use decoder::Decoder;
pub use dynamic::Value;
pub use encoder::Encoder;
pub use value::{Decode, Encode, Formatter};
pub use wire::{RemoteError, Time, WireError};

use crate::pattern::{CompileError, Format, Op};
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Pattern error: {0}")]
    Compile(#[from] CompileError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data length mismatch: expected {expected}, got {actual}")]
    DataLengthMismatch { expected: usize, actual: usize },

    #[error("{ty} is not a struct")]
    NotAStruct { ty: &'static str },

    #[error("cannot decode string: array element must be c")]
    CannotDecodeString,

    #[error("cannot convert {from} to {to}")]
    CannotConvert {
        from: &'static str,
        to: &'static str,
    },

    #[error("{ty} has no marshal, formatter or error capability")]
    MissingCapability { ty: &'static str },

    #[error("cannot encode an empty {ty}")]
    NilValue { ty: &'static str },

    #[error("unexpected data: expected {}, got {}", hex::encode(.expected), hex::encode(.actual))]
    UnexpectedData { expected: Vec<u8>, actual: Vec<u8> },

    #[error("byte literal mismatch: expected 0x{expected:02x}, got 0x{actual:02x}")]
    ByteLiteralMismatch { expected: u8, actual: u8 },

    #[error("invalid UTF-8 string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("value nesting exceeds depth limit of {0}")]
    DepthLimitExceeded(usize),

    #[error("length {length} exceeds limit of {limit}")]
    LengthLimitExceeded { length: u64, limit: usize },

    #[error("{0} trailing bytes after payload")]
    TrailingData(usize),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

impl CodecError {
    /// Error for custom marshal code
    pub fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CodecError::Custom(msg.to_string())
    }

    /// True when the underlying transport failed (including early EOF)
    pub fn is_io(&self) -> bool {
        matches!(self, CodecError::Io(_))
    }

    /// Error for a value of type `ty` bound to an op it cannot represent.
    #[doc(hidden)]
    pub fn mismatch(op: &Op, ty: &'static str) -> Self {
        match op {
            Op::Struct(_) => CodecError::NotAStruct { ty },
            Op::Interface => CodecError::MissingCapability { ty },
            _ => CodecError::CannotConvert {
                from: ty,
                to: op.kind(),
            },
        }
    }
}

impl Format {
    /// Encode `values` into `sink`, one value per value-consuming op.
    pub fn encode<W: Write>(&self, mut sink: W, values: &[&dyn Encode]) -> Result<()> {
        Encoder::new(&mut sink).encode_format(self, values)
    }

    /// Decode from `source` into `slots`, one slot per value-consuming op.
    pub fn decode<R: Read>(&self, mut source: R, slots: &mut [&mut dyn Decode]) -> Result<()> {
        Decoder::new(&mut source).decode_format(self, slots)
    }

    /// Encode into a fresh buffer
    pub fn to_vec(&self, values: &[&dyn Encode]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf, values)?;
        Ok(buf)
    }
}

/// Compile `pattern` (cached) and encode `values` into `sink`.
///
/// ```
/// let mut buf = Vec::new();
/// cslq::encode(&mut buf, "[c]c s", &[&"hi", &7u16]).unwrap();
/// assert_eq!(buf, [2, b'h', b'i', 0, 7]);
/// ```
pub fn encode<W: Write>(mut sink: W, pattern: &str, values: &[&dyn Encode]) -> Result<()> {
    Encoder::new(&mut sink).encode(pattern, values)
}

/// Compile `pattern` (cached) and decode from `source` into `slots`.
///
/// ```
/// let mut name = String::new();
/// let mut port = 0u16;
/// cslq::decode(&[2, b'h', b'i', 0, 7][..], "[c]c s", &mut [&mut name, &mut port]).unwrap();
/// assert_eq!((name.as_str(), port), ("hi", 7));
/// ```
pub fn decode<R: Read>(mut source: R, pattern: &str, slots: &mut [&mut dyn Decode]) -> Result<()> {
    Decoder::new(&mut source).decode(pattern, slots)
}

/// Compile `pattern` (cached) and encode `values` into a new buffer.
pub fn to_vec(pattern: &str, values: &[&dyn Encode]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode(&mut buf, pattern, values)?;
    Ok(buf)
}
