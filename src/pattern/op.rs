//! Compiled Op tree
//!
//! Data structures representing a compiled pattern. Everything here is
//! immutable once built and shared freely between threads.

use std::fmt;
use std::sync::Arc;

/// Byte width of a fixed-size unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    U8,
    U16,
    U32,
    U64,
}

impl Width {
    /// Number of bytes on the wire
    pub const fn bytes(self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U16 => 2,
            Width::U32 => 4,
            Width::U64 => 8,
        }
    }

    /// Largest value representable in this width
    pub const fn max(self) -> u64 {
        match self {
            Width::U8 => u8::MAX as u64,
            Width::U16 => u16::MAX as u64,
            Width::U32 => u32::MAX as u64,
            Width::U64 => u64::MAX,
        }
    }

    pub const fn type_name(self) -> &'static str {
        match self {
            Width::U8 => "u8",
            Width::U16 => "u16",
            Width::U32 => "u32",
            Width::U64 => "u64",
        }
    }

    const fn symbol(self) -> char {
        match self {
            Width::U8 => 'c',
            Width::U16 => 's',
            Width::U32 => 'l',
            Width::U64 => 'q',
        }
    }
}

/// How an array learns its element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Length {
    /// Known from the pattern, nothing is written
    Fixed(usize),
    /// Written/read as an unsigned integer right before the elements
    Prefixed(Width),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayOp {
    pub length: Length,
    pub element: Box<Op>,
}

/// One node of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    /// Fixed-width big-endian unsigned integer
    Uint(Width),
    /// Literal byte: emitted on encode, checked on decode, binds no value
    Byte(u8),
    /// Bytes computed from sub-ops that must match verbatim on decode
    Const(Vec<Op>),
    /// Homogeneous sequence
    Array(ArrayOp),
    /// Sub-ops bound positionally to a composite's fields
    Struct(Vec<Op>),
    /// Value resolved at runtime by capability
    Interface,
}

impl Op {
    /// Number of value slots this op consumes.
    pub fn arity(&self) -> usize {
        match self {
            Op::Byte(_) => 0,
            Op::Const(ops) => arity(ops),
            _ => 1,
        }
    }

    /// True for `c`, the op that enables byte-buffer fast paths
    pub fn is_byte(&self) -> bool {
        matches!(self, Op::Uint(Width::U8))
    }

    /// Short human-readable name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Uint(width) => width.type_name(),
            Op::Byte(_) => "byte literal",
            Op::Const(_) => "const block",
            Op::Array(_) => "array",
            Op::Struct(_) => "struct",
            Op::Interface => "interface",
        }
    }
}

/// Total number of value slots consumed by a sequence of ops.
pub fn arity(ops: &[Op]) -> usize {
    ops.iter().map(Op::arity).sum()
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Uint(width) => write!(f, "{}", width.symbol()),
            Op::Byte(b) => write!(f, "x{:02x}", b),
            Op::Const(ops) => {
                f.write_str("<")?;
                write_ops(f, ops)?;
                f.write_str(">")
            }
            Op::Array(array) => {
                match array.length {
                    Length::Fixed(n) => write!(f, "[{}]", n)?,
                    Length::Prefixed(width) => write!(f, "[{}]", width.symbol())?,
                }
                write!(f, "{}", array.element)
            }
            Op::Struct(ops) => {
                f.write_str("{")?;
                write_ops(f, ops)?;
                f.write_str("}")
            }
            Op::Interface => f.write_str("v"),
        }
    }
}

fn write_ops(f: &mut fmt::Formatter<'_>, ops: &[Op]) -> fmt::Result {
    ops.iter().try_for_each(|op| write!(f, "{}", op))
}

/// A compiled pattern: the top-level op sequence.
///
/// Cloning is cheap; the ops are shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Format {
    ops: Arc<[Op]>,
}

impl Format {
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops: ops.into() }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of values `encode`/`decode` expect.
    pub fn arity(&self) -> usize {
        arity(&self.ops)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ops(f, &self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_skips_literals() {
        let ops = vec![
            Op::Byte(0x01),
            Op::Uint(Width::U8),
            Op::Const(vec![Op::Byte(0x02), Op::Uint(Width::U16), Op::Interface]),
            Op::Struct(vec![Op::Uint(Width::U8), Op::Uint(Width::U8)]),
        ];
        assert_eq!(arity(&ops), 4);
        assert_eq!(Format::new(ops).arity(), 4);
    }

    #[test]
    fn test_width_limits() {
        assert_eq!(Width::U8.max(), 255);
        assert_eq!(Width::U16.max(), 65535);
        assert_eq!(Width::U32.bytes(), 4);
        assert_eq!(Width::U64.max(), u64::MAX);
    }

    #[test]
    fn test_display_renders_canonical_pattern() {
        let format = Format::new(vec![
            Op::Struct(vec![
                Op::Array(ArrayOp {
                    length: Length::Prefixed(Width::U8),
                    element: Box::new(Op::Uint(Width::U8)),
                }),
                Op::Uint(Width::U64),
            ]),
            Op::Const(vec![Op::Byte(0xca), Op::Byte(0xfe)]),
            Op::Array(ArrayOp {
                length: Length::Fixed(3),
                element: Box::new(Op::Interface),
            }),
        ]);
        assert_eq!(format.to_string(), "{[c]cq}<xcaxfe>[3]v");
    }
}
