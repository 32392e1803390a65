//! Encoder - writes values against an Op tree

use super::value::{Encode, Formatter};
use super::{CodecError, Result};
use crate::pattern::{arity, ArrayOp, Compiler, Format, Length, Op, Width};
use std::io::Write;

/// Serializes values into a byte sink.
///
/// Custom marshal code receives the encoder and writes itself through it,
/// usually with [`Encoder::encode`] and a sub-pattern.
pub struct Encoder<'a> {
    sink: &'a mut dyn Write,
    compiler: &'a Compiler,
    depth: usize,
}

impl<'a> Encoder<'a> {
    /// Encoder backed by the process-wide compiler
    pub fn new(sink: &'a mut dyn Write) -> Self {
        Self::with_compiler(sink, Compiler::global())
    }

    pub fn with_compiler(sink: &'a mut dyn Write, compiler: &'a Compiler) -> Self {
        Self {
            sink,
            compiler,
            depth: 0,
        }
    }

    pub fn compiler(&self) -> &'a Compiler {
        self.compiler
    }

    /// Compile `pattern` (cached) and encode `values` with it.
    pub fn encode(&mut self, pattern: &str, values: &[&dyn Encode]) -> Result<()> {
        let format = self.compiler.get_or_compile(pattern)?;
        self.encode_format(&format, values)
    }

    pub fn encode_format(&mut self, format: &Format, values: &[&dyn Encode]) -> Result<()> {
        self.encode_fields(format.ops(), values)
    }

    /// Encode a struct body: `values` are consumed in order by `ops`.
    ///
    /// Fails before writing anything if the counts differ.
    pub fn encode_fields(&mut self, ops: &[Op], values: &[&dyn Encode]) -> Result<()> {
        let expected = arity(ops);
        if expected != values.len() {
            return Err(CodecError::DataLengthMismatch {
                expected,
                actual: values.len(),
            });
        }

        let mut fifo = values.iter().copied();
        for op in ops {
            self.encode_op(op, &mut fifo)?;
        }
        Ok(())
    }

    /// Encode a single value bound to `op`.
    pub fn encode_value<V: Encode + ?Sized>(&mut self, op: &Op, value: &V) -> Result<()> {
        match op {
            Op::Byte(b) => self.write_bytes(&[*b]),
            Op::Const(ops) => {
                let expected = arity(ops);
                if expected > 1 {
                    return Err(CodecError::DataLengthMismatch {
                        expected,
                        actual: 1,
                    });
                }
                self.encode_const(ops, &mut std::iter::once(value))
            }
            Op::Interface => self.descend(|enc| value.encode_dynamic(enc)),
            _ => self.descend(|enc| value.encode(op, enc)),
        }
    }

    /// Encode `value` through its self-describing pattern.
    ///
    /// The pattern must consume exactly one value: `value` itself.
    pub fn encode_formatted<V: Formatter + Encode>(&mut self, value: &V) -> Result<()> {
        let format = self.compiler.get_or_compile(value.pattern())?;
        self.encode_format(&format, &[value])
    }

    /// Write the length of an array: checked against a fixed length, or
    /// written with the prefix width.
    pub fn write_length(&mut self, array: &ArrayOp, len: usize) -> Result<()> {
        match array.length {
            Length::Fixed(expected) if expected == len => Ok(()),
            Length::Fixed(expected) => Err(CodecError::DataLengthMismatch {
                expected,
                actual: len,
            }),
            Length::Prefixed(width) => {
                let len = u64::try_from(len).map_err(|_| CodecError::CannotConvert {
                    from: "usize",
                    to: width.type_name(),
                })?;
                self.write_uint(width, len, "usize")
            }
        }
    }

    /// Encode every item with the array's element op, after its length.
    pub fn encode_elements<T: Encode>(&mut self, items: &[T], array: &ArrayOp) -> Result<()> {
        self.write_length(array, items.len())?;
        items
            .iter()
            .try_for_each(|item| self.encode_value(&array.element, item))
    }

    /// Write `value` big-endian in `width` bytes; `from` names the source
    /// type in the error when it does not fit.
    pub fn write_uint(&mut self, width: Width, value: u64, from: &'static str) -> Result<()> {
        if value > width.max() {
            return Err(CodecError::CannotConvert {
                from,
                to: width.type_name(),
            });
        }

        let bytes = value.to_be_bytes();
        self.write_bytes(&bytes[bytes.len() - width.bytes()..])
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        Ok(())
    }

    /// Encode one op of a sequence, pulling as many values as it consumes.
    pub(crate) fn encode_op<'v, V, I>(&mut self, op: &Op, fifo: &mut I) -> Result<()>
    where
        V: Encode + ?Sized + 'v,
        I: Iterator<Item = &'v V>,
    {
        match op {
            Op::Byte(b) => self.write_bytes(&[*b]),
            Op::Const(ops) => self.encode_const(ops, fifo),
            _ => {
                let value = fifo.next().ok_or(CodecError::DataLengthMismatch {
                    expected: op.arity(),
                    actual: 0,
                })?;
                self.encode_value(op, value)
            }
        }
    }

    /// Const blocks encode like a plain sequence, through a scratch buffer.
    fn encode_const<'v, V, I>(&mut self, ops: &[Op], fifo: &mut I) -> Result<()>
    where
        V: Encode + ?Sized + 'v,
        I: Iterator<Item = &'v V>,
    {
        let mut buf = Vec::new();
        let mut scratch = self.scratch(&mut buf);
        for op in ops {
            scratch.encode_op(op, fifo)?;
        }
        self.write_bytes(&buf)
    }

    /// An encoder over `sink` sharing this encoder's compiler and depth.
    pub(crate) fn scratch<'b>(&self, sink: &'b mut dyn Write) -> Encoder<'b>
    where
        'a: 'b,
    {
        Encoder {
            sink,
            compiler: self.compiler,
            depth: self.depth,
        }
    }

    pub(crate) fn at_depth(sink: &'a mut dyn Write, compiler: &'a Compiler, depth: usize) -> Self {
        Self {
            sink,
            compiler,
            depth,
        }
    }

    fn descend<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let max_depth = self.compiler.limits().max_depth;
        if self.depth >= max_depth {
            return Err(CodecError::DepthLimitExceeded(max_depth));
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;

    fn encode(pattern: &str, values: &[&dyn Encode]) -> Result<Vec<u8>> {
        crate::to_vec(pattern, values)
    }

    #[test]
    fn test_struct_with_string_and_u64() {
        let bytes = encode("{[c]c q}", &[&("hi", 42u64)]).unwrap();
        assert_eq!(bytes, [0x02, b'h', b'i', 0, 0, 0, 0, 0, 0, 0, 0x2a]);
    }

    #[test]
    fn test_big_endian_widths() {
        let bytes = encode("c s l q", &[&1u8, &0x0203u16, &0x04050607u32, &8u64]).unwrap();
        assert_eq!(
            bytes,
            [1, 2, 3, 4, 5, 6, 7, 0, 0, 0, 0, 0, 0, 0, 8]
        );
    }

    #[test]
    fn test_integer_conversion() {
        assert_eq!(encode("c", &[&200u64]).unwrap(), [200]);
        assert_eq!(encode("s", &[&7i32]).unwrap(), [0, 7]);

        let err = encode("c", &[&300u16]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::CannotConvert { from: "u16", to: "u8" }
        ));

        let err = encode("l", &[&-1i64]).unwrap_err();
        assert!(matches!(err, CodecError::CannotConvert { from: "i64", .. }));
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(encode("c c", &[&true, &false]).unwrap(), [1, 0]);
        assert_eq!(encode("s", &[&true]).unwrap(), [0, 1]);
    }

    #[test]
    fn test_value_count_mismatch_writes_nothing() {
        let mut buf = Vec::new();
        let err = crate::encode(&mut buf, "c c", &[&1u8]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::DataLengthMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_literals_consume_no_values() {
        let bytes = encode("xca c xfe", &[&7u8]).unwrap();
        assert_eq!(bytes, [0xca, 7, 0xfe]);
    }

    #[test]
    fn test_const_block_encodes_like_sequence() {
        let plain = encode("x01 c s", &[&2u8, &3u16]).unwrap();
        let constant = encode("<x01 c s>", &[&2u8, &3u16]).unwrap();
        assert_eq!(plain, constant);
    }

    #[test]
    fn test_fixed_array_length_enforced() {
        assert_eq!(encode("[3]c", &[&[1u8, 2, 3]]).unwrap(), [1, 2, 3]);
        let err = encode("[3]c", &[&[1u8, 2, 3, 4]]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::DataLengthMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_prefix_overflow() {
        let long = "a".repeat(256);
        let err = encode("[c]c", &[&long]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::CannotConvert {
                from: "usize",
                to: "u8"
            }
        ));
    }

    #[test]
    fn test_string_and_bytes_fast_path_match() {
        let text = encode("[s]c", &[&"hello"]).unwrap();
        let bytes = encode("[s]c", &[&b"hello".to_vec()]).unwrap();
        assert_eq!(text, bytes);
        assert_eq!(&text[..2], &[0, 5]);
    }

    #[test]
    fn test_wide_elements_from_bytes() {
        let bytes = encode("[c]s", &[&vec![1u8, 2]]).unwrap();
        assert_eq!(bytes, [2, 0, 1, 0, 2]);
    }

    #[test]
    fn test_scalar_is_not_a_struct() {
        let err = encode("{c}", &[&1u8]).unwrap_err();
        assert!(matches!(err, CodecError::NotAStruct { ty: "u8" }));
    }

    #[test]
    fn test_missing_capability() {
        let err = encode("v", &[&5u32]).unwrap_err();
        assert!(matches!(err, CodecError::MissingCapability { ty: "u32" }));
    }

    #[test]
    fn test_depth_limit() {
        let compiler = Compiler::new(Limits {
            max_depth: 2,
            ..Limits::default()
        });
        // compiled with default limits, walked with the tighter ones
        let format = Compiler::default().compile("[c][c][c]s").unwrap();
        let nested = vec![vec![vec![1u8]]];

        let mut buf = Vec::new();
        let mut enc = Encoder::with_compiler(&mut buf, &compiler);
        let err = enc.encode_format(&format, &[&nested]).unwrap_err();
        assert!(matches!(err, CodecError::DepthLimitExceeded(2)));
    }
}
