//! Decoder - reads values against an Op tree

use super::encoder::Encoder;
use super::value::{Decode, Formatter};
use super::{CodecError, Result};
use crate::pattern::{arity, ArrayOp, Compiler, Format, Length, Op, Width};
use log::trace;
use std::io::{ErrorKind, Read};

/// Initial allocation for reads sized by an untrusted length prefix
const READ_CHUNK: usize = 4096;

/// Deserializes values from a byte source.
///
/// Custom unmarshal code receives the decoder and reads itself through it,
/// usually with [`Decoder::decode`] and a sub-pattern.
pub struct Decoder<'a> {
    source: &'a mut dyn Read,
    compiler: &'a Compiler,
    depth: usize,
}

impl<'a> Decoder<'a> {
    /// Decoder backed by the process-wide compiler
    pub fn new(source: &'a mut dyn Read) -> Self {
        Self::with_compiler(source, Compiler::global())
    }

    pub fn with_compiler(source: &'a mut dyn Read, compiler: &'a Compiler) -> Self {
        Self {
            source,
            compiler,
            depth: 0,
        }
    }

    pub fn compiler(&self) -> &'a Compiler {
        self.compiler
    }

    /// Compile `pattern` (cached) and decode into `slots` with it.
    pub fn decode(&mut self, pattern: &str, slots: &mut [&mut dyn Decode]) -> Result<()> {
        let format = self.compiler.get_or_compile(pattern)?;
        self.decode_format(&format, slots)
    }

    pub fn decode_format(&mut self, format: &Format, slots: &mut [&mut dyn Decode]) -> Result<()> {
        self.decode_fields(format.ops(), slots)
    }

    /// Decode a struct body: `slots` are filled in order by `ops`.
    ///
    /// Fails before reading anything if the counts differ.
    pub fn decode_fields(&mut self, ops: &[Op], slots: &mut [&mut dyn Decode]) -> Result<()> {
        let expected = arity(ops);
        if expected != slots.len() {
            return Err(CodecError::DataLengthMismatch {
                expected,
                actual: slots.len(),
            });
        }

        let mut next = 0;
        for op in ops {
            match op {
                Op::Byte(b) => self.expect_byte(*b)?,
                Op::Const(sub) => {
                    let count = arity(sub);
                    let bound = &slots[next..next + count];
                    self.expect_const(sub, &mut bound.iter().map(|slot| &**slot))?;
                    next += count;
                }
                _ => {
                    self.decode_value(op, &mut *slots[next])?;
                    next += 1;
                }
            }
        }
        Ok(())
    }

    /// Decode a single slot bound to `op`.
    pub fn decode_value<V: Decode + ?Sized>(&mut self, op: &Op, slot: &mut V) -> Result<()> {
        match op {
            Op::Byte(b) => self.expect_byte(*b),
            Op::Const(ops) => {
                let expected = arity(ops);
                if expected > 1 {
                    return Err(CodecError::DataLengthMismatch {
                        expected,
                        actual: 1,
                    });
                }
                self.expect_const(ops, &mut std::iter::once(&*slot))
            }
            Op::Interface => self.descend(|dec| slot.decode_dynamic(dec)),
            _ => self.descend(|dec| slot.decode(op, dec)),
        }
    }

    /// Decode `slot` through its self-describing pattern.
    pub fn decode_formatted<V: Formatter + Decode>(&mut self, slot: &mut V) -> Result<()> {
        let format = self.compiler.get_or_compile(slot.pattern())?;
        self.decode_format(&format, &mut [slot])
    }

    /// Element count of an array: fixed, or read from the prefix and
    /// checked against the length limit.
    pub fn read_length(&mut self, array: &ArrayOp) -> Result<usize> {
        match array.length {
            Length::Fixed(len) => Ok(len),
            Length::Prefixed(width) => {
                let len = self.read_uint(width)?;
                let limit = self.compiler.limits().max_length;
                match usize::try_from(len) {
                    Ok(len) if len <= limit => Ok(len),
                    _ => Err(CodecError::LengthLimitExceeded { length: len, limit }),
                }
            }
        }
    }

    /// Resize `items` to the array length and decode every element.
    ///
    /// Existing items are decoded in place. New ones are pushed only after
    /// they decode, so capacity tracks the data actually read rather than the
    /// length prefix.
    pub fn decode_vec<T: Decode + Default>(&mut self, items: &mut Vec<T>, array: &ArrayOp) -> Result<()> {
        let len = self.read_length(array)?;
        items.truncate(len);
        self.decode_items(items, &array.element)?;

        items.reserve((len - items.len()).min(READ_CHUNK));
        while items.len() < len {
            let mut item = T::default();
            self.decode_value(&array.element, &mut item)?;
            items.push(item);
        }
        Ok(())
    }

    /// Decode into a fixed-size target whose length must match the array.
    pub fn decode_slice<T: Decode>(&mut self, items: &mut [T], array: &ArrayOp) -> Result<()> {
        let len = self.read_length(array)?;
        if len != items.len() {
            return Err(CodecError::DataLengthMismatch {
                expected: len,
                actual: items.len(),
            });
        }
        self.decode_items(items, &array.element)
    }

    pub fn decode_items<T: Decode>(&mut self, items: &mut [T], element: &Op) -> Result<()> {
        items
            .iter_mut()
            .try_for_each(|item| self.decode_value(element, item))
    }

    /// Read a length-prefixed byte string in one call.
    pub fn read_string(&mut self, array: &ArrayOp) -> Result<String> {
        if !array.element.is_byte() {
            return Err(CodecError::CannotDecodeString);
        }
        let len = self.read_length(array)?;
        Ok(String::from_utf8(self.read_bytes(len)?)?)
    }

    pub fn read_uint(&mut self, width: Width) -> Result<u64> {
        let mut bytes = [0u8; 8];
        self.read_exact(&mut bytes[8 - width.bytes()..])?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Read exactly `len` bytes, growing the buffer as data arrives.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(READ_CHUNK));
        let read = Read::take(&mut *self.source, len as u64).read_to_end(&mut buf)?;
        if read < len {
            return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into());
        }
        Ok(buf)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.source.read_exact(buf)?;
        Ok(())
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        let mut actual = [0u8];
        self.read_exact(&mut actual)?;
        if actual[0] != expected {
            return Err(CodecError::ByteLiteralMismatch {
                expected,
                actual: actual[0],
            });
        }
        Ok(())
    }

    /// Encode `ops` against the bound slots' current values and require the
    /// next bytes of the source to match. Slots are left untouched.
    fn expect_const<'v, V, I>(&mut self, ops: &[Op], slots: &mut I) -> Result<()>
    where
        V: Decode + ?Sized + 'v,
        I: Iterator<Item = &'v V>,
    {
        let mut expected = Vec::new();
        let mut scratch = Encoder::at_depth(&mut expected, self.compiler, self.depth);
        for op in ops {
            scratch.encode_op(op, slots)?;
        }

        let mut actual = vec![0u8; expected.len()];
        self.read_exact(&mut actual)?;
        if actual != expected {
            trace!("const block mismatch: {} != {}", hex::encode(&actual), hex::encode(&expected));
            return Err(CodecError::UnexpectedData { expected, actual });
        }
        Ok(())
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

    #[test]
    fn test_struct_with_string_and_u64() {
        let bytes = [0x02, b'h', b'i', 0, 0, 0, 0, 0, 0, 0, 0x2a];
        let mut value = (String::new(), 0u64);
        crate::decode(&bytes[..], "{[c]c q}", &mut [&mut value]).unwrap();
        assert_eq!(value, ("hi".to_string(), 42));
    }

    #[test]
    fn test_bool_from_byte() {
        let mut a = true;
        let mut b = false;
        crate::decode(&[0x00, 0x7f][..], "c c", &mut [&mut a, &mut b]).unwrap();
        assert!(!a);
        assert!(b);
    }

    #[test]
    fn test_narrow_target_overflow() {
        let mut small = 0u8;
        let err = crate::decode(&[0x01, 0x00][..], "s", &mut [&mut small]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::CannotConvert { from: "u16", to: "u8" }
        ));

        let mut wide = 0u64;
        crate::decode(&[0x01, 0x00][..], "s", &mut [&mut wide]).unwrap();
        assert_eq!(wide, 256);
    }

    #[test]
    fn test_fixed_array_exactness() {
        let mut three = [0u8; 3];
        crate::decode(&[1, 2, 3][..], "[3]c", &mut [&mut three]).unwrap();
        assert_eq!(three, [1, 2, 3]);

        let mut four = [0u8; 4];
        let err = crate::decode(&[1, 2, 3, 4][..], "[3]c", &mut [&mut four]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::DataLengthMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_vec_is_resized_to_prefix() {
        let mut items = vec![9u16; 5];
        crate::decode(&[2, 0, 1, 0, 2][..], "[c]s", &mut [&mut items]).unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn test_string_requires_byte_elements() {
        let mut text = String::new();
        let err = crate::decode(&[1, 0, 0x41][..], "[c]s", &mut [&mut text]).unwrap_err();
        assert!(matches!(err, CodecError::CannotDecodeString));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut text = String::new();
        let err = crate::decode(&[2, 0xff, 0xfe][..], "[c]c", &mut [&mut text]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8(_)));
    }

    #[test]
    fn test_truncated_input() {
        let mut text = String::new();
        let err = crate::decode(&[5, b'a', b'b'][..], "[c]c", &mut [&mut text]).unwrap_err();
        assert!(err.is_io());

        let mut n = 0u32;
        let err = crate::decode(&[0, 1][..], "l", &mut [&mut n]).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_length_limit() {
        let compiler = Compiler::new(Limits {
            max_length: 4,
            ..Limits::default()
        });
        let input = [0, 0, 0, 5, 1, 2, 3, 4, 5];
        let mut items: Vec<u8> = Vec::new();
        let mut source = &input[..];
        let mut dec = Decoder::with_compiler(&mut source, &compiler);
        let err = dec.decode("[l]c", &mut [&mut items]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthLimitExceeded { length: 5, limit: 4 }
        ));
    }

    #[test]
    fn test_huge_prefix_does_not_preallocate() {
        let input = [0x00, 0xff, 0xff, 0xff, b'a'];
        let mut text = String::new();
        let err = crate::decode(&input[..], "[l]c", &mut [&mut text]).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_huge_prefix_does_not_preallocate_elements() {
        let input = [0x00, 0xff, 0xff, 0xff];
        let mut items: Vec<(u64, u64, u64)> = Vec::new();
        let err = crate::decode(&input[..], "[l]{q q q}", &mut [&mut items]).unwrap_err();
        assert!(err.is_io());
        assert!(items.is_empty());
        assert!(items.capacity() <= READ_CHUNK);
    }

    #[test]
    fn test_vec_grows_past_existing_items() {
        let mut items = vec![7u16];
        crate::decode(&[3, 0, 1, 0, 2, 0, 3][..], "[c]s", &mut [&mut items]).unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn test_byte_literal_mismatch() {
        let mut n = 0u8;
        crate::decode(&[0xab, 7][..], "xab c", &mut [&mut n]).unwrap();
        assert_eq!(n, 7);

        let err = crate::decode(&[0xac, 7][..], "xab c", &mut [&mut n]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ByteLiteralMismatch {
                expected: 0xab,
                actual: 0xac
            }
        ));
    }

    #[test]
    fn test_const_literal_enforcement() {
        crate::decode(&[0x01, 0x02][..], "<x01x02>", &mut []).unwrap();

        let err = crate::decode(&[0x01, 0x03][..], "<x01x02>", &mut []).unwrap_err();
        match err {
            CodecError::UnexpectedData { expected, actual } => {
                assert_eq!(expected, vec![0x01, 0x02]);
                assert_eq!(actual, vec![0x01, 0x03]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_const_uses_slot_values() {
        let mut version = 3u16;
        let mut payload = String::new();
        let input = [0xee, 0x00, 0x03, 0x02, b'o', b'k'];
        crate::decode(&input[..], "<xee s> [c]c", &mut [&mut version, &mut payload]).unwrap();
        assert_eq!(version, 3);
        assert_eq!(payload, "ok");

        let mut version = 4u16;
        let err = crate::decode(&input[..], "<xee s> [c]c", &mut [&mut version, &mut payload])
            .unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedData { .. }));
    }

    #[test]
    fn test_slot_count_mismatch_reads_nothing() {
        let input = [1u8, 2];
        let mut source = &input[..];
        let mut a = 0u8;
        let err = crate::decode(&mut source, "c c", &mut [&mut a]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::DataLengthMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(source.len(), 2);
    }
}
