//! Value binding
//!
//! [`Encode`] and [`Decode`] bind a Rust value to an op. Implementations are
//! provided for integers, `bool`, strings, byte buffers, sequences, tuples
//! (as structs), `Option`, `Box` and `&mut` references. Slices decode only
//! into exactly as many elements as they hold. User structs describe their field order
//! with [`composite!`](crate::composite).
//!
//! # Dynamic values
//!
//! A `v` op calls [`Encode::encode_dynamic`] / [`Decode::decode_dynamic`].
//! In priority order a type can:
//!
//! 1. override both methods and marshal itself through the encoder/decoder,
//! 2. implement [`Formatter`] and delegate to
//!    [`Encoder::encode_formatted`] / [`Decoder::decode_formatted`],
//! 3. be a [`WireError`](super::WireError), encoded as a `[q]c` string.
//!
//! Anything else fails with `MissingCapability`.

use super::{CodecError, Decoder, Encoder, Result};
use crate::pattern::{ArrayOp, Op};
use bytes::Bytes;
use std::any::type_name;

/// A value that can be written against an op.
///
/// Integers are range-checked against the op width: a value that does not
/// fit fails with `CannotConvert`. Nothing is truncated to its low bits, so
/// `300u16` through `c` is an error rather than `44`.
pub trait Encode {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()>;

    /// Encoding used for `v`.
    fn encode_dynamic(&self, _enc: &mut Encoder<'_>) -> Result<()> {
        Err(CodecError::MissingCapability {
            ty: type_name::<Self>(),
        })
    }

    /// Encode a slice of `Self` against an array op. Byte-sized types
    /// override this to write the whole buffer at once.
    #[doc(hidden)]
    fn encode_array(items: &[Self], array: &ArrayOp, enc: &mut Encoder<'_>) -> Result<()>
    where
        Self: Sized,
    {
        enc.encode_elements(items, array)
    }
}

/// A slot that can be filled from an op.
///
/// Every decodable value is also encodable: const blocks re-encode the slot's
/// current value to know which bytes to expect.
pub trait Decode: Encode {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()>;

    /// Decoding used for `v`.
    fn decode_dynamic(&mut self, _dec: &mut Decoder<'_>) -> Result<()> {
        Err(CodecError::MissingCapability {
            ty: type_name::<Self>(),
        })
    }

    #[doc(hidden)]
    fn decode_vec(items: &mut Vec<Self>, array: &ArrayOp, dec: &mut Decoder<'_>) -> Result<()>
    where
        Self: Sized + Default,
    {
        dec.decode_vec(items, array)
    }

    #[doc(hidden)]
    fn decode_slice(items: &mut [Self], array: &ArrayOp, dec: &mut Decoder<'_>) -> Result<()>
    where
        Self: Sized,
    {
        dec.decode_slice(items, array)
    }
}

/// A value that describes its own layout.
///
/// Composite values return their pattern wrapped in `{}` so that the whole
/// pattern consumes exactly one value: the value itself.
pub trait Formatter {
    fn pattern(&self) -> &str;
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {$(
        impl Encode for $ty {
            fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
                match op {
                    Op::Uint(width) => {
                        let value = u64::try_from(*self).map_err(|_| CodecError::CannotConvert {
                            from: stringify!($ty),
                            to: width.type_name(),
                        })?;
                        enc.write_uint(*width, value, stringify!($ty))
                    }
                    _ => Err(CodecError::mismatch(op, stringify!($ty))),
                }
            }
        }

        impl Decode for $ty {
            fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
                match op {
                    Op::Uint(width) => {
                        let raw = dec.read_uint(*width)?;
                        *self = <$ty>::try_from(raw).map_err(|_| CodecError::CannotConvert {
                            from: width.type_name(),
                            to: stringify!($ty),
                        })?;
                        Ok(())
                    }
                    _ => Err(CodecError::mismatch(op, stringify!($ty))),
                }
            }
        }
    )*};
}

impl_integer!(u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl Encode for u8 {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        match op {
            Op::Uint(width) => enc.write_uint(*width, u64::from(*self), "u8"),
            _ => Err(CodecError::mismatch(op, "u8")),
        }
    }

    fn encode_array(items: &[u8], array: &ArrayOp, enc: &mut Encoder<'_>) -> Result<()> {
        if !array.element.is_byte() {
            return enc.encode_elements(items, array);
        }
        enc.write_length(array, items.len())?;
        enc.write_bytes(items)
    }
}

impl Decode for u8 {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        match op {
            Op::Uint(width) => {
                let raw = dec.read_uint(*width)?;
                *self = u8::try_from(raw).map_err(|_| CodecError::CannotConvert {
                    from: width.type_name(),
                    to: "u8",
                })?;
                Ok(())
            }
            _ => Err(CodecError::mismatch(op, "u8")),
        }
    }

    fn decode_vec(items: &mut Vec<u8>, array: &ArrayOp, dec: &mut Decoder<'_>) -> Result<()> {
        if !array.element.is_byte() {
            return dec.decode_vec(items, array);
        }
        let len = dec.read_length(array)?;
        *items = dec.read_bytes(len)?;
        Ok(())
    }

    fn decode_slice(items: &mut [u8], array: &ArrayOp, dec: &mut Decoder<'_>) -> Result<()> {
        if !array.element.is_byte() {
            return dec.decode_slice(items, array);
        }
        let len = dec.read_length(array)?;
        if len != items.len() {
            return Err(CodecError::DataLengthMismatch {
                expected: len,
                actual: items.len(),
            });
        }
        dec.read_exact(items)
    }
}

impl Encode for bool {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        match op {
            Op::Uint(width) => enc.write_uint(*width, u64::from(*self), "bool"),
            _ => Err(CodecError::mismatch(op, "bool")),
        }
    }
}

impl Decode for bool {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        match op {
            Op::Uint(width) => {
                *self = dec.read_uint(*width)? != 0;
                Ok(())
            }
            _ => Err(CodecError::mismatch(op, "bool")),
        }
    }
}

impl Encode for str {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        match op {
            Op::Array(array) => u8::encode_array(self.as_bytes(), array, enc),
            _ => Err(CodecError::mismatch(op, "str")),
        }
    }
}

impl Encode for String {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        self.as_str().encode(op, enc)
    }
}

impl Decode for String {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        match op {
            Op::Array(array) => {
                *self = dec.read_string(array)?;
                Ok(())
            }
            _ => Err(CodecError::mismatch(op, "String")),
        }
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        match op {
            Op::Array(array) => T::encode_array(self, array, enc),
            _ => Err(CodecError::mismatch(op, type_name::<Self>())),
        }
    }
}

impl<T: Decode> Decode for [T] {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        match op {
            Op::Array(array) => T::decode_slice(self, array, dec),
            _ => Err(CodecError::mismatch(op, type_name::<Self>())),
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        self.as_slice().encode(op, enc)
    }
}

impl<T: Decode + Default> Decode for Vec<T> {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        match op {
            Op::Array(array) => T::decode_vec(self, array, dec),
            _ => Err(CodecError::mismatch(op, type_name::<Self>())),
        }
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        self.as_slice().encode(op, enc)
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        match op {
            Op::Array(array) => T::decode_slice(self, array, dec),
            _ => Err(CodecError::mismatch(op, type_name::<Self>())),
        }
    }
}

impl Encode for Bytes {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        (**self).encode(op, enc)
    }
}

impl Decode for Bytes {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        let mut buf = Vec::new();
        buf.decode(op, dec)?;
        *self = Bytes::from(buf);
        Ok(())
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        (**self).encode(op, enc)
    }

    fn encode_dynamic(&self, enc: &mut Encoder<'_>) -> Result<()> {
        (**self).encode_dynamic(enc)
    }
}

impl<T: Encode + ?Sized> Encode for &mut T {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        (**self).encode(op, enc)
    }

    fn encode_dynamic(&self, enc: &mut Encoder<'_>) -> Result<()> {
        (**self).encode_dynamic(enc)
    }
}

impl<T: Decode + ?Sized> Decode for &mut T {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        (**self).decode(op, dec)
    }

    fn decode_dynamic(&mut self, dec: &mut Decoder<'_>) -> Result<()> {
        (**self).decode_dynamic(dec)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        (**self).encode(op, enc)
    }

    fn encode_dynamic(&self, enc: &mut Encoder<'_>) -> Result<()> {
        (**self).encode_dynamic(enc)
    }
}

impl<T: Decode + ?Sized> Decode for Box<T> {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        (**self).decode(op, dec)
    }

    fn decode_dynamic(&mut self, dec: &mut Decoder<'_>) -> Result<()> {
        (**self).decode_dynamic(dec)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        match self {
            Some(value) => value.encode(op, enc),
            None => Err(CodecError::NilValue {
                ty: type_name::<Self>(),
            }),
        }
    }

    fn encode_dynamic(&self, enc: &mut Encoder<'_>) -> Result<()> {
        match self {
            Some(value) => value.encode_dynamic(enc),
            None => Err(CodecError::NilValue {
                ty: type_name::<Self>(),
            }),
        }
    }
}

/// Empty options are filled with `T::default()` before decoding.
impl<T: Decode + Default> Decode for Option<T> {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        self.get_or_insert_with(T::default).decode(op, dec)
    }

    fn decode_dynamic(&mut self, dec: &mut Decoder<'_>) -> Result<()> {
        self.get_or_insert_with(T::default).decode_dynamic(dec)
    }
}

// Tuples bind to struct ops, one element per field.
macro_rules! impl_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
                match op {
                    Op::Struct(ops) => enc.encode_fields(ops, &[$(&self.$idx),+]),
                    _ => Err(CodecError::mismatch(op, type_name::<Self>())),
                }
            }
        }

        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
                match op {
                    Op::Struct(ops) => dec.decode_fields(ops, &mut [$(&mut self.$idx),+]),
                    _ => Err(CodecError::mismatch(op, type_name::<Self>())),
                }
            }
        }
    };
}

impl_tuple!(A: 0);
impl_tuple!(A: 0, B: 1);
impl_tuple!(A: 0, B: 1, C: 2);
impl_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

/// Bind a struct to `{...}` ops by listing its fields in wire order.
///
/// Fields left out of the list are skipped. With a pattern, the struct also
/// becomes a [`Formatter`] and encodes itself for `v` ops.
///
/// ```
/// #[derive(Debug, Default, PartialEq)]
/// struct Peer {
///     alias: String,
///     port: u16,
///     last_seen: u64, // not on the wire
/// }
///
/// cslq::composite!(Peer = "[c]c s" { alias, port });
///
/// let peer = Peer { alias: "node".into(), port: 1791, last_seen: 9 };
/// let bytes = cslq::to_vec("v", &[&peer]).unwrap();
/// assert_eq!(bytes, cslq::to_vec("{[c]c s}", &[&peer]).unwrap());
///
/// let mut decoded = Peer::default();
/// cslq::decode(&bytes[..], "v", &mut [&mut decoded]).unwrap();
/// assert_eq!(decoded.alias, "node");
/// assert_eq!(decoded.port, 1791);
/// assert_eq!(decoded.last_seen, 0);
/// ```
#[macro_export]
macro_rules! composite {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Encode for $ty {
            fn encode(&self, op: &$crate::Op, enc: &mut $crate::Encoder<'_>) -> $crate::codec::Result<()> {
                match op {
                    $crate::Op::Struct(ops) => enc.encode_fields(ops, &[$(&self.$field as &dyn $crate::Encode),*]),
                    _ => Err($crate::CodecError::mismatch(op, ::std::any::type_name::<Self>())),
                }
            }
        }

        impl $crate::Decode for $ty {
            fn decode(&mut self, op: &$crate::Op, dec: &mut $crate::Decoder<'_>) -> $crate::codec::Result<()> {
                match op {
                    $crate::Op::Struct(ops) => dec.decode_fields(ops, &mut [$(&mut self.$field as &mut dyn $crate::Decode),*]),
                    _ => Err($crate::CodecError::mismatch(op, ::std::any::type_name::<Self>())),
                }
            }
        }
    };

    ($ty:ty = $pattern:literal { $($field:ident),* $(,)? }) => {
        impl $crate::Formatter for $ty {
            fn pattern(&self) -> &str {
                concat!("{", $pattern, "}")
            }
        }

        impl $crate::Encode for $ty {
            fn encode(&self, op: &$crate::Op, enc: &mut $crate::Encoder<'_>) -> $crate::codec::Result<()> {
                match op {
                    $crate::Op::Struct(ops) => enc.encode_fields(ops, &[$(&self.$field as &dyn $crate::Encode),*]),
                    _ => Err($crate::CodecError::mismatch(op, ::std::any::type_name::<Self>())),
                }
            }

            fn encode_dynamic(&self, enc: &mut $crate::Encoder<'_>) -> $crate::codec::Result<()> {
                enc.encode_formatted(self)
            }
        }

        impl $crate::Decode for $ty {
            fn decode(&mut self, op: &$crate::Op, dec: &mut $crate::Decoder<'_>) -> $crate::codec::Result<()> {
                match op {
                    $crate::Op::Struct(ops) => dec.decode_fields(ops, &mut [$(&mut self.$field as &mut dyn $crate::Decode),*]),
                    _ => Err($crate::CodecError::mismatch(op, ::std::any::type_name::<Self>())),
                }
            }

            fn decode_dynamic(&mut self, dec: &mut $crate::Decoder<'_>) -> $crate::codec::Result<()> {
                dec.decode_formatted(self)
            }
        }
    };
}
