//! Erased values shaped by the pattern
//!
//! [`Value`] lets tools work with data whose layout is only known at run
//! time. On decode the op decides the variant: integers become `Uint`, byte
//! arrays become `Text` (valid UTF-8) or `Bytes`, other arrays and structs
//! become `List`.

use super::{CodecError, Decode, Decoder, Encode, Encoder, Result};
use crate::pattern::{arity, ArrayOp, Op};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Uint(u64),
    Text(String),
    // before Bytes so that JSON arrays deserialize as lists
    List(Vec<Value>),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Uint(_) => "uint",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Bytes(_) => "bytes",
        }
    }

    fn mismatch(&self, op: &Op) -> CodecError {
        match self {
            Value::Null => CodecError::NilValue { ty: "Value" },
            _ => CodecError::mismatch(op, self.kind()),
        }
    }
}

impl Encode for Value {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        match (op, self) {
            (Op::Uint(_), Value::Bool(b)) => b.encode(op, enc),
            (Op::Uint(_), Value::Uint(n)) => n.encode(op, enc),
            (Op::Array(_), Value::Text(s)) => s.encode(op, enc),
            (Op::Array(_), Value::Bytes(b)) => b.encode(op, enc),
            (Op::Array(_), Value::List(items)) => items.encode(op, enc),
            (Op::Struct(ops), Value::List(fields)) => {
                let values: Vec<&dyn Encode> = fields.iter().map(|f| f as &dyn Encode).collect();
                enc.encode_fields(ops, &values)
            }
            _ => Err(self.mismatch(op)),
        }
    }
}

impl Decode for Value {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        *self = match op {
            Op::Uint(width) => Value::Uint(dec.read_uint(*width)?),
            Op::Array(array) if array.element.is_byte() => decode_byte_array(array, dec)?,
            Op::Array(array) => {
                let mut items: Vec<Value> = Vec::new();
                dec.decode_vec(&mut items, array)?;
                Value::List(items)
            }
            Op::Struct(ops) => {
                let mut fields = vec![Value::Null; arity(ops)];
                let mut slots: Vec<&mut dyn Decode> =
                    fields.iter_mut().map(|f| f as &mut dyn Decode).collect();
                dec.decode_fields(ops, &mut slots)?;
                Value::List(fields)
            }
            _ => return Err(CodecError::mismatch(op, "Value")),
        };
        Ok(())
    }
}

fn decode_byte_array(array: &ArrayOp, dec: &mut Decoder<'_>) -> Result<Value> {
    let len = dec.read_length(array)?;
    let bytes = dec.read_bytes(len)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => Value::Text(text),
        Err(err) => Value::Bytes(err.into_bytes()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_vec;

    fn decode(pattern: &str, bytes: &[u8]) -> Result<Vec<Value>> {
        let format = crate::compile(pattern)?;
        let mut values = vec![Value::Null; format.arity()];
        let mut slots: Vec<&mut dyn Decode> =
            values.iter_mut().map(|v| v as &mut dyn Decode).collect();
        format.decode(bytes, &mut slots)?;
        Ok(values)
    }

    #[test]
    fn test_shape_driven_decode() {
        let values = decode("c [c]c [c]c {s [c]s}", &[
            7,
            2, b'o', b'k',
            2, 0xff, 0xfe,
            0, 9, 1, 0, 3,
        ])
        .unwrap();
        assert_eq!(
            values,
            vec![
                Value::Uint(7),
                Value::Text("ok".into()),
                Value::Bytes(vec![0xff, 0xfe]),
                Value::List(vec![Value::Uint(9), Value::List(vec![Value::Uint(3)])]),
            ]
        );
    }

    #[test]
    fn test_encode_matches_typed_values() {
        let dynamic = to_vec(
            "c [c]c {s c}",
            &[
                &Value::Bool(true),
                &Value::Text("hi".into()),
                &Value::List(vec![Value::Uint(5), Value::Uint(6)]),
            ],
        )
        .unwrap();
        let typed = to_vec("c [c]c {s c}", &[&true, &"hi", &(5u16, 6u8)]).unwrap();
        assert_eq!(dynamic, typed);
    }

    #[test]
    fn test_json_roundtrip_through_wire() {
        let input: Vec<Value> = serde_json::from_str(r#"[1, "node", [2, 3]]"#).unwrap();
        let values: Vec<&dyn Encode> = input.iter().map(|v| v as &dyn Encode).collect();
        let bytes = to_vec("q [c]c [c]s", &values).unwrap();

        let decoded = decode("q [c]c [c]s", &bytes).unwrap();
        assert_eq!(serde_json::to_string(&decoded).unwrap(), r#"[1,"node",[2,3]]"#);
    }

    #[test]
    fn test_null_cannot_encode() {
        let err = to_vec("c", &[&Value::Null]).unwrap_err();
        assert!(matches!(err, CodecError::NilValue { .. }));
    }

    #[test]
    fn test_shape_mismatch() {
        let err = to_vec("c", &[&Value::Text("x".into())]).unwrap_err();
        assert!(matches!(err, CodecError::CannotConvert { from: "text", to: "u8" }));

        let err = to_vec("v", &[&Value::Uint(1)]).unwrap_err();
        assert!(matches!(err, CodecError::MissingCapability { .. }));
    }
}
