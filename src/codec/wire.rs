//! Wire helpers shared by protocols built on the codec

use super::{CodecError, Decode, Decoder, Encode, Encoder, Formatter, Result};
use crate::pattern::Op;
use chrono::{DateTime, Utc};
use std::fmt;

/// Pattern of an optional error on the wire
pub const ERROR_PATTERN: &str = "[q]c";

/// A UTC timestamp, encoded as unix nanoseconds.
///
/// Pre-epoch times are stored two's complement so that `q` round-trips the
/// full `i64` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub DateTime<Utc>);

impl Time {
    pub fn now() -> Self {
        Time(Utc::now())
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Time(DateTime::from_timestamp_nanos(nanos))
    }

    fn nanos(&self) -> Result<i64> {
        self.0.timestamp_nanos_opt().ok_or(CodecError::CannotConvert {
            from: "DateTime<Utc>",
            to: "i64",
        })
    }
}

impl Default for Time {
    fn default() -> Self {
        Time(DateTime::UNIX_EPOCH)
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(time: DateTime<Utc>) -> Self {
        Time(time)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Formatter for Time {
    fn pattern(&self) -> &str {
        "q"
    }
}

impl Encode for Time {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        match op {
            Op::Uint(width) => enc.write_uint(*width, self.nanos()? as u64, "Time"),
            _ => Err(CodecError::mismatch(op, "Time")),
        }
    }

    fn encode_dynamic(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.encode_formatted(self)
    }
}

impl Decode for Time {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        match op {
            Op::Uint(width) => {
                *self = Time::from_nanos(dec.read_uint(*width)? as i64);
                Ok(())
            }
            _ => Err(CodecError::mismatch(op, "Time")),
        }
    }

    fn decode_dynamic(&mut self, dec: &mut Decoder<'_>) -> Result<()> {
        dec.decode_formatted(self)
    }
}

/// Error reported by the remote side of a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("remote error: {0}")]
pub struct RemoteError(pub String);

/// An optional error message carried in a reply.
///
/// An empty string on the wire means "no error".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireError {
    pub message: Option<String>,
}

impl WireError {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: (!message.is_empty()).then_some(message),
        }
    }

    /// Capture the outcome of a local operation for the reply.
    pub fn from_result<T, E: fmt::Display>(result: &std::result::Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::none(),
            Err(err) => Self::new(err.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        self.message.is_none()
    }

    pub fn into_result(self) -> std::result::Result<(), RemoteError> {
        match self.message {
            Some(message) => Err(RemoteError(message)),
            None => Ok(()),
        }
    }

    fn as_str(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

impl From<RemoteError> for WireError {
    fn from(err: RemoteError) -> Self {
        Self::new(err.0)
    }
}

impl Encode for WireError {
    fn encode(&self, op: &Op, enc: &mut Encoder<'_>) -> Result<()> {
        match op {
            Op::Array(_) => self.as_str().encode(op, enc),
            _ => Err(CodecError::mismatch(op, "WireError")),
        }
    }

    fn encode_dynamic(&self, enc: &mut Encoder<'_>) -> Result<()> {
        enc.encode(ERROR_PATTERN, &[&self.as_str()])
    }
}

impl Decode for WireError {
    fn decode(&mut self, op: &Op, dec: &mut Decoder<'_>) -> Result<()> {
        let mut message = String::new();
        message.decode(op, dec)?;
        *self = WireError::new(message);
        Ok(())
    }

    fn decode_dynamic(&mut self, dec: &mut Decoder<'_>) -> Result<()> {
        let mut message = String::new();
        dec.decode(ERROR_PATTERN, &mut [&mut message])?;
        *self = WireError::new(message);
        Ok(())
    }
}
