//! cslq: Compact Binary Serialization
//!
//! cslq describes binary wire layouts with a short pattern string and walks
//! that description to encode values into bytes and decode bytes back into
//! values. Every wire protocol of a node (block storage, service discovery,
//! RPC argument frames) is built from these patterns.
//!
//! ## Features
//!
//! - **Pattern Language**: `c s l q` big-endian integers, `[len]` arrays,
//!   `{}` structs, `<>` const blocks, `xHH` literals, `v` dynamic values
//! - **Compiled Formats**: patterns compile once into an immutable Op tree,
//!   cached per process behind a read/write lock
//! - **Trait Binding**: values bind to ops through [`Encode`] / [`Decode`];
//!   structs list their wire fields with [`composite!`]
//! - **Limits**: nesting depth and length prefixes are bounded, so hostile
//!   input cannot exhaust the stack or memory
//! - **Framing**: length-prefixed frames over tokio streams
//!
//! ## Quick Start
//!
//! ```rust
//! let bytes = cslq::to_vec("{[c]c q}", &[&("hi", 42u64)]).unwrap();
//! assert_eq!(bytes, [0x02, b'h', b'i', 0, 0, 0, 0, 0, 0, 0, 0x2a]);
//!
//! let mut decoded = (String::new(), 0u64);
//! cslq::decode(&bytes[..], "{[c]c q}", &mut [&mut decoded]).unwrap();
//! assert_eq!(decoded, ("hi".to_string(), 42));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ pattern  │───▶│ Compiler │───▶│  Format  │
//! │  string  │    │ (cached) │    │ (Op tree)│
//! └──────────┘    └──────────┘    └────┬─────┘
//!                                      │
//!                       ┌──────────────┴──────────────┐
//!                       ▼                             ▼
//!                 ┌──────────┐                  ┌──────────┐
//!   values ──────▶│ Encoder  │──▶ bytes ──────▶│ Decoder  │──▶ slots
//!                 └──────────┘                  └──────────┘
//! ```

pub mod codec;
pub mod config;
pub mod frame;
pub mod pattern;

pub use codec::{
    decode, encode, to_vec, CodecError, Decode, Decoder, Encode, Encoder, Formatter, RemoteError,
    Result, Time, Value, WireError,
};
pub use config::{Config, ConfigError, Limits};
pub use frame::{pack, read_frame, unpack, write_frame};
pub use pattern::{compile, CompileError, Compiler, Format, Op};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
