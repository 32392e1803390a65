//! Length-prefixed frames over async streams
//!
//! Frames use the `[l]c` layout: a 4-byte big-endian length followed by the
//! payload. Encoding and decoding happen synchronously on in-memory buffers;
//! only the stream I/O is awaited.

use crate::codec::{CodecError, Decode, Encode, Result};
use crate::pattern::Format;
use bytes::Bytes;
use log::{trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the frame length prefix
pub const HEADER_LEN: usize = 4;

/// Encode `values` into a payload.
pub fn pack(format: &Format, values: &[&dyn Encode]) -> Result<Bytes> {
    Ok(Bytes::from(format.to_vec(values)?))
}

/// Decode a payload into `slots`. The payload must be consumed entirely.
pub fn unpack(format: &Format, payload: &[u8], slots: &mut [&mut dyn Decode]) -> Result<()> {
    let mut rest = payload;
    format.decode(&mut rest, slots)?;
    if !rest.is_empty() {
        return Err(CodecError::TrailingData(rest.len()));
    }
    Ok(())
}

/// Write one frame
pub async fn write_frame<W>(stream: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::LengthLimitExceeded {
        length: payload.len() as u64,
        limit: u32::MAX as usize,
    })?;

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    trace!("wrote frame of {} bytes", payload.len());
    Ok(())
}

/// Read one frame of at most `max_len` payload bytes.
///
/// Oversized frames are rejected before the payload is read.
pub async fn read_frame<R>(stream: &mut R, max_len: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;

    let len = u32::from_be_bytes(header);
    if len as usize > max_len {
        warn!("rejecting frame of {} bytes (limit {})", len, max_len);
        return Err(CodecError::LengthLimitExceeded {
            length: u64::from(len),
            limit: max_len,
        });
    }

    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;
    trace!("read frame of {} bytes", len);
    Ok(Bytes::from(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    #[test]
    fn test_pack_unpack() {
        let format = compile("[c]c s").unwrap();
        let payload = pack(&format, &[&"ping", &9u16]).unwrap();

        let mut name = String::new();
        let mut seq = 0u16;
        unpack(&format, &payload, &mut [&mut name, &mut seq]).unwrap();
        assert_eq!((name.as_str(), seq), ("ping", 9));
    }

    #[test]
    fn test_unpack_rejects_trailing_data() {
        let format = compile("c").unwrap();
        let err = unpack(&format, &[1, 2, 3], &mut [&mut 0u8]).unwrap_err();
        assert!(matches!(err, CodecError::TrailingData(2)));
    }

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);

        write_frame(&mut client, b"hello").await.unwrap();
        write_frame(&mut client, b"").await.unwrap();

        assert_eq!(read_frame(&mut server, 1024).await.unwrap(), &b"hello"[..]);
        assert!(read_frame(&mut server, 1024).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_before_body() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0, 0, 1, 0])
            .build();

        let err = read_frame(&mut stream, 255).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthLimitExceeded {
                length: 256,
                limit: 255
            }
        ));
    }

    #[tokio::test]
    async fn test_truncated_frame() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0, 0, 0, 4, b'a', b'b'])
            .build();

        let err = read_frame(&mut stream, 1024).await.unwrap_err();
        assert!(err.is_io());
    }

    #[tokio::test]
    async fn test_write_layout() {
        let mut stream = tokio_test::io::Builder::new()
            .write(&[0, 0, 0, 2])
            .write(b"ok")
            .build();

        write_frame(&mut stream, b"ok").await.unwrap();
    }
}
