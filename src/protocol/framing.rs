//! Length-prefixed framing shared by every TCP link.
//!
//! Each message is a four-byte big-endian unsigned length followed by a
//! UTF-8 JSON body. Bodies are limited to 64 KiB; a received length outside
//! `1..=65536` is a protocol violation and the connection must be closed.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame body size in bytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Errors produced by the framing layer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer advertised a length outside `1..=65536`. The connection is
    /// unusable after this; the remaining stream bytes cannot be trusted.
    #[error("invalid frame length {0}")]
    InvalidLength(u32),

    /// A local attempt to send a body larger than [`MAX_FRAME_LEN`].
    #[error("frame body of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),

    /// The body could not be encoded or decoded as JSON.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read one frame body. Returns `Ok(None)` when the peer closed the
/// connection cleanly before sending a header; an EOF in the middle of a
/// frame surfaces as an I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header);
    if len == 0 || len as usize > MAX_FRAME_LEN {
        return Err(FrameError::InvalidLength(len));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(Some(Bytes::from(body)))
}

/// Write one frame. The body must already fit the size limit.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if body.is_empty() || body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(body.len()));
    }

    let header = (body.len() as u32).to_be_bytes();
    writer.write_all(&header).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Serialize `message` as JSON and send it as one frame.
pub async fn send_message<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message)?;
    write_frame(writer, &body).await
}

/// Encode a message into a ready-to-send frame body.
///
/// Broadcast paths serialize once and hand the same [`Bytes`] to every
/// recipient's writer task.
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<Bytes, FrameError> {
    let body = serde_json::to_vec(message)?;
    if body.is_empty() || body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(body.len()));
    }
    Ok(Bytes::from(body))
}

/// Read one frame and decode its JSON body. `Ok(None)` on clean close.
pub async fn recv_message<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn round_trips_a_body() {
        let (mut client, mut server) = tokio::io::duplex(256 * 1024);
        write_frame(&mut client, b"{\"action\":\"login\"}")
            .await
            .unwrap();
        let body = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(&body[..], b"{\"action\":\"login\"}");
    }

    #[tokio::test]
    async fn clean_close_yields_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_length_is_a_protocol_violation() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&0u32.to_be_bytes()).await.unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength(0)));
    }

    #[tokio::test]
    async fn oversized_length_is_a_protocol_violation() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_FRAME_LEN as u32) + 1;
        client.write_all(&len.to_be_bytes()).await.unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength(l) if l == len));
    }

    #[tokio::test]
    async fn max_length_body_is_accepted() {
        let (mut client, mut server) = tokio::io::duplex(2 * MAX_FRAME_LEN);
        let body = vec![b'x'; MAX_FRAME_LEN];
        write_frame(&mut client, &body).await.unwrap();
        let read = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(read.len(), MAX_FRAME_LEN);
    }

    #[tokio::test]
    async fn refuses_to_send_oversized_or_empty_bodies() {
        let (mut client, _server) = tokio::io::duplex(64);
        let too_big = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            write_frame(&mut client, &too_big).await.unwrap_err(),
            FrameError::TooLarge(_)
        ));
        assert!(matches!(
            write_frame(&mut client, b"").await.unwrap_err(),
            FrameError::TooLarge(0)
        ));
    }

    #[tokio::test]
    async fn truncated_body_surfaces_as_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&8u32.to_be_bytes()).await.unwrap();
        client.write_all(b"hal").await.unwrap();
        drop(client);
        assert!(matches!(
            read_frame(&mut server).await.unwrap_err(),
            FrameError::Io(_)
        ));
    }

    proptest! {
        #[test]
        fn header_encoding_round_trips(len in 1u32..=MAX_FRAME_LEN as u32) {
            let header = len.to_be_bytes();
            prop_assert_eq!(u32::from_be_bytes(header), len);
        }
    }

    #[tokio::test]
    async fn arbitrary_bodies_round_trip() {
        // Deterministic spread of sizes across the valid range.
        for len in [1usize, 2, 3, 17, 255, 256, 1024, 4096, MAX_FRAME_LEN] {
            let (mut client, mut server) = tokio::io::duplex(2 * MAX_FRAME_LEN);
            let body: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            write_frame(&mut client, &body).await.unwrap();
            let read = read_frame(&mut server).await.unwrap().unwrap();
            assert_eq!(&read[..], &body[..]);
        }
    }
}
