//! Length-prefixed JSON framing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtoError;

/// Upper bound on a single frame. A 65535 x 65535 grid of one byte per
/// cell would not fit, but nothing the protocol actually ships comes
/// close; the limit exists to fail fast on a corrupt length prefix.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Writes one message as a 4-byte big-endian length followed by JSON.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), ProtoError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtoError::FrameTooLarge(payload.len()));
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one message. A clean EOF before the length prefix is reported
/// as [`ProtoError::Closed`] so connection loops can exit quietly.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, ProtoError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtoError::Closed)
        }
        Err(err) => return Err(err.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(ProtoError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}
