use crate::error::{ProtocolError, ProtocolResult};
use bincode::config::standard;
use bincode::{decode_from_slice, encode_to_vec, Decode, Encode};
use log::trace;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted in either direction.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Length header followed by the encoded `message`.
pub fn encode_frame<T: Encode>(message: &T) -> ProtocolResult<Vec<u8>> {
    let payload = encode_to_vec(message, standard())?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Encodes `message` and writes it as one frame.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
    T: Encode,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!("Sent frame of {} bytes", frame.len() - HEADER_LEN);
    Ok(())
}

/// Reads one frame and returns its payload.
///
/// A peer closing the connection between frames gives [`ProtocolError::Closed`];
/// closing it in the middle of one is an I/O error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> ProtocolResult<Vec<u8>> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]).await? {
            0 if filled == 0 => return Err(ProtocolError::Closed),
            0 => return Err(ProtocolError::Io(ErrorKind::UnexpectedEof.into())),
            n => filled += n,
        }
    }
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    trace!("Received frame of {len} bytes");
    Ok(payload)
}

pub fn decode_message<T: Decode<()>>(payload: &[u8]) -> ProtocolResult<T> {
    let (message, read) = decode_from_slice(payload, standard())?;
    if read != payload.len() {
        return Err(ProtocolError::Unexpected(format!(
            "{} trailing bytes after message",
            payload.len() - read
        )));
    }
    Ok(message)
}

pub async fn read_message<R, T>(reader: &mut R) -> ProtocolResult<T>
where
    R: AsyncRead + Unpin,
    T: Decode<()>,
{
    decode_message(&read_frame(reader).await?)
}

/// Envelopes start with their id, so it can be recovered from a payload whose
/// body does not decode.
pub fn peek_request_id(payload: &[u8]) -> Option<u64> {
    decode_from_slice::<u64, _>(payload, standard())
        .ok()
        .map(|(id, _)| id)
}
