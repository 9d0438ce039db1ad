//! Source RCON packet codec.
//!
//! Frame layout, all integers little-endian:
//!
//! ```text
//! size: i32 | id: i32 | type: i32 | body bytes | 0x00 | 0x00
//! ```
//!
//! `size` counts everything after itself.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::RconError;

/// Login request.
pub const SERVERDATA_AUTH: i32 = 3;
/// Login result. Shares its value with [`SERVERDATA_EXECCOMMAND`].
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
/// Command request.
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
/// Command output.
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Packet id the server uses to signal a rejected password.
pub const AUTH_FAILED_ID: i32 = -1;

/// Largest body a client may send.
pub const MAX_BODY_LEN: usize = 4096;

/// Largest frame accepted from a server. Some servers exceed the
/// client-side body limit for long player lists.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// id + type + two terminators.
const MIN_FRAME_LEN: usize = 10;

/// A single RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    #[must_use]
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Serialize the packet including its size prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::Protocol`] if the body is too long or contains
    /// a NUL byte, which would corrupt the frame.
    pub fn encode(&self) -> Result<Vec<u8>, RconError> {
        if self.body.len() > MAX_BODY_LEN {
            return Err(RconError::Protocol(format!(
                "body of {} bytes exceeds {MAX_BODY_LEN}",
                self.body.len()
            )));
        }
        if self.body.contains('\0') {
            return Err(RconError::Protocol("body contains a NUL byte".into()));
        }

        let frame_len = MIN_FRAME_LEN + self.body.len();
        // Bounded by MAX_BODY_LEN above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let size = frame_len as i32;

        let mut buf = Vec::with_capacity(4 + frame_len);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(self.body.as_bytes());
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }

    /// Parse a frame without its size prefix.
    ///
    /// Invalid UTF-8 in the body is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`RconError::Protocol`] if the frame is shorter than the
    /// fixed header.
    pub fn decode(frame: &[u8]) -> Result<Self, RconError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(RconError::Protocol(format!(
                "frame of {} bytes is shorter than {MIN_FRAME_LEN}",
                frame.len()
            )));
        }
        let id = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let kind = i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);

        let mut body = &frame[8..];
        while let Some((&0, rest)) = body.split_last() {
            body = rest;
        }

        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

/// Write one packet and flush.
///
/// # Errors
///
/// Returns an error if encoding or the write fails.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), RconError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = packet.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one packet.
///
/// # Errors
///
/// Returns [`RconError::ConnectionClosed`] on EOF and
/// [`RconError::Protocol`] for an out-of-range size prefix.
pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, RconError>
where
    R: AsyncRead + Unpin,
{
    let size = reader.read_i32_le().await?;
    let len = usize::try_from(size)
        .ok()
        .filter(|len| (MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(len))
        .ok_or_else(|| RconError::Protocol(format!("invalid packet size {size}")))?;

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Packet::decode(&frame)
}
