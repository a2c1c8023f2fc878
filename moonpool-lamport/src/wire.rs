//! Wire format for frames exchanged over TCP.
//!
//! Frame format: `[length:4][checksum:4][payload:N]`
//!
//! - **length**: Total frame size including header (little-endian u32)
//! - **checksum**: CRC32C of the payload
//! - **payload**: Codec-encoded message

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Header size: 4 (length) + 4 (checksum).
pub const HEADER_SIZE: usize = 8;

/// Maximum payload size (64KB). Protocol messages are a few dozen bytes.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Wire format error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    /// Not enough data to parse the frame.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required to parse.
        needed: usize,
        /// Actual bytes available.
        have: usize,
    },

    /// Checksum verification failed.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum from the header.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// Payload exceeds [`MAX_PAYLOAD_SIZE`].
    #[error("frame too large: {size} bytes (max {max})", max = MAX_PAYLOAD_SIZE)]
    FrameTooLarge {
        /// Payload size in bytes.
        size: usize,
    },

    /// Length field has an invalid value.
    #[error("invalid frame length: {length}")]
    InvalidLength {
        /// The invalid length value from the header.
        length: u32,
    },
}

/// Fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total frame size including header.
    pub length: u32,
    /// CRC32C checksum of the payload.
    pub checksum: u32,
}

impl FrameHeader {
    /// Serialize header into the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn serialize_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
    }

    /// Deserialize header from buffer.
    pub fn deserialize(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::InsufficientData {
                needed: HEADER_SIZE,
                have: buf.len(),
            });
        }

        let length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let checksum = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let header = Self { length, checksum };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<(), WireError> {
        let length = self.length as usize;
        if length < HEADER_SIZE {
            return Err(WireError::InvalidLength {
                length: self.length,
            });
        }
        if length - HEADER_SIZE > MAX_PAYLOAD_SIZE {
            return Err(WireError::FrameTooLarge {
                size: length - HEADER_SIZE,
            });
        }
        Ok(())
    }

    fn payload_len(&self) -> usize {
        self.length as usize - HEADER_SIZE
    }
}

/// Serialize a payload into a frame.
pub fn serialize_frame(payload: &[u8]) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
        });
    }

    let total_length = HEADER_SIZE + payload.len();
    let mut data = vec![0u8; total_length];
    let header = FrameHeader {
        length: total_length as u32,
        checksum: crc32c::crc32c(payload),
    };
    header.serialize_into(&mut data[..HEADER_SIZE]);
    data[HEADER_SIZE..].copy_from_slice(payload);
    Ok(data)
}

fn verify_checksum(header: &FrameHeader, payload: &[u8]) -> Result<(), WireError> {
    let computed = crc32c::crc32c(payload);
    if computed != header.checksum {
        return Err(WireError::ChecksumMismatch {
            expected: header.checksum,
            actual: computed,
        });
    }
    Ok(())
}

/// Write one frame carrying `payload` to `writer`.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), crate::LamportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = serialize_frame(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` on a clean end of stream before a new frame starts.
/// A stream that ends inside a header fails with
/// [`WireError::InsufficientData`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, crate::LamportError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = reader.read(&mut header_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(WireError::InsufficientData {
                needed: HEADER_SIZE,
                have: filled,
            }
            .into());
        }
        filled += n;
    }

    let header = FrameHeader::deserialize(&header_buf)?;
    let mut payload = vec![0u8; header.payload_len()];
    reader.read_exact(&mut payload).await?;
    verify_checksum(&header, &payload)?;
    Ok(Some(payload))
}
