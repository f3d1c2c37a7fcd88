//! Splitting compressed payloads into sequenced datagrams.
//!
//! A payload larger than the chunk size is sent as up to 128 fragments,
//! each prefixed with a 12-byte header:
//!
//! - magic bytes `0x1e 0x0f`
//! - 8-byte message id, shared by every fragment of one message
//! - sequence index (0-based)
//! - sequence count

use crate::transport::TransportError;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;
use rand::Rng;

pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];
pub const CHUNK_HEADER_SIZE: usize = 12;
pub const MAX_CHUNKS: usize = 128;

/// One fragment of a chunked message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub message_id: [u8; 8],
    pub sequence_index: u8,
    pub sequence_count: u8,
    pub payload: Bytes,
}

impl ChunkDescriptor {
    /// Header followed by the payload slice.
    pub fn encode(&self) -> Bytes {
        let mut datagram = BytesMut::with_capacity(CHUNK_HEADER_SIZE + self.payload.len());
        datagram.put_slice(&CHUNK_MAGIC);
        datagram.put_slice(&self.message_id);
        datagram.put_u8(self.sequence_index);
        datagram.put_u8(self.sequence_count);
        datagram.put_slice(&self.payload);
        datagram.freeze()
    }

    pub fn decode(datagram: &Bytes) -> Option<Self> {
        if datagram.len() < CHUNK_HEADER_SIZE || datagram[..2] != CHUNK_MAGIC {
            return None;
        }

        let mut message_id = [0u8; 8];
        message_id.copy_from_slice(&datagram[2..10]);

        Some(Self {
            message_id,
            sequence_index: datagram[10],
            sequence_count: datagram[11],
            payload: datagram.slice(CHUNK_HEADER_SIZE..),
        })
    }
}

/// Id for a new message: the low 32 bits of the millisecond clock in the
/// high half, a random value in the low half. The clock half wraps about
/// every 49 days, so ids are only unique together with the random half.
pub fn message_id() -> [u8; 8] {
    let millis = Utc::now().timestamp_millis() as u64;
    let random: u32 = rand::rng().random();
    ((millis << 32) | u64::from(random)).to_be_bytes()
}

/// Split `payload` into fragments of at most `chunk_size` bytes.
///
/// Slices share the payload's buffer.
pub fn split(payload: &Bytes, chunk_size: usize, message_id: [u8; 8]) -> Result<Vec<ChunkDescriptor>, TransportError> {
    if chunk_size == 0 {
        return Err(TransportError::Configuration(
            "chunk_size must be greater than 0".to_string(),
        ));
    }

    let count = payload.len().div_ceil(chunk_size);
    if count > MAX_CHUNKS {
        return Err(TransportError::PayloadTooLarge {
            chunks: count,
            max: MAX_CHUNKS,
        });
    }

    Ok((0..count)
        .map(|index| {
            let start = index * chunk_size;
            let end = (start + chunk_size).min(payload.len());
            ChunkDescriptor {
                message_id,
                sequence_index: index as u8,
                sequence_count: count as u8,
                payload: payload.slice(start..end),
            }
        })
        .collect())
}

/// The datagrams to send for one compressed message.
///
/// A payload that fits in `chunk_size` goes out as-is; anything larger is
/// chunked. Nothing is returned for a payload needing more than
/// `MAX_CHUNKS` fragments.
pub fn plan_datagrams(payload: Bytes, chunk_size: usize, message_id: [u8; 8]) -> Result<Vec<Bytes>, TransportError> {
    if payload.len() <= chunk_size {
        return Ok(vec![payload]);
    }

    Ok(split(&payload, chunk_size, message_id)?
        .iter()
        .map(ChunkDescriptor::encode)
        .collect())
}
