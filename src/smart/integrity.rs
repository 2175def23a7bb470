//! Positional chain checksum over received nibbles
//!
//! Each transmitted value is `(check << 4) | data`, where `data` is one half
//! of a credential byte (high nibble first) and `check` links it to its
//! predecessor: `check[i] = data[i-1] ^ i` (low four bits). The first value
//! carries a zero check. A broken link pins the error to three neighbouring
//! slots, so only those are re-opened.

use thiserror::Error;
use tracing::debug;

use super::consts::NIBBLES_PER_BYTE;
use super::nibble::NibbleBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("no nibbles to check")]
    Empty,
    #[error("buffer holds {received} of {expected} nibbles")]
    Incomplete { received: u32, expected: usize },
    #[error("checksum chain broken at nibble {index}")]
    ChainBroken { index: usize },
    #[error("byte {index} is not printable (0x{byte:02x})")]
    NotPrintable { index: usize, byte: u8 },
}

/// Encode credential bytes into the raw nibble values a sender transmits
pub fn encode(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * NIBBLES_PER_BYTE);
    let mut prev: u8 = 0;
    for (i, data) in bytes.iter().flat_map(|b| [b >> 4, b & 0x0F]).enumerate() {
        let check = if i == 0 { 0 } else { (prev ^ i as u8) & 0x0F };
        out.push((check << 4) | data);
        prev = data;
    }
    out
}

fn link_holds(prev: u8, cur: u8, index: usize) -> bool {
    (prev & 0x0F) ^ (index as u8 & 0x0F) == cur >> 4
}

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// Validate the first `byte_len * 2` slots of `buf` and assemble the bytes.
///
/// On failure the implicated slots are invalidated in `buf` so that the next
/// transmission round can refill them.
pub fn decode(buf: &mut NibbleBuffer, byte_len: usize) -> Result<Vec<u8>, IntegrityError> {
    let len = byte_len * NIBBLES_PER_BYTE;
    if len == 0 {
        return Err(IntegrityError::Empty);
    }
    if !buf.is_complete(len) {
        return Err(IntegrityError::Incomplete {
            received: buf.received_count(),
            expected: len,
        });
    }

    let nibble = buf.values(len).to_vec();

    if len == NIBBLES_PER_BYTE {
        if nibble[0] > 0x0F || !link_holds(nibble[0], nibble[1], 1) {
            debug!("single-byte check failed: {:02x} {:02x}", nibble[0], nibble[1]);
            buf.invalidate(0);
            buf.invalidate(1);
            return Err(IntegrityError::ChainBroken { index: 0 });
        }
    } else {
        for i in (1..=len - 2).rev() {
            let forward = link_holds(nibble[i], nibble[i + 1], i + 1);
            let back = link_holds(nibble[i - 1], nibble[i], i);
            if !forward || !back {
                debug!(
                    "chain broken at {}: {:02x} {:02x} {:02x}",
                    i,
                    nibble[i - 1],
                    nibble[i],
                    nibble[i + 1]
                );
                buf.invalidate(i - 1);
                buf.invalidate(i);
                buf.invalidate(i + 1);
                return Err(IntegrityError::ChainBroken { index: i });
            }
        }
    }

    let bytes: Vec<u8> = nibble
        .chunks_exact(NIBBLES_PER_BYTE)
        .map(|pair| ((pair[0] & 0x0F) << 4) | (pair[1] & 0x0F))
        .collect();

    let mut first_bad = None;
    for (k, &byte) in bytes.iter().enumerate() {
        if !is_printable(byte) {
            debug!("non-printable byte {}: {:02x}", k, byte);
            buf.invalidate(k * NIBBLES_PER_BYTE);
            buf.invalidate(k * NIBBLES_PER_BYTE + 1);
            if first_bad.is_none() {
                first_bad = Some(IntegrityError::NotPrintable { index: k, byte });
            }
        }
    }

    match first_bad {
        Some(err) => Err(err),
        None => Ok(bytes),
    }
}
