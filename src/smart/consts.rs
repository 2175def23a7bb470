//! Fixed parameters of the frame-length encoding scheme
//!
//! Every value the sender encodes rides on top of `BASE_LENGTH`, the length of
//! an empty UDP datagram once it is wrapped in an encrypted QoS data frame.

/// Frame length of an empty payload (link-layer + IP/UDP + cipher overhead)
pub const BASE_LENGTH: u16 = 82;

/// Length offset marking the start of a round (and the SSID section)
pub const LOCK_MARKER: u16 = 1399;

/// Length offset marking the start of the password section
pub const PASSWORD_MARKER: u16 = 1459;

/// Offset added to SSID/password length fields
pub const LENGTH_OFFSET: u16 = 28;

/// Offset added to every nibble value
pub const NIBBLE_OFFSET: u16 = 593;

/// Redundancy-confirmation length offsets, in transmit order
pub const CONFIRMATIONS: [u16; 2] = [3, 23];

/// Slot period: one data frame followed by its confirmations
pub const SLOT_WIDTH: u16 = CONFIRMATIONS.len() as u16 + 1;

pub const NIBBLES_PER_BYTE: usize = 2;

/// Candidate pool size
pub const CANDIDATE_SLOTS: usize = 10;

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;

pub const SSID_NIBBLES: usize = MAX_SSID_LEN * NIBBLES_PER_BYTE;
pub const PASSWORD_NIBBLES: usize = MAX_PASSWORD_LEN * NIBBLES_PER_BYTE;

/// 802.11 sequence numbers are 12 bits wide
pub const SEQ_MODULUS: u16 = 0x1000;

/// Sender preamble, indexed by sequence delta from the anchor.
///
/// `None` is a don't-care slot; on the wire it carries the SSID length field.
pub const PREAMBLE: [Option<u16>; 4] = [
    Some(LOCK_MARKER),
    None,
    Some(CONFIRMATIONS[0]),
    Some(CONFIRMATIONS[1]),
];

/// Preamble entries that must match before a candidate is promoted
pub const PREAMBLE_MATCH: u8 = (PREAMBLE.len() - 1) as u8;

/// Delta of the don't-care preamble slot
pub const PREAMBLE_LENGTH_SLOT: u16 = 1;

pub const MIN_CHANNEL: u8 = 1;
pub const MAX_CHANNEL: u8 = 14;
pub const DEFAULT_START_CHANNEL: u8 = 6;

/// Channel visiting order; each channel appears exactly once per cycle
pub const HOP_ORDER: [u8; MAX_CHANNEL as usize] = [1, 14, 2, 3, 4, 5, 7, 8, 9, 10, 11, 12, 13, 6];

/// Time spent listening on a channel before hopping
pub const CHANNEL_DWELL_MS: u64 = 30_000;

/// Connection status poll interval after credentials are applied
pub const STATION_POLL_MS: u64 = 2_000;

/// Length offset of a frame, or `None` when it is shorter than the base
pub fn length_offset(frame_len: u16) -> Option<u16> {
    frame_len.checked_sub(BASE_LENGTH)
}

/// Sequence delta from `anchor` to `seq`, modulo the sequence space
pub fn seq_delta(seq: u16, anchor: u16) -> u16 {
    seq.wrapping_sub(anchor) % SEQ_MODULUS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_delta_wraps() {
        assert_eq!(seq_delta(5, 3), 2);
        assert_eq!(seq_delta(1, 4094), 3);
        assert_eq!(seq_delta(0, 0), 0);
        assert_eq!(seq_delta(4095, 0), 4095);
    }

    #[test]
    fn test_hop_order_covers_every_channel() {
        let mut seen = [false; MAX_CHANNEL as usize + 1];
        for ch in HOP_ORDER {
            assert!((MIN_CHANNEL..=MAX_CHANNEL).contains(&ch));
            assert!(!seen[ch as usize], "channel {} visited twice", ch);
            seen[ch as usize] = true;
        }
    }

    #[test]
    fn test_length_offset() {
        assert_eq!(length_offset(1481), Some(LOCK_MARKER));
        assert_eq!(length_offset(82), Some(0));
        assert_eq!(length_offset(40), None);
    }
}
