//! Field decoding for a locked sender
//!
//! Once the sender is known, every frame from it is a slot in a flat stream
//! addressed by its sequence delta from the last lock marker:
//!
//! ```text
//! delta 0             lock marker
//! delta 1             SSID length + LENGTH_OFFSET
//! delta 2, 3          confirmations
//! delta 4 ..          SSID nibbles, each followed by two confirmations
//! ssid_end + 1        password marker
//! ssid_end + 2        password length + LENGTH_OFFSET
//! ssid_end + 3, 4     confirmations
//! ssid_end + 5 ..     password nibbles, each followed by two confirmations
//! ```
//!
//! where `ssid_end = 3 * (1 + 2 * ssid_len)`. Any contradiction drops the
//! anchor and waits for the next lock marker; collected nibbles are kept.

use tracing::{debug, trace};

use super::candidate::SenderCandidate;
use super::consts::{
    length_offset, seq_delta, CONFIRMATIONS, LENGTH_OFFSET, LOCK_MARKER, MAX_PASSWORD_LEN,
    MAX_SSID_LEN, NIBBLES_PER_BYTE, NIBBLE_OFFSET, PASSWORD_MARKER, PASSWORD_NIBBLES,
    SLOT_WIDTH, SSID_NIBBLES,
};
use super::frame::{AddressPair, Observation};
use super::nibble::NibbleBuffer;

/// The sender that completed the preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedSender {
    pub addresses: AddressPair,
    /// Sequence number of the current lock marker
    pub anchor: Option<u16>,
    pub ssid_len: Option<u8>,
    pub password_len: Option<u8>,
}

fn length_field(length: u16, max: usize) -> Option<u8> {
    let value = length_offset(length)?.checked_sub(LENGTH_OFFSET)?;
    (1..=max as u16).contains(&value).then_some(value as u8)
}

impl LockedSender {
    /// Promote a candidate, keeping its anchor and any SSID length it carried
    pub fn from_candidate(candidate: &SenderCandidate) -> Self {
        let ssid_len = candidate
            .length_hint
            .and_then(|hint| hint.checked_sub(LENGTH_OFFSET))
            .filter(|len| (1..=MAX_SSID_LEN as u16).contains(len))
            .map(|len| len as u8);

        Self {
            addresses: candidate.addresses,
            anchor: candidate.anchor,
            ssid_len,
            password_len: None,
        }
    }

    /// Last delta of the SSID zone
    fn ssid_end(ssid_len: u8) -> u16 {
        SLOT_WIDTH * (1 + NIBBLES_PER_BYTE as u16 * ssid_len as u16)
    }

    /// Last delta of the stream as far as the known lengths describe it
    fn stream_end(&self) -> u16 {
        match (self.ssid_len, self.password_len) {
            (None, _) => 1 + CONFIRMATIONS.len() as u16,
            (Some(s), None) => Self::ssid_end(s) + 2 + CONFIRMATIONS.len() as u16,
            (Some(s), Some(p)) => {
                Self::ssid_end(s) + 1 + SLOT_WIDTH * (1 + NIBBLES_PER_BYTE as u16 * p as u16)
            }
        }
    }
}

/// What the frame did to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Not from the locked sender, or nothing to do
    Ignored,
    /// Consumed without incident
    Accepted,
    /// A contradiction dropped the anchor
    Desync,
    /// Both buffers now hold every nibble
    Complete,
}

/// Locked sender plus the two nibble buffers it fills
#[derive(Debug, Clone)]
pub struct FieldDecoder {
    sender: LockedSender,
    ssid: NibbleBuffer,
    password: NibbleBuffer,
}

impl FieldDecoder {
    pub fn new(sender: LockedSender) -> Self {
        Self {
            sender,
            ssid: NibbleBuffer::new(SSID_NIBBLES),
            password: NibbleBuffer::new(PASSWORD_NIBBLES),
        }
    }

    pub fn sender(&self) -> &LockedSender {
        &self.sender
    }

    pub fn ssid_nibbles(&self) -> &NibbleBuffer {
        &self.ssid
    }

    pub fn password_nibbles(&self) -> &NibbleBuffer {
        &self.password
    }

    /// Both buffers and lengths, for the integrity check
    pub fn split_mut(&mut self) -> Option<(usize, &mut NibbleBuffer, usize, &mut NibbleBuffer)> {
        let ssid_len = self.sender.ssid_len? as usize;
        let password_len = self.sender.password_len? as usize;
        Some((ssid_len, &mut self.ssid, password_len, &mut self.password))
    }

    pub fn is_complete(&self) -> bool {
        match (self.sender.ssid_len, self.sender.password_len) {
            (Some(s), Some(p)) => {
                self.ssid.is_complete(s as usize * NIBBLES_PER_BYTE)
                    && self.password.is_complete(p as usize * NIBBLES_PER_BYTE)
            }
            _ => false,
        }
    }

    fn desync(&mut self, reason: &str, delta: u16) -> DecodeEvent {
        debug!("desync at delta {}: {}", delta, reason);
        self.sender.anchor = None;
        DecodeEvent::Desync
    }

    fn confirm(&mut self, which: usize, offset: Option<u16>, delta: u16) -> DecodeEvent {
        if offset == Some(CONFIRMATIONS[which]) {
            DecodeEvent::Accepted
        } else {
            self.desync("confirmation mismatch", delta)
        }
    }

    fn nibble(offset: Option<u16>) -> Option<u8> {
        let value = offset?.checked_sub(NIBBLE_OFFSET)?;
        u8::try_from(value).ok()
    }

    /// Feed one accepted frame
    pub fn observe(&mut self, obs: &Observation) -> DecodeEvent {
        if obs.addresses != self.sender.addresses {
            return DecodeEvent::Ignored;
        }

        let offset = length_offset(obs.length);
        let is_lock = offset == Some(LOCK_MARKER);

        let Some(anchor) = self.sender.anchor else {
            if is_lock {
                trace!("anchor set at seq {}", obs.sequence);
                self.sender.anchor = Some(obs.sequence);
                return DecodeEvent::Accepted;
            }
            return DecodeEvent::Ignored;
        };

        let delta = seq_delta(obs.sequence, anchor);

        if delta == 0 {
            return if is_lock {
                DecodeEvent::Accepted
            } else {
                self.desync("lost lock marker", delta)
            };
        }

        if delta > self.sender.stream_end() {
            if is_lock {
                trace!("next round anchored at seq {}", obs.sequence);
                self.sender.anchor = Some(obs.sequence);
                return DecodeEvent::Accepted;
            }
            self.sender.anchor = None;
            return DecodeEvent::Ignored;
        }

        let event = self.decode_slot(delta, obs.length, offset);
        if event == DecodeEvent::Accepted && self.is_complete() {
            return DecodeEvent::Complete;
        }
        event
    }

    fn decode_slot(&mut self, delta: u16, length: u16, offset: Option<u16>) -> DecodeEvent {
        if delta == 1 {
            return self.ssid_length(delta, length);
        }
        if delta <= 1 + CONFIRMATIONS.len() as u16 {
            return self.confirm(delta as usize - 2, offset, delta);
        }

        // stream_end() keeps deltas past the length fields out until the SSID length is known
        let Some(ssid_len) = self.sender.ssid_len else {
            return DecodeEvent::Ignored;
        };
        let ssid_end = LockedSender::ssid_end(ssid_len);

        if delta <= ssid_end {
            let slot = delta - 2 - CONFIRMATIONS.len() as u16;
            return self.zone_slot(false, slot, offset, delta);
        }
        if delta == ssid_end + 1 {
            return if offset == Some(PASSWORD_MARKER) {
                DecodeEvent::Accepted
            } else {
                self.desync("password marker mismatch", delta)
            };
        }
        if delta == ssid_end + 2 {
            return self.password_length(delta, length);
        }
        if delta <= ssid_end + 2 + CONFIRMATIONS.len() as u16 {
            return self.confirm((delta - ssid_end - 3) as usize, offset, delta);
        }

        let slot = delta - ssid_end - 3 - CONFIRMATIONS.len() as u16;
        self.zone_slot(true, slot, offset, delta)
    }

    fn zone_slot(&mut self, password: bool, slot: u16, offset: Option<u16>, delta: u16) -> DecodeEvent {
        let index = (slot / SLOT_WIDTH) as usize;
        match slot % SLOT_WIDTH {
            0 => {
                let Some(value) = Self::nibble(offset) else {
                    return self.desync("nibble out of range", delta);
                };
                let buf = if password { &mut self.password } else { &mut self.ssid };
                if buf.record(index, value) {
                    trace!(
                        "{} nibble {} = {:02x}",
                        if password { "password" } else { "ssid" },
                        index,
                        value
                    );
                }
                DecodeEvent::Accepted
            }
            m => self.confirm(m as usize - 1, offset, delta),
        }
    }

    fn ssid_length(&mut self, delta: u16, length: u16) -> DecodeEvent {
        // Out-of-range values are noise and leave the field alone
        let Some(value) = length_field(length, MAX_SSID_LEN) else {
            return DecodeEvent::Accepted;
        };
        match self.sender.ssid_len {
            Some(current) if current == value => DecodeEvent::Accepted,
            Some(current) => {
                debug!("ssid length {} contradicts {}", current, value);
                self.sender.ssid_len = Some(value);
                self.desync("ssid length contradiction", delta)
            }
            None => {
                debug!("ssid length {}", value);
                self.sender.ssid_len = Some(value);
                DecodeEvent::Accepted
            }
        }
    }

    fn password_length(&mut self, delta: u16, length: u16) -> DecodeEvent {
        let Some(value) = length_field(length, MAX_PASSWORD_LEN) else {
            return DecodeEvent::Accepted;
        };
        match self.sender.password_len {
            Some(current) if current == value => DecodeEvent::Accepted,
            Some(current) => {
                debug!("password length {} contradicts {}", current, value);
                self.sender.password_len = Some(value);
                self.desync("password length contradiction", delta)
            }
            None => {
                debug!("password length {}", value);
                self.sender.password_len = Some(value);
                DecodeEvent::Accepted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smart::consts::BASE_LENGTH;
    use crate::smart::encoder::round_lengths;

    fn pair(id: u8) -> AddressPair {
        AddressPair::new([0x02, 0, 0, 0, 0, id], [0xff; 6])
    }

    fn locked(anchor: Option<u16>, ssid_len: Option<u8>) -> FieldDecoder {
        FieldDecoder::new(LockedSender {
            addresses: pair(1),
            anchor,
            ssid_len,
            password_len: None,
        })
    }

    fn feed(dec: &mut FieldDecoder, first_seq: u16, lengths: &[u16]) -> Vec<DecodeEvent> {
        lengths
            .iter()
            .enumerate()
            .map(|(i, &length)| {
                dec.observe(&Observation {
                    addresses: pair(1),
                    sequence: (first_seq + i as u16) % 4096,
                    length,
                })
            })
            .collect()
    }

    #[test]
    fn test_worked_scenario_fills_ssid() {
        let mut dec = locked(None, None);
        feed(&mut dec, 10, &[1481, 111, 85, 105, 679, 85, 105, 756, 85, 105]);
        assert_eq!(dec.sender().ssid_len, Some(1));
        assert!(dec.ssid_nibbles().is_complete(2));
        assert_eq!(dec.ssid_nibbles().values(2), &[0x04, 0x51]);
        assert!(!dec.is_complete());
    }

    #[test]
    fn test_full_round_completes() {
        let mut dec = locked(None, None);
        let events = feed(&mut dec, 4000, &round_lengths(b"HomeNet", b"secret123").unwrap());
        assert_eq!(events.last(), Some(&DecodeEvent::Complete));
        assert!(!events.contains(&DecodeEvent::Desync));
        assert_eq!(dec.sender().password_len, Some(9));
    }

    #[test]
    fn test_ignores_other_senders() {
        let mut dec = locked(Some(0), Some(1));
        let event = dec.observe(&Observation {
            addresses: pair(9),
            sequence: 4,
            length: 679,
        });
        assert_eq!(event, DecodeEvent::Ignored);
        assert!(!dec.ssid_nibbles().is_received(0));
    }

    #[test]
    fn test_bad_confirmation_drops_anchor_only() {
        let mut dec = locked(None, None);
        let events = feed(&mut dec, 10, &[1481, 111, 85, 105, 679, 86]);
        assert_eq!(events[5], DecodeEvent::Desync);
        assert_eq!(dec.sender().anchor, None);
        assert_eq!(dec.sender().addresses, pair(1));
        assert_eq!(dec.sender().ssid_len, Some(1));
        assert!(dec.ssid_nibbles().is_received(0));

        // Frames are ignored until the next lock marker
        assert_eq!(feed(&mut dec, 16, &[105]), vec![DecodeEvent::Ignored]);
        assert_eq!(feed(&mut dec, 17, &[1481]), vec![DecodeEvent::Accepted]);
        assert_eq!(dec.sender().anchor, Some(17));
    }

    fn round_minus_last_password_nibble(dec: &mut FieldDecoder) {
        let lengths = round_lengths(b"HomeNet", b"secret123").unwrap();
        // Stop before the final password nibble and its confirmations
        feed(dec, 10, &lengths[..lengths.len() - 3]);
        assert_eq!(dec.sender().ssid_len, Some(7));
        assert_eq!(dec.password_nibbles().received_count(), 17);
        assert!(!dec.is_complete());
    }

    #[test]
    fn test_contradicting_ssid_length_resyncs() {
        let mut dec = locked(None, None);
        round_minus_last_password_nibble(&mut dec);

        let events = feed(&mut dec, 200, &[BASE_LENGTH + LOCK_MARKER, BASE_LENGTH + LENGTH_OFFSET + 6]);
        assert_eq!(events, vec![DecodeEvent::Accepted, DecodeEvent::Desync]);
        assert_eq!(dec.sender().anchor, None);
        assert_eq!(dec.sender().ssid_len, Some(6));
        assert_eq!(dec.sender().password_len, Some(9));
        assert_eq!(dec.password_nibbles().received_count(), 17);
        assert_eq!(dec.ssid_nibbles().received_count(), 14);
    }

    #[test]
    fn test_out_of_range_length_is_noise() {
        let mut dec = locked(None, None);
        round_minus_last_password_nibble(&mut dec);

        let events = feed(&mut dec, 200, &[BASE_LENGTH + LOCK_MARKER, BASE_LENGTH + LENGTH_OFFSET + 40]);
        assert_eq!(events, vec![DecodeEvent::Accepted, DecodeEvent::Accepted]);
        assert_eq!(dec.sender().anchor, Some(200));
        assert_eq!(dec.sender().ssid_len, Some(7));
        assert_eq!(dec.password_nibbles().received_count(), 17);

        // Same for the password length field at ssid_end + 2
        let ssid_end = LockedSender::ssid_end(7);
        let events = feed(&mut dec, 200 + ssid_end + 2, &[BASE_LENGTH + LENGTH_OFFSET + 65]);
        assert_eq!(events, vec![DecodeEvent::Accepted]);
        assert_eq!(dec.sender().password_len, Some(9));
        assert_eq!(dec.sender().anchor, Some(200));
    }

    #[test]
    fn test_contradicting_password_length_resyncs() {
        let mut dec = locked(None, None);
        round_minus_last_password_nibble(&mut dec);

        let ssid_end = LockedSender::ssid_end(7);
        feed(&mut dec, 200, &[BASE_LENGTH + LOCK_MARKER]);
        let events = feed(&mut dec, 200 + ssid_end + 2, &[BASE_LENGTH + LENGTH_OFFSET + 12]);
        assert_eq!(events, vec![DecodeEvent::Desync]);
        assert_eq!(dec.sender().password_len, Some(12));
        assert_eq!(dec.password_nibbles().received_count(), 17);
    }

    #[test]
    fn test_each_fixed_slot_corruption_recovers() {
        let clean = round_lengths(b"HomeNet", b"secret123").unwrap();
        let ssid_end = LockedSender::ssid_end(7) as usize;

        // Preamble confirmations, every SSID/password confirmation, the
        // password marker and the password confirmations
        let mut fixed: Vec<usize> = vec![2, 3, ssid_end + 1, ssid_end + 3, ssid_end + 4];
        for delta in 4..clean.len() {
            let in_ssid = delta <= ssid_end && (delta - 4) % 3 != 0;
            let in_password = delta > ssid_end + 4 && (delta - ssid_end - 5) % 3 != 0;
            if in_ssid || in_password {
                fixed.push(delta);
            }
        }
        assert_eq!(fixed.len(), 5 + 2 * 14 + 2 * 18);

        for &delta in &fixed {
            let mut dec = locked(None, None);
            let mut round = clean.clone();
            round[delta] += 1;
            let events = feed(&mut dec, 10, &round);

            assert_eq!(events[delta], DecodeEvent::Desync, "delta {}", delta);
            assert_eq!(dec.sender().addresses, pair(1));
            assert_eq!(dec.sender().anchor, None);
            assert_eq!(dec.sender().ssid_len, Some(7));

            // Nibbles sent before the corrupted frame are all kept
            let ssid_sent = (0..14).filter(|k| 4 + 3 * k < delta).count() as u32;
            let password_sent = (0..18).filter(|k| ssid_end + 5 + 3 * k < delta).count() as u32;
            assert_eq!(dec.ssid_nibbles().received_count(), ssid_sent, "delta {}", delta);
            assert_eq!(dec.password_nibbles().received_count(), password_sent, "delta {}", delta);

            let next = feed(&mut dec, 10 + clean.len() as u16, &clean);
            assert_eq!(next.last(), Some(&DecodeEvent::Complete), "delta {}", delta);
            assert!(dec.is_complete());
        }
    }

    #[test]
    fn test_first_length_must_be_in_range() {
        let mut dec = locked(Some(10), None);
        assert_eq!(feed(&mut dec, 11, &[BASE_LENGTH + LENGTH_OFFSET]), vec![DecodeEvent::Accepted]);
        assert_eq!(dec.sender().ssid_len, None);
    }

    #[test]
    fn test_nibble_out_of_range_desyncs() {
        let mut dec = locked(Some(10), Some(1));
        let events = feed(&mut dec, 14, &[BASE_LENGTH + NIBBLE_OFFSET + 256]);
        assert_eq!(events[0], DecodeEvent::Desync);
        assert!(!dec.ssid_nibbles().is_received(0));
    }

    #[test]
    fn test_first_write_wins_across_rounds() {
        let mut dec = locked(None, None);
        feed(&mut dec, 10, &[1481, 111, 85, 105, 679]);
        // Next round carries a different value for nibble 0
        feed(&mut dec, 40, &[1481, 111, 85, 105, 680]);
        assert_eq!(dec.ssid_nibbles().values(1), &[0x04]);
    }

    #[test]
    fn test_lost_lock_marker_at_anchor() {
        let mut dec = locked(Some(10), Some(1));
        assert_eq!(feed(&mut dec, 10, &[300]), vec![DecodeEvent::Desync]);
    }

    #[test]
    fn test_unknown_ssid_length_bounds_stream() {
        let mut dec = locked(Some(10), None);
        assert_eq!(feed(&mut dec, 14, &[679]), vec![DecodeEvent::Ignored]);
        assert_eq!(dec.sender().anchor, None);
    }

    #[test]
    fn test_password_marker_checked() {
        let mut dec = locked(None, None);
        let events = feed(&mut dec, 0, &[1481, 111, 85, 105, 679, 85, 105, 756, 85, 105, 1460]);
        assert_eq!(events[10], DecodeEvent::Desync);
    }

    #[test]
    fn test_candidate_hint_seeds_ssid_length() {
        let candidate = SenderCandidate {
            addresses: pair(1),
            progress: 3,
            anchor: Some(5),
            length_hint: Some(LENGTH_OFFSET + 7),
        };
        let sender = LockedSender::from_candidate(&candidate);
        assert_eq!(sender.ssid_len, Some(7));
        assert_eq!(sender.anchor, Some(5));

        let bad = SenderCandidate {
            length_hint: Some(LENGTH_OFFSET + 33),
            ..candidate
        };
        assert_eq!(LockedSender::from_candidate(&bad).ssid_len, None);
    }
}
