//! Captured frame parsing and filtering
//!
//! A monitor-mode capture buffer is a 12-byte receive-control block followed
//! by the start of the 802.11 MAC header. Only the header fields are read;
//! the frame body is never touched.

use std::fmt;

use super::consts::SEQ_MODULUS;

/// Size of the receive-control block that prefixes every captured buffer
pub const RX_CONTROL_LEN: usize = 12;

/// Reported length of a bare management/control capture (noise)
pub const MANAGEMENT_CAPTURE_LEN: u16 = 12;

/// Minimum reported length for a capture that carries a MAC header
pub const MIN_DATA_CAPTURE_LEN: u16 = 64;

/// Bytes of MAC header needed to read addresses and sequence control
pub const MAC_HEADER_LEN: usize = 24;

const TYPE_SUBTYPE_MASK: u8 = 0xFC;
const TYPE_SUBTYPE_QOS_DATA: u8 = 0x88;

/// to-DS | from-DS | retry | protected
const FLAGS_MASK: u8 = 0x4B;
/// to-DS and protected set, from-DS and retry clear
const FLAGS_EXPECTED: u8 = 0x41;

const FLAG_RETRY: u8 = 0x08;

/// Source + destination address offset within the MAC header
const ADDR_PAIR_OFFSET: usize = 10;
const SEQ_CTRL_OFFSET: usize = 22;

/// Source and destination link-layer addresses, compared as one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddressPair(pub [u8; 12]);

impl AddressPair {
    pub fn new(source: [u8; 6], destination: [u8; 6]) -> Self {
        let mut pair = [0u8; 12];
        pair[..6].copy_from_slice(&source);
        pair[6..].copy_from_slice(&destination);
        Self(pair)
    }

    pub fn source(&self) -> &[u8] {
        &self.0[..6]
    }

    pub fn destination(&self) -> &[u8] {
        &self.0[6..]
    }
}

impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", hex::encode(self.source()), hex::encode(self.destination()))
    }
}

/// Header fields of one captured frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioFrame {
    pub frame_control: [u8; 2],
    pub addresses: AddressPair,
    /// 12-bit sequence number
    pub sequence: u16,
    /// 4-bit fragment number
    pub fragment: u8,
    /// Reported frame length in bytes, header included
    pub length: u16,
}

impl RadioFrame {
    /// A to-DS, protected QoS data frame - what a phone sends on an encrypted network
    pub fn qos_data(addresses: AddressPair, sequence: u16, length: u16) -> Self {
        Self {
            frame_control: [TYPE_SUBTYPE_QOS_DATA, FLAGS_EXPECTED],
            addresses,
            sequence: sequence % SEQ_MODULUS,
            fragment: 0,
            length,
        }
    }

    /// Parse the header out of a raw capture buffer
    pub fn parse(buf: &[u8], len: u16) -> Option<Self> {
        let header = buf.get(RX_CONTROL_LEN..RX_CONTROL_LEN + MAC_HEADER_LEN)?;

        let mut addresses = [0u8; 12];
        addresses.copy_from_slice(&header[ADDR_PAIR_OFFSET..ADDR_PAIR_OFFSET + 12]);

        let seq_lo = header[SEQ_CTRL_OFFSET];
        let seq_hi = header[SEQ_CTRL_OFFSET + 1];

        Some(Self {
            frame_control: [header[0], header[1]],
            addresses: AddressPair(addresses),
            sequence: ((seq_hi as u16) << 4) | (seq_lo as u16 >> 4),
            fragment: seq_lo & 0x0F,
            length: len,
        })
    }

    /// Serialize into a capture buffer (receive-control block zeroed)
    pub fn to_capture(&self) -> Vec<u8> {
        let mut buf = vec![0u8; RX_CONTROL_LEN + MAC_HEADER_LEN];
        let header = &mut buf[RX_CONTROL_LEN..];
        header[0] = self.frame_control[0];
        header[1] = self.frame_control[1];
        header[ADDR_PAIR_OFFSET..ADDR_PAIR_OFFSET + 12].copy_from_slice(&self.addresses.0);
        header[SEQ_CTRL_OFFSET] = ((self.sequence & 0x0F) as u8) << 4 | (self.fragment & 0x0F);
        header[SEQ_CTRL_OFFSET + 1] = (self.sequence >> 4) as u8;
        buf
    }

    pub fn is_qos_data(&self) -> bool {
        self.frame_control[0] & TYPE_SUBTYPE_MASK == TYPE_SUBTYPE_QOS_DATA
    }

    pub fn is_retry(&self) -> bool {
        self.frame_control[1] & FLAG_RETRY != 0
    }

    fn has_expected_flags(&self) -> bool {
        self.frame_control[1] & FLAGS_MASK == FLAGS_EXPECTED
    }
}

/// What the acquisition engine needs from an accepted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub addresses: AddressPair,
    pub sequence: u16,
    pub length: u16,
}

/// Accept only first-transmission, unfragmented QoS data frames.
///
/// Anything else is dropped without a trace: the medium is shared and most
/// of what arrives is unrelated traffic.
pub fn filter(buf: &[u8], len: u16) -> Option<Observation> {
    if len == MANAGEMENT_CAPTURE_LEN || len < MIN_DATA_CAPTURE_LEN {
        return None;
    }

    let frame = RadioFrame::parse(buf, len)?;
    if !frame.is_qos_data() || !frame.has_expected_flags() || frame.fragment != 0 {
        return None;
    }

    Some(Observation {
        addresses: frame.addresses,
        sequence: frame.sequence,
        length: frame.length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> AddressPair {
        AddressPair::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55], [0xff; 6])
    }

    #[test]
    fn test_filter_accepts_qos_data() {
        let frame = RadioFrame::qos_data(pair(), 0x123, 1481);
        let obs = filter(&frame.to_capture(), frame.length).unwrap();
        assert_eq!(obs.addresses, pair());
        assert_eq!(obs.sequence, 0x123);
        assert_eq!(obs.length, 1481);
    }

    #[test]
    fn test_parse_raw_header_bytes() {
        // rx control (12) + QoS data, to-DS|protected, bssid, sa, da, seq ctrl 0x7A30
        let buf = hex::decode(concat!(
            "000000000000000000000000",
            "8841",
            "0000",
            "aabbccddeeff",
            "021122334455",
            "ffffffffffff",
            "307a"
        ))
        .unwrap();
        let frame = RadioFrame::parse(&buf, 100).unwrap();
        assert!(frame.is_qos_data());
        assert!(!frame.is_retry());
        assert_eq!(frame.sequence, 0x7A3);
        assert_eq!(frame.fragment, 0);
        assert_eq!(frame.addresses, pair());
        assert!(filter(&buf, 100).is_some());
    }

    #[test]
    fn test_filter_rejects_short_and_noise_lengths() {
        let frame = RadioFrame::qos_data(pair(), 1, 1481);
        let buf = frame.to_capture();
        assert!(filter(&buf, MANAGEMENT_CAPTURE_LEN).is_none());
        assert!(filter(&buf, 63).is_none());
        assert!(filter(&buf, 64).is_some());
    }

    #[test]
    fn test_filter_rejects_retry_and_fragments() {
        let mut frame = RadioFrame::qos_data(pair(), 1, 200);
        frame.frame_control[1] |= FLAG_RETRY;
        assert!(filter(&frame.to_capture(), 200).is_none());

        let mut frame = RadioFrame::qos_data(pair(), 1, 200);
        frame.fragment = 1;
        assert!(filter(&frame.to_capture(), 200).is_none());
    }

    #[test]
    fn test_filter_rejects_other_types() {
        let mut frame = RadioFrame::qos_data(pair(), 1, 200);
        frame.frame_control[0] = 0x08; // plain data
        assert!(filter(&frame.to_capture(), 200).is_none());

        let mut frame = RadioFrame::qos_data(pair(), 1, 200);
        frame.frame_control[1] = 0x42; // from-DS
        assert!(filter(&frame.to_capture(), 200).is_none());
    }

    #[test]
    fn test_filter_rejects_truncated_buffer() {
        let frame = RadioFrame::qos_data(pair(), 1, 200);
        let buf = frame.to_capture();
        assert!(filter(&buf[..20], 200).is_none());
    }

    #[test]
    fn test_address_pair_display() {
        assert_eq!(pair().to_string(), "021122334455>ffffffffffff");
    }
}
