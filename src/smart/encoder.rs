//! Sender side of the scheme: credentials to a round of frame lengths
//!
//! Used by the synthetic capture source and by tests; a provisioning app
//! produces the same stream by sizing its UDP datagrams.

use super::consts::{
    BASE_LENGTH, CONFIRMATIONS, LENGTH_OFFSET, LOCK_MARKER, MAX_PASSWORD_LEN, MAX_SSID_LEN,
    NIBBLE_OFFSET, PASSWORD_MARKER,
};
use super::frame::{AddressPair, RadioFrame};
use super::integrity;

fn push_confirmations(out: &mut Vec<u16>) {
    out.extend(CONFIRMATIONS.iter().map(|c| BASE_LENGTH + c));
}

fn push_section(out: &mut Vec<u16>, marker: u16, bytes: &[u8]) {
    out.push(BASE_LENGTH + marker);
    out.push(BASE_LENGTH + LENGTH_OFFSET + bytes.len() as u16);
    push_confirmations(out);
    for value in integrity::encode(bytes) {
        out.push(BASE_LENGTH + NIBBLE_OFFSET + value as u16);
        push_confirmations(out);
    }
}

/// Frame lengths for one full round, in sequence order.
///
/// Returns `None` when either field is empty or too long to encode.
pub fn round_lengths(ssid: &[u8], password: &[u8]) -> Option<Vec<u16>> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
        return None;
    }
    if password.is_empty() || password.len() > MAX_PASSWORD_LEN {
        return None;
    }

    let mut out = Vec::new();
    push_section(&mut out, LOCK_MARKER, ssid);
    push_section(&mut out, PASSWORD_MARKER, password);
    Some(out)
}

/// One round as consecutive frames from `addresses`, starting at `first_seq`
pub fn round_frames(
    addresses: AddressPair,
    first_seq: u16,
    ssid: &[u8],
    password: &[u8],
) -> Option<Vec<RadioFrame>> {
    let lengths = round_lengths(ssid, password)?;
    Some(
        lengths
            .into_iter()
            .enumerate()
            .map(|(i, len)| RadioFrame::qos_data(addresses, first_seq.wrapping_add(i as u16), len))
            .collect(),
    )
}
