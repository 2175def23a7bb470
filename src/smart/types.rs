//! Acquisition output types

use std::fmt;

use super::frame::AddressPair;

/// Validated credentials recovered from the air
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedCredentials {
    pub ssid: Vec<u8>,
    pub password: Vec<u8>,
    /// Channel the sender was found on
    pub channel: u8,
    pub sender: AddressPair,
}

impl DecodedCredentials {
    /// SSID as text; every byte is printable ASCII once validated
    pub fn ssid_lossy(&self) -> String {
        String::from_utf8_lossy(&self.ssid).into_owned()
    }
}

// Keep the password out of logs
impl fmt::Debug for DecodedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedCredentials")
            .field("ssid", &self.ssid_lossy())
            .field("password_len", &self.password.len())
            .field("channel", &self.channel)
            .field("sender", &self.sender.to_string())
            .finish()
    }
}
