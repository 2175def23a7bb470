//! SmartLink - Wi-Fi credential provisioning from captured frame lengths
//!
//! A phone that knows the network credentials broadcasts UDP datagrams whose
//! sizes spell out the SSID and password. A device with no network access
//! listens in monitor mode, locks onto that sender, decodes the lengths,
//! validates the result and joins the network.

pub mod config;
pub mod error;
pub mod hal;
pub mod host;
pub mod smart;

pub use error::{LinkError, LinkResult};
pub use smart::{DecodedCredentials, LinkConfig, LinkStats, SmartLink};
